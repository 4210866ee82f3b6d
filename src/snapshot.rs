use anyhow::{Context, Result};
use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};

use crate::types::{FaceSummary, Frame};

/// The last snapshot taken. Lossless PNG bytes plus whatever the analyzer
/// knew about the last face when the shutter was pressed. The shell keeps
/// at most one of these; a new capture replaces it.
#[derive(Clone, Debug)]
pub struct SnapshotRecord {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub summary: Option<FaceSummary>,
}

/// Rasterize the current raw camera frame (no overlay) and pair it with the
/// most recent face summary. Synchronous; with no detection ever seen the
/// record carries the image alone.
pub fn capture(frame: &Frame, summary: Option<FaceSummary>) -> Result<SnapshotRecord> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&frame.rgba, frame.width, frame.height, ExtendedColorType::Rgba8)
        .context("failed to encode snapshot as PNG")?;

    Ok(SnapshotRecord {
        png,
        width: frame.width,
        height: frame.height,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Expression, Gender};
    use std::time::Instant;

    fn frame() -> Frame {
        Frame {
            rgba: vec![200u8; 4 * 4 * 4],
            width: 4,
            height: 4,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn capture_without_detections_has_image_but_no_summary() {
        let record = capture(&frame(), None).unwrap();
        assert!(record.summary.is_none());
        assert!(!record.png.is_empty());
        // PNG signature.
        assert_eq!(&record.png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!((record.width, record.height), (4, 4));
    }

    #[test]
    fn capture_carries_the_last_summary() {
        let summary = FaceSummary {
            age_years: 31,
            gender: Gender::Male,
            expression: Expression::Happy,
        };
        let record = capture(&frame(), Some(summary)).unwrap();
        assert_eq!(record.summary, Some(summary));
    }
}
