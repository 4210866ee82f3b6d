use std::cmp::Ordering;

use anyhow::{Result, anyhow};

/// Localization candidate before the per-face heads run.
#[derive(Clone, Debug)]
pub struct RawFace {
    /// Corner box `[x1, y1, x2, y2]` in frame pixels.
    pub bbox: [f32; 4],
    pub score: f32,
}

#[derive(Clone, Debug)]
pub struct FaceDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for FaceDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.7,
            nms_threshold: 0.3,
            top_k: 16,
        }
    }
}

/// Decode the detector's two output tensors: per-anchor class scores
/// `[batch, anchors, 2]` (background, face) and normalized corner boxes
/// `[batch, anchors, 4]`. Boxes are scaled to frame pixels, clamped, then
/// thinned with IoU NMS.
pub fn decode_detector_outputs(
    scores: &[f32],
    score_shape: &[usize],
    boxes: &[f32],
    box_shape: &[usize],
    frame_w: u32,
    frame_h: u32,
    cfg: &FaceDetectorConfig,
) -> Result<Vec<RawFace>> {
    if score_shape.len() < 3 || box_shape.len() < 3 {
        return Err(anyhow!(
            "unexpected detector output shapes: scores {score_shape:?}, boxes {box_shape:?}"
        ));
    }

    let anchors = *score_shape
        .get(score_shape.len() - 2)
        .ok_or_else(|| anyhow!("missing anchor dimension in score shape"))?;
    let score_dim = *score_shape
        .last()
        .ok_or_else(|| anyhow!("missing class dimension in score shape"))?;
    let box_anchors = *box_shape
        .get(box_shape.len() - 2)
        .ok_or_else(|| anyhow!("missing anchor dimension in box shape"))?;
    let box_dim = *box_shape
        .last()
        .ok_or_else(|| anyhow!("missing feature dimension in box shape"))?;

    if score_dim < 2 {
        return Err(anyhow!("detector score dimension too small: {score_dim}"));
    }
    if box_dim < 4 {
        return Err(anyhow!("detector box dimension too small: {box_dim}"));
    }
    if anchors != box_anchors {
        return Err(anyhow!(
            "anchor dimension mismatch between scores ({anchors}) and boxes ({box_anchors})"
        ));
    }

    let (fw, fh) = (frame_w as f32, frame_h as f32);
    let mut candidates = Vec::new();
    for anchor_idx in 0..anchors {
        let score = *scores
            .get(anchor_idx * score_dim + 1)
            .ok_or_else(|| anyhow!("missing score for anchor {anchor_idx}"))?;
        if score < cfg.score_threshold {
            continue;
        }

        let offset = anchor_idx * box_dim;
        let coords = boxes
            .get(offset..offset + 4)
            .ok_or_else(|| anyhow!("missing box for anchor {anchor_idx}"))?;

        let mut x1 = coords[0] * fw;
        let mut y1 = coords[1] * fh;
        let mut x2 = coords[2] * fw;
        let mut y2 = coords[3] * fh;

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        clamp_box(&mut x1, &mut y1, &mut x2, &mut y2, frame_w, frame_h);

        candidates.push(RawFace {
            bbox: [x1, y1, x2, y2],
            score,
        });
    }

    let kept = nms(&candidates, cfg.nms_threshold, cfg.top_k);
    Ok(kept
        .into_iter()
        .filter_map(|idx| candidates.get(idx).cloned())
        .collect())
}

fn nms(candidates: &[RawFace], threshold: f32, top_k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|a, b| {
        candidates[*b]
            .score
            .partial_cmp(&candidates[*a].score)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<usize> = Vec::new();
    'outer: for &idx in &order {
        for &k in &keep {
            if iou(&candidates[idx].bbox, &candidates[k].bbox) >= threshold {
                continue 'outer;
            }
        }
        keep.push(idx);
        if keep.len() >= top_k {
            break;
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter_w = (x2 - x1).max(0.0);
    let inter_h = (y2 - y1).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn clamp_box(x1: &mut f32, y1: &mut f32, x2: &mut f32, y2: &mut f32, w: u32, h: u32) {
    let max_w = (w.saturating_sub(1)) as f32;
    let max_h = (h.saturating_sub(1)) as f32;
    *x1 = x1.clamp(0.0, max_w);
    *y1 = y1.clamp(0.0, max_h);
    *x2 = x2.clamp(0.0, max_w);
    *y2 = y2.clamp(0.0, max_h);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // scores: [bg, face] per anchor; boxes: normalized corners per anchor.
    fn decode(
        scores: &[f32],
        boxes: &[f32],
        cfg: &FaceDetectorConfig,
    ) -> Vec<RawFace> {
        let anchors = scores.len() / 2;
        decode_detector_outputs(
            scores,
            &[1, anchors, 2],
            boxes,
            &[1, anchors, 4],
            640,
            480,
            cfg,
        )
        .unwrap()
    }

    #[test]
    fn below_threshold_candidates_are_dropped() {
        let scores = [0.9, 0.1, 0.2, 0.8];
        let boxes = [
            0.1, 0.1, 0.3, 0.3, //
            0.5, 0.5, 0.8, 0.9,
        ];
        let faces = decode(&scores, &boxes, &FaceDetectorConfig::default());
        assert_eq!(faces.len(), 1);
        assert_relative_eq!(faces[0].score, 0.8);
    }

    #[test]
    fn boxes_scale_to_frame_pixels_and_clamp() {
        let scores = [0.05, 0.95];
        let boxes = [0.5, 0.5, 1.2, 1.3]; // spills past the frame
        let faces = decode(&scores, &boxes, &FaceDetectorConfig::default());
        assert_eq!(faces.len(), 1);
        let [x1, y1, x2, y2] = faces[0].bbox;
        assert_relative_eq!(x1, 320.0);
        assert_relative_eq!(y1, 240.0);
        assert_relative_eq!(x2, 639.0);
        assert_relative_eq!(y2, 479.0);
    }

    #[test]
    fn nms_suppresses_heavy_overlap_keeping_best_score() {
        let scores = [0.1, 0.9, 0.1, 0.85, 0.1, 0.8];
        let boxes = [
            0.10, 0.10, 0.30, 0.30, // best
            0.11, 0.11, 0.31, 0.31, // near-duplicate, suppressed
            0.60, 0.60, 0.80, 0.80, // separate face, kept
        ];
        let faces = decode(&scores, &boxes, &FaceDetectorConfig::default());
        assert_eq!(faces.len(), 2);
        assert_relative_eq!(faces[0].score, 0.9);
        assert_relative_eq!(faces[1].score, 0.8);
    }

    #[test]
    fn degenerate_boxes_are_skipped() {
        let scores = [0.1, 0.9];
        let boxes = [0.5, 0.5, 0.5, 0.4];
        let faces = decode(&scores, &boxes, &FaceDetectorConfig::default());
        assert!(faces.is_empty());
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        assert_relative_eq!(
            iou(&[0.0, 0.0, 1.0, 1.0], &[2.0, 2.0, 3.0, 3.0]),
            0.0
        );
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        assert_relative_eq!(
            iou(&[1.0, 1.0, 5.0, 5.0], &[1.0, 1.0, 5.0, 5.0]),
            1.0
        );
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let result = decode_detector_outputs(
            &[0.1, 0.9],
            &[1, 1, 2],
            &[0.1, 0.1, 0.2, 0.2, 0.3, 0.3, 0.4, 0.4],
            &[1, 2, 4],
            640,
            480,
            &FaceDetectorConfig::default(),
        );
        assert!(result.is_err());
    }
}
