use super::{Arc, ImageBuffer, ImageFrame, RenderImage, Rgba};
use crate::overlay;
use crate::types::{AnalyzedFrame, Frame};

/// Build the displayed image for one tick: overlay the current detections
/// onto a fresh copy of the frame, then hand it to GPUI.
pub(super) fn frame_to_image(
    frame: &Frame,
    analysis: Option<&AnalyzedFrame>,
) -> Option<Arc<RenderImage>> {
    let mut rgba = overlay::annotate_frame(frame, analysis);

    // GPUI expects BGRA; convert in place to avoid the async asset pipeline and flicker.
    for px in rgba.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(frame.width, frame.height, rgba)?;
    let frame = ImageFrame::new(buffer);

    Some(Arc::new(RenderImage::new(vec![frame])))
}

/// The snapshot panel shows the frame as captured, without annotations.
pub(super) fn raw_frame_to_image(frame: &Frame) -> Option<Arc<RenderImage>> {
    frame_to_image(frame, None)
}
