use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use image::{RgbaImage, imageops::FilterType};
use ndarray::Array4;

use crate::types::Frame;

/// Detector input, width x height. The detector runs on a plain resize of
/// the full frame; boxes come back normalized, so no letterbox bookkeeping
/// is needed.
pub const DETECTOR_INPUT_W: u32 = 320;
pub const DETECTOR_INPUT_H: u32 = 240;

/// Square crop fed to the landmark and age/gender heads.
pub const CROP_INPUT_SIZE: u32 = 112;
/// Grayscale crop fed to the expression head.
pub const EXPRESSION_INPUT_SIZE: u32 = 64;

pub const NUM_LANDMARKS: usize = 68;

/// Maps head outputs (normalized to the crop square) back into frame pixels.
#[derive(Clone, Debug)]
pub struct FaceCrop {
    pub origin: (f32, f32),
    pub side: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl FaceCrop {
    /// Project a point normalized to [0,1] crop space into frame pixels,
    /// clamped to the frame.
    pub fn project(&self, point: (f32, f32)) -> (f32, f32) {
        let x = self.origin.0 + point.0 * self.side;
        let y = self.origin.1 + point.1 * self.side;
        (
            x.clamp(0.0, (self.orig_w.saturating_sub(1)) as f32),
            y.clamp(0.0, (self.orig_h.saturating_sub(1)) as f32),
        )
    }
}

/// Full-frame detector input: resize to the fixed detector resolution and
/// normalize `(x - 127) / 128`, NCHW.
pub fn prepare_detector_input(frame: &Frame) -> Result<Array4<f32>> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {expected_len}",
            frame.rgba.len()
        ));
    }

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image =
        fir::images::Image::new(DETECTOR_INPUT_W, DETECTOR_INPUT_H, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("detector input resize failed")?;
    let resized = dst_image.into_vec();

    let (w, h) = (DETECTOR_INPUT_W as usize, DETECTOR_INPUT_H as usize);
    let mut input = Array4::<f32>::zeros((1, 3, h, w));
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) * 4;
            for c in 0..3 {
                input[[0, c, y, x]] = (resized[idx + c] as f32 - 127.0) / 128.0;
            }
        }
    }
    Ok(input)
}

/// Cut a square region around `bbox`, expanded by `margin`, clamped to the
/// image, and resized to `output` pixels. Returns the resized crop and the
/// transform that maps crop-normalized points back into frame coordinates.
pub fn square_face_crop(
    image: &RgbaImage,
    bbox: &[f32; 4],
    margin: f32,
    output: u32,
) -> Result<(RgbaImage, FaceCrop)> {
    let (img_w, img_h) = (image.width(), image.height());
    if img_w == 0 || img_h == 0 {
        return Err(anyhow!("cannot crop from an empty image"));
    }

    let [x1, y1, x2, y2] = *bbox;
    let w = (x2 - x1).max(1.0);
    let h = (y2 - y1).max(1.0);
    let cx = x1 + w * 0.5;
    let cy = y1 + h * 0.5;

    let mut side = (w.max(h) * margin).max(8.0);
    side = side.min(img_w.min(img_h) as f32);

    let mut ox = cx - side * 0.5;
    let mut oy = cy - side * 0.5;
    ox = ox.clamp(0.0, img_w as f32 - side);
    oy = oy.clamp(0.0, img_h as f32 - side);

    let crop = image::imageops::crop_imm(
        image,
        ox.round() as u32,
        oy.round() as u32,
        side.round().max(1.0) as u32,
        side.round().max(1.0) as u32,
    )
    .to_image();
    let resized = image::imageops::resize(&crop, output, output, FilterType::CatmullRom);

    Ok((
        resized,
        FaceCrop {
            origin: (ox, oy),
            side,
            orig_w: img_w,
            orig_h: img_h,
        },
    ))
}

/// RGB crop as NCHW, scaled to [0,1].
pub fn tensor_from_rgb(crop: &RgbaImage) -> Array4<f32> {
    let (w, h) = (crop.width() as usize, crop.height() as usize);
    let mut input = Array4::<f32>::zeros((1, 3, h, w));
    for (x, y, pixel) in crop.enumerate_pixels() {
        let p = pixel.0;
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = p[c] as f32 / 255.0;
        }
    }
    input
}

/// Grayscale crop as NCHW `[1, 1, h, w]`, Rec.601 luma scaled to [0,1].
pub fn tensor_from_gray(crop: &RgbaImage) -> Array4<f32> {
    let (w, h) = (crop.width() as usize, crop.height() as usize);
    let mut input = Array4::<f32>::zeros((1, 1, h, w));
    for (x, y, pixel) in crop.enumerate_pixels() {
        let [r, g, b, _] = pixel.0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        input[[0, 0, y as usize, x as usize]] = luma / 255.0;
    }
    input
}

pub fn softmax(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let max = values.iter().copied().fold(f32::MIN, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Instant;

    fn solid_frame(width: u32, height: u32) -> Frame {
        Frame {
            rgba: vec![127u8; (width * height * 4) as usize],
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn detector_input_has_fixed_shape() {
        let frame = solid_frame(64, 48);
        let input = prepare_detector_input(&frame).unwrap();
        assert_eq!(
            input.shape(),
            &[1, 3, DETECTOR_INPUT_H as usize, DETECTOR_INPUT_W as usize]
        );
        // 127 normalizes to 0.
        assert_relative_eq!(input[[0, 0, 0, 0]], 0.0, epsilon = 0.01);
    }

    #[test]
    fn detector_input_rejects_wrong_buffer_length() {
        let mut frame = solid_frame(8, 8);
        frame.rgba.truncate(10);
        assert!(prepare_detector_input(&frame).is_err());
    }

    #[test]
    fn softmax_normalizes_to_unit_sum() {
        let mut values = [1.0f32, 2.0, 3.0];
        softmax(&mut values);
        let sum: f32 = values.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
        assert!(values[2] > values[1] && values[1] > values[0]);
    }

    #[test]
    fn crop_projection_maps_corners_into_frame() {
        let crop = FaceCrop {
            origin: (10.0, 20.0),
            side: 50.0,
            orig_w: 100,
            orig_h: 100,
        };
        assert_eq!(crop.project((0.0, 0.0)), (10.0, 20.0));
        assert_eq!(crop.project((1.0, 1.0)), (60.0, 70.0));
        // Projections never leave the frame.
        let (x, y) = crop.project((5.0, 5.0));
        assert!(x <= 99.0 && y <= 99.0);
    }

    #[test]
    fn square_crop_stays_inside_image_and_resizes() {
        let image = RgbaImage::from_pixel(100, 80, image::Rgba([9, 9, 9, 255]));
        // Box hanging off the top-left corner.
        let bbox = [-10.0, -10.0, 30.0, 20.0];
        let (crop, transform) = square_face_crop(&image, &bbox, 1.4, 32).unwrap();
        assert_eq!((crop.width(), crop.height()), (32, 32));
        assert!(transform.origin.0 >= 0.0 && transform.origin.1 >= 0.0);
        assert!(transform.origin.0 + transform.side <= 100.0);
        assert!(transform.origin.1 + transform.side <= 80.0);
    }
}
