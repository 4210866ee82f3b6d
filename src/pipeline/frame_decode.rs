use anyhow::{Result, anyhow};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

#[derive(Debug)]
pub struct DecodedFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Convert whatever pixel format the device produced into tightly packed
/// RGBA. Everything downstream (analysis, overlay, snapshot) assumes RGBA.
pub fn decode_camera_frame(frame: &Buffer) -> Result<DecodedFrame> {
    let resolution = frame.resolution();
    let width = resolution.width_x;
    let height = resolution.height_y;
    let data = frame.buffer();

    let rgba = match frame.source_frame_format() {
        FrameFormat::NV12 => nv12_to_rgba(data, width, height)?,
        FrameFormat::YUYV => yuyv_to_rgba(data, width, height)?,
        FrameFormat::MJPEG => mjpeg_to_rgba(data)?,
        FrameFormat::RAWRGB => packed_to_rgba(data, width, height, Packed::Rgb)?,
        FrameFormat::RAWBGR => packed_to_rgba(data, width, height, Packed::Bgr)?,
        FrameFormat::GRAY => packed_to_rgba(data, width, height, Packed::Gray)?,
    };

    Ok(DecodedFrame {
        rgba,
        width,
        height,
    })
}

fn check_len(data: &[u8], needed: usize, format: &str) -> Result<()> {
    if data.len() < needed {
        return Err(anyhow!(
            "{format} buffer too small: got {}, expected {needed}",
            data.len()
        ));
    }
    Ok(())
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_plane_len = width as usize * height as usize;
    let uv_plane_len = y_plane_len / 2;
    check_len(data, y_plane_len + uv_plane_len, "NV12")?;

    let y_plane = &data[..y_plane_len];
    let uv_plane = &data[y_plane_len..y_plane_len + uv_plane_len];
    let mut rgba = vec![0u8; y_plane_len * 4];

    let image = YuvBiPlanarImage {
        y_plane,
        y_stride: width,
        uv_plane,
        uv_stride: width,
        width,
        height,
    };

    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12→RGBA failed: {err:?}"))?;

    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    check_len(data, width as usize * height as usize * 2, "YUYV")?;

    let mut rgba = vec![0u8; (width as usize * height as usize) * 4];
    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422→RGBA failed: {err:?}"))?;

    Ok(rgba)
}

fn mjpeg_to_rgba(data: &[u8]) -> Result<Vec<u8>> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    if let Some(info) = decoder.info() {
        let expected = info.width as usize * info.height as usize * 4;
        check_len(&rgba, expected, "decoded MJPEG")?;
    }

    Ok(rgba)
}

#[derive(Clone, Copy)]
enum Packed {
    Rgb,
    Bgr,
    Gray,
}

fn packed_to_rgba(data: &[u8], width: u32, height: u32, layout: Packed) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    let bytes_per_pixel = match layout {
        Packed::Rgb | Packed::Bgr => 3,
        Packed::Gray => 1,
    };
    check_len(data, pixels * bytes_per_pixel, "packed pixel")?;

    let mut rgba = vec![0u8; pixels * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(bytes_per_pixel))
        .for_each(|(dst, src)| {
            match layout {
                Packed::Rgb => {
                    dst[0] = src[0];
                    dst[1] = src[1];
                    dst[2] = src[2];
                }
                Packed::Bgr => {
                    dst[0] = src[2];
                    dst[1] = src[1];
                    dst[2] = src[0];
                }
                Packed::Gray => {
                    dst[0] = src[0];
                    dst[1] = src[0];
                    dst[2] = src[0];
                }
            }
            dst[3] = 255;
        });

    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_rgb_expands_with_opaque_alpha() {
        let data = [10u8, 20, 30, 40, 50, 60];
        let rgba = packed_to_rgba(&data, 2, 1, Packed::Rgb).unwrap();
        assert_eq!(rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn packed_bgr_swaps_channels() {
        let data = [10u8, 20, 30];
        let rgba = packed_to_rgba(&data, 1, 1, Packed::Bgr).unwrap();
        assert_eq!(rgba, vec![30, 20, 10, 255]);
    }

    #[test]
    fn gray_replicates_luma() {
        let data = [128u8, 7];
        let rgba = packed_to_rgba(&data, 2, 1, Packed::Gray).unwrap();
        assert_eq!(rgba, vec![128, 128, 128, 255, 7, 7, 7, 255]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let data = [1u8, 2, 3];
        assert!(packed_to_rgba(&data, 2, 1, Packed::Rgb).is_err());
    }
}
