use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use crossbeam_channel::Sender;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
    },
};
use thiserror::Error;

use super::frame_decode;
use crate::types::Frame;

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        // Fall back to any format Nokhwa can decode, but prefer higher FPS to
        // avoid very low default rates (e.g. 15 FPS) that some drivers reject.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Acquisition failures, split the way the UI reports them. `Unsupported`
/// means no capture backend or no device at all; `Denied` means a device
/// exists but could not be opened (permission, busy, driver rejection).
/// Both are terminal for the session.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("video capture is not supported on this device")]
    Unsupported,
    #[error("camera access denied: {0}")]
    Denied(String),
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

/// Handle for the capture thread. Stopping (or dropping) joins the thread,
/// so no capture work survives the view that started it.
#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn available_cameras() -> Result<Vec<CameraDevice>, CameraError> {
    let cameras = query(ApiBackend::Auto).map_err(|err| {
        log::error!("failed to enumerate cameras: {err:?}");
        CameraError::Unsupported
    })?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    info.human_name()
}

fn build_camera(index: CameraIndex) -> Result<Camera, CameraError> {
    let mut last_err: Option<String> = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.to_string()),
            },
            Err(err) => last_err = Some(err.to_string()),
        }
    }

    Err(CameraError::Denied(last_err.unwrap_or_else(|| {
        "failed to open camera with any supported format".to_string()
    })))
}

/// Spawn the capture thread. Frames fan out to the analyzer and the UI over
/// bounded channels with `try_send`: a busy consumer drops frames instead of
/// building a queue. Decode failures are playback-level problems; they go to
/// `warning_tx` for a non-fatal banner and never tear the stream down.
pub fn start_camera_stream(
    index: CameraIndex,
    analyzer_tx: Sender<Frame>,
    ui_tx: Sender<Frame>,
    warning_tx: Sender<String>,
) -> Result<CameraStream, CameraError> {
    // Fail fast before spawning the capture thread.
    build_camera(index.clone())?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(index) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to reopen camera on capture thread: {err}");
                return;
            }
        };

        while !stop_flag.load(Ordering::Relaxed) {
            let frame_start = Instant::now();
            let frame = match camera.frame() {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!(
                        "camera frame read failed (after {:?}): {err:?}",
                        frame_start.elapsed()
                    );
                    continue;
                }
            };

            let decoded = match frame_decode::decode_camera_frame(&frame) {
                Ok(rgba) => rgba,
                Err(err) => {
                    log::warn!("failed to decode camera frame: {err:?}");
                    let _ = warning_tx.try_send(format!("Video playback hiccup: {err:#}"));
                    continue;
                }
            };

            let frame = Frame {
                rgba: decoded.rgba,
                width: decoded.width,
                height: decoded.height,
                timestamp: Instant::now(),
            };

            // Drop if a consumer is busy, otherwise forward every frame.
            let _ = analyzer_tx.try_send(frame.clone());
            let _ = ui_tx.try_send(frame);
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}
