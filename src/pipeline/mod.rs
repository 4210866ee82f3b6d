pub mod camera;
pub mod frame_decode;

// Re-exports for convenience
pub use camera::{
    CameraDevice, CameraError, CameraStream, available_cameras, start_camera_stream,
};
