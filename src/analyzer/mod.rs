mod common;
mod detector;
mod ort;

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::{
    model_download,
    types::{AnalyzedFrame, FaceDetection, Frame},
};

/// A face analysis engine. One `analyze` call per frame; the worker loop
/// never overlaps calls, so implementations may hold mutable session state.
pub(crate) trait AnalysisEngine: Send + 'static {
    fn analyze(&mut self, frame: &Frame) -> anyhow::Result<Vec<FaceDetection>>;
}

#[derive(Clone, Debug)]
pub struct AnalyzerBackend {
    models_dir: PathBuf,
}

impl AnalyzerBackend {
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir.clone()
    }

    pub fn label(&self) -> &'static str {
        "ort"
    }
}

impl Default for AnalyzerBackend {
    fn default() -> Self {
        AnalyzerBackend {
            models_dir: model_download::default_models_dir(),
        }
    }
}

/// Cancellable handle for the analysis loop. The loop also ends on its own
/// when the frame channel disconnects; `stop`/`Drop` make teardown explicit
/// so no inference work outlives the view that started it.
#[derive(Debug)]
pub struct AnalyzerHandle {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AnalyzerHandle {
    #[allow(dead_code)]
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AnalyzerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn start_analyzer(
    backend: AnalyzerBackend,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<AnalyzedFrame>,
) -> AnalyzerHandle {
    log::info!("starting face analysis backend: {}", backend.label());

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let engine = match ort::OrtEngine::new(&backend.models_dir()) {
            Ok(engine) => {
                log::info!(
                    "face analysis sessions ready from {}",
                    backend.models_dir().display()
                );
                engine
            }
            Err(err) => {
                log::error!("failed to load face analysis models: {err:?}");
                return;
            }
        };

        run_worker_loop(engine, frame_rx, result_tx, stop_flag);
    });

    AnalyzerHandle {
        stop,
        handle: Some(handle),
    }
}

/// Sequential loop: at most one inference in flight, ever. Queued frames
/// are drained to the newest before each call; a failed frame is logged and
/// the loop moves on.
fn run_worker_loop<E: AnalysisEngine>(
    mut engine: E,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<AnalyzedFrame>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        let frame = match frame_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => drain_to_latest(&frame_rx, frame),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match engine.analyze(&frame) {
            Ok(faces) => {
                let _ = result_tx.try_send(AnalyzedFrame {
                    faces,
                    frame_width: frame.width,
                    frame_height: frame.height,
                });
            }
            Err(err) => {
                log::warn!("frame analysis failed: {err:?}");
            }
        }
    }
}

fn drain_to_latest(frame_rx: &Receiver<Frame>, mut frame: Frame) -> Frame {
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};
    use std::time::Instant;

    fn frame(width: u32) -> Frame {
        Frame {
            rgba: vec![0u8; (width * width * 4) as usize],
            width,
            height: width,
            timestamp: Instant::now(),
        }
    }

    /// Fails on 9-pixel-wide frames, succeeds (with zero faces) otherwise.
    struct ScriptedEngine;

    impl AnalysisEngine for ScriptedEngine {
        fn analyze(&mut self, frame: &Frame) -> anyhow::Result<Vec<FaceDetection>> {
            if frame.width == 9 {
                anyhow::bail!("scripted failure");
            }
            Ok(Vec::new())
        }
    }

    #[test]
    fn drain_keeps_only_the_newest_frame() {
        let (tx, rx) = unbounded();
        tx.send(frame(8)).unwrap();
        tx.send(frame(16)).unwrap();
        let latest = drain_to_latest(&rx, frame(4));
        assert_eq!(latest.width, 16);
        assert!(rx.is_empty());
    }

    #[test]
    fn failed_frame_does_not_stop_the_loop() {
        let (frame_tx, frame_rx) = unbounded();
        let (result_tx, result_rx) = bounded(4);
        let stop = Arc::new(AtomicBool::new(false));

        let worker_stop = stop.clone();
        let worker = thread::spawn(move || {
            run_worker_loop(ScriptedEngine, frame_rx, result_tx, worker_stop);
        });

        // First frame fails inside the engine; wait until it has been taken
        // off the channel so the two frames cannot be coalesced.
        frame_tx.send(frame(9)).unwrap();
        while !frame_tx.is_empty() {
            thread::yield_now();
        }
        frame_tx.send(frame(8)).unwrap();

        let result = result_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("loop should survive a failed frame");
        assert!(result.faces.is_empty());
        assert_eq!(result.frame_width, 8);

        drop(frame_tx);
        worker.join().unwrap();
    }

    #[test]
    fn loop_ends_when_frame_channel_disconnects() {
        let (frame_tx, frame_rx) = unbounded::<Frame>();
        let (result_tx, _result_rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));

        let worker_stop = stop.clone();
        let worker = thread::spawn(move || {
            run_worker_loop(ScriptedEngine, frame_rx, result_tx, worker_stop);
        });

        drop(frame_tx);
        worker.join().unwrap();
    }
}
