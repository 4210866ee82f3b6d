use std::{mem, sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use gpui::prelude::FluentBuilder;
use gpui::{
    AnyElement, App, AppContext, Context, Entity, Hsla, InteractiveElement, IntoElement, ObjectFit,
    ParentElement, Render, RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window,
    WindowControlArea, WindowDecorations, WindowOptions, div, img, px,
};
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex,
    input::{InputState, TextInput},
    tag::Tag,
    v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    analyzer::{AnalyzerBackend, AnalyzerHandle, start_analyzer},
    login::{self, SubmitOutcome},
    model_download::{ModelDownloadEvent, ensure_all_models_ready},
    pipeline::{self, CameraDevice, CameraError, CameraStream},
    snapshot::{self, SnapshotRecord},
    types::{
        AnalyzedFrame, CameraState, FaceSummary, Frame, LoadState, LoopState, can_start_loop,
    },
};

mod camera_view;
mod download;
mod login_view;
mod main_view;
mod render_util;
mod titlebar;

const CAMERA_PANEL_WIDTH: f32 = 560.0;
const CAMERA_MIN_HEIGHT: f32 = 180.0;
const CAMERA_MAX_HEIGHT: f32 = 540.0;
const SNAPSHOT_PANEL_WIDTH: f32 = 300.0;
const DEFAULT_CAMERA_RATIO: f32 = 4.0 / 3.0;

pub fn launch_ui(
    app: &mut App,
    ui_frame_rx: Receiver<Frame>,
    ui_frame_tx: Sender<Frame>,
    analyzer_frame_rx: Receiver<Frame>,
    analyzer_frame_tx: Sender<Frame>,
    backend: AnalyzerBackend,
) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("FaceLens".into()),
            appears_transparent: true,
            traffic_light_position: None,
        }),
        window_decorations: Some(WindowDecorations::Client),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| {
            AppView::new(
                ui_frame_rx,
                ui_frame_tx,
                analyzer_frame_rx,
                analyzer_frame_tx,
                backend,
            )
        });
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    screen: Screen,
    login_open: bool,

    load_state: LoadState,
    camera_state: CameraState,
    loop_state: LoopState,

    ui_frame_rx: Option<Receiver<Frame>>,
    ui_frame_tx: Sender<Frame>,
    analyzer_frame_rx: Option<Receiver<Frame>>,
    analyzer_frame_tx: Sender<Frame>,
    result_rx: Receiver<AnalyzedFrame>,
    result_tx: Option<Sender<AnalyzedFrame>>,
    warning_rx: Receiver<String>,
    warning_tx: Sender<String>,

    backend: AnalyzerBackend,
    analyzer: Option<AnalyzerHandle>,
    camera_stream: Option<CameraStream>,
    available_cameras: Vec<CameraDevice>,
    selected_camera_idx: Option<usize>,
    camera_error: Option<String>,
    playback_warning: Option<String>,

    latest_frame: Option<Frame>,
    latest_analysis: Option<AnalyzedFrame>,
    latest_summary: Option<FaceSummary>,
    latest_image: Option<Arc<RenderImage>>,

    snapshot: Option<SnapshotRecord>,
    snapshot_image: Option<Arc<RenderImage>>,

    download_rx: Receiver<DownloadMessage>,
    _download_handle: thread::JoinHandle<()>,

    email_input: Option<Entity<InputState>>,
    password_input: Option<Entity<InputState>>,
    password_visible: bool,
    login_error: Option<String>,
    login_busy: bool,
    login_done_rx: Receiver<SubmitOutcome>,
    login_done_tx: Sender<SubmitOutcome>,
}

enum Screen {
    Loading(DownloadState),
    LoadFailed(String),
    Camera(CameraPhase),
    Live,
}

enum CameraPhase {
    Unsupported {
        message: String,
    },
    Selection {
        options: Vec<CameraDevice>,
        selected: usize,
        start_error: Option<String>,
    },
    Starting,
}

struct DownloadState {
    current: Option<&'static str>,
    completed: usize,
    downloaded: u64,
    total: Option<u64>,
    message: String,
    error: Option<String>,
    finished: bool,
}

impl DownloadState {
    fn new() -> Self {
        Self {
            current: None,
            completed: 0,
            downloaded: 0,
            total: None,
            message: "Preparing model bundle...".to_string(),
            error: None,
            finished: false,
        }
    }
}

enum DownloadMessage {
    Event(ModelDownloadEvent),
    AllReady,
    Error(String),
}

impl AppView {
    fn new(
        ui_frame_rx: Receiver<Frame>,
        ui_frame_tx: Sender<Frame>,
        analyzer_frame_rx: Receiver<Frame>,
        analyzer_frame_tx: Sender<Frame>,
        backend: AnalyzerBackend,
    ) -> Self {
        // Model loading starts immediately on mount; the camera is only
        // acquired once the bundle is ready.
        let (download_tx, download_rx) = unbounded();
        let download_handle = download::spawn_model_download(backend.clone(), download_tx);

        let (result_tx, result_rx) = bounded(1);
        let (warning_tx, warning_rx) = bounded(4);
        let (login_done_tx, login_done_rx) = unbounded();

        Self {
            screen: Screen::Loading(DownloadState::new()),
            login_open: false,
            load_state: LoadState::Loading,
            camera_state: CameraState::Pending,
            loop_state: LoopState::NotStarted,
            ui_frame_rx: Some(ui_frame_rx),
            ui_frame_tx,
            analyzer_frame_rx: Some(analyzer_frame_rx),
            analyzer_frame_tx,
            result_rx,
            result_tx: Some(result_tx),
            warning_rx,
            warning_tx,
            backend,
            analyzer: None,
            camera_stream: None,
            available_cameras: Vec::new(),
            selected_camera_idx: None,
            camera_error: None,
            playback_warning: None,
            latest_frame: None,
            latest_analysis: None,
            latest_summary: None,
            latest_image: None,
            snapshot: None,
            snapshot_image: None,
            download_rx,
            _download_handle: download_handle,
            email_input: None,
            password_input: None,
            password_visible: false,
            login_error: None,
            login_busy: false,
            login_done_rx,
            login_done_tx,
        }
    }

    /// The loop starts exactly once, and only behind both gates: model
    /// bundle ready and camera streaming.
    fn start_analyzer_if_ready(&mut self) {
        if self.analyzer.is_some() {
            return;
        }
        if !can_start_loop(self.load_state, self.camera_state) {
            return;
        }

        let Some(frame_rx) = self.analyzer_frame_rx.take() else {
            log::warn!("missing frame receiver for analyzer");
            return;
        };
        let Some(result_tx) = self.result_tx.take() else {
            log::warn!("missing result sender for analyzer");
            return;
        };

        self.analyzer = Some(start_analyzer(self.backend.clone(), frame_rx, result_tx));
        self.loop_state = LoopState::Running;
    }

    fn render_detect_flow(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let mut screen = mem::replace(&mut self.screen, Screen::Live);
        let view = match screen {
            Screen::Loading(mut state) => {
                self.poll_download_events(&mut state);
                if let Some(err) = state.error.take() {
                    self.load_state = LoadState::Failed;
                    let view = self.render_load_failed(&err, cx);
                    screen = Screen::LoadFailed(err);
                    view
                } else if state.finished {
                    self.load_state = LoadState::Ready;
                    let phase = self.initial_camera_phase();
                    let view = self.render_download_view(&state, cx);
                    screen = Screen::Camera(phase);
                    view
                } else {
                    let view = self.render_download_view(&state, cx);
                    screen = Screen::Loading(state);
                    view
                }
            }
            Screen::LoadFailed(err) => {
                let view = self.render_load_failed(&err, cx);
                screen = Screen::LoadFailed(err);
                view
            }
            Screen::Camera(mut phase) => {
                let view = self.render_camera_view(&mut phase, cx);
                if self.camera_state == CameraState::Streaming {
                    self.start_analyzer_if_ready();
                    screen = Screen::Live;
                } else {
                    screen = Screen::Camera(phase);
                }
                view
            }
            Screen::Live => {
                screen = Screen::Live;
                self.render_live(window, cx)
            }
        };
        self.screen = screen;
        view
    }
}

impl Drop for AppView {
    fn drop(&mut self) {
        // Stop the frame producer first, then the loop; dropping each handle
        // joins its thread, so no capture or inference work outlives the view.
        self.camera_stream.take();
        self.analyzer.take();
        self.loop_state = LoopState::Stopped;
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.poll_login_events();

        let titlebar = self.render_titlebar(window, cx);
        let body: AnyElement = if self.login_open {
            self.ensure_login_inputs(window, cx);
            self.render_login_view(cx)
        } else {
            self.render_detect_flow(window, cx)
        };

        v_flex()
            .size_full()
            .bg(gpui::rgb(0x1a2332))
            .child(titlebar)
            .child(div().flex_1().overflow_hidden().child(body))
    }
}
