use super::{
    ActiveTheme, AnyElement, AppView, Context, DownloadMessage, DownloadState, IntoElement,
    ModelDownloadEvent, ParentElement, Sender, Styled, StyledExt, Tag, div,
    ensure_all_models_ready, h_flex, thread, v_flex,
};
use crate::analyzer::AnalyzerBackend;
use crate::model_download::ModelKind;

impl AppView {
    pub(super) fn poll_download_events(&mut self, state: &mut DownloadState) {
        while let Ok(msg) = self.download_rx.try_recv() {
            match msg {
                DownloadMessage::Event(ModelDownloadEvent::AlreadyPresent { model }) => {
                    state.message = format!("{} already present", model.label());
                }
                DownloadMessage::Event(ModelDownloadEvent::Started { model, total }) => {
                    state.current = Some(model.label());
                    state.downloaded = 0;
                    state.total = total;
                    state.message = format!(
                        "Downloading {} ({}/{})",
                        model.label(),
                        state.completed + 1,
                        ModelKind::ALL.len()
                    );
                }
                DownloadMessage::Event(ModelDownloadEvent::Progress {
                    downloaded, total, ..
                }) => {
                    state.downloaded = downloaded;
                    state.total = total;
                }
                DownloadMessage::Event(ModelDownloadEvent::Finished { .. }) => {
                    state.completed += 1;
                    state.current = None;
                }
                DownloadMessage::AllReady => {
                    state.finished = true;
                    state.message = "Models loaded. Start video.".to_string();
                }
                DownloadMessage::Error(err) => {
                    state.error = Some(err);
                    state.finished = false;
                    state.message = "Model loading failed".to_string();
                }
            }
        }
    }

    pub(super) fn render_download_view(
        &self,
        state: &DownloadState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let bar = progress_bar_string(state.downloaded, state.total);
        let detail = match (state.total, state.finished) {
            (_, true) => "Done".to_string(),
            (Some(total), false) if total > 0 => {
                let percent = (state.downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                format!("{percent:.1}%")
            }
            _ => format!("Downloaded {} KB", state.downloaded / 1024),
        };

        let (status_icon, status_text, status_color) = if state.finished {
            ("✓", "Models ready", theme.success)
        } else {
            ("⟳", "Loading models...", theme.foreground)
        };

        let container = v_flex()
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        div()
                            .text_color(status_color)
                            .font_semibold()
                            .child(format!("{} {}", status_icon, status_text)),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child(match state.current {
                                Some(label) => format!(
                                    "{label} ({}/{})",
                                    state.completed + 1,
                                    ModelKind::ALL.len()
                                ),
                                None => format!(
                                    "{}/{} model files",
                                    state.completed,
                                    ModelKind::ALL.len()
                                ),
                            }),
                    ),
            )
            .child(
                div()
                    .px_3()
                    .py_2()
                    .rounded_md()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .font_family(theme.mono_font_family.clone())
                    .text_color(theme.foreground)
                    .child(bar),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child(detail),
            )
            .child(
                div()
                    .text_color(theme.foreground)
                    .child(state.message.clone()),
            );

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(container)
            .into_any_element()
    }

    /// Terminal screen: the bundle could not be loaded, and there is no
    /// retry short of restarting the app.
    pub(super) fn render_load_failed(
        &self,
        error: &str,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(
                v_flex()
                    .gap_3()
                    .p_6()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.group_box)
                    .child(
                        div()
                            .text_color(theme.accent)
                            .font_semibold()
                            .child("✗ Error loading models"),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child("Please restart the application."),
                    )
                    .child(Tag::danger().rounded_full().child(error.to_string())),
            )
            .into_any_element()
    }
}

pub(super) fn spawn_model_download(
    backend: AnalyzerBackend,
    tx: Sender<DownloadMessage>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let models_dir = backend.models_dir();
        let result = ensure_all_models_ready(&models_dir, |event| {
            let _ = tx.send(DownloadMessage::Event(event));
        });

        match result {
            Ok(()) => {
                let _ = tx.send(DownloadMessage::AllReady);
            }
            Err(err) => {
                log::error!("failed to prepare model bundle: {err:?}");
                let _ = tx.send(DownloadMessage::Error(format!("{err:#}")));
            }
        }
    })
}

fn progress_bar_string(downloaded: u64, total: Option<u64>) -> String {
    const BAR_LEN: usize = 30;
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            let filled = ((pct * BAR_LEN as f64).round() as usize).min(BAR_LEN);
            let empty = BAR_LEN.saturating_sub(filled);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(empty),
                pct * 100.0
            )
        }
        _ => {
            let spinner_width = ((downloaded / 64) as usize % (BAR_LEN.max(1))) + 1;
            format!(
                "[{:-<width$}] unknown size",
                ">",
                width = spinner_width.min(BAR_LEN)
            )
        }
    }
}
