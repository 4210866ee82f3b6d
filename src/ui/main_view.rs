use std::sync::Arc;

use super::render_util::{frame_to_image, raw_frame_to_image};
use super::{
    AnyElement, AppView, Button, ButtonVariants, CAMERA_MAX_HEIGHT, CAMERA_MIN_HEIGHT,
    CAMERA_PANEL_WIDTH, Context, DEFAULT_CAMERA_RATIO, IntoElement, ObjectFit, ParentElement,
    SNAPSHOT_PANEL_WIDTH, SharedString, Styled, StyledExt, StyledImage, Window, h_flex, snapshot,
    v_flex,
};

impl AppView {
    pub(super) fn render_live(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        self.poll_pipeline_channels(window, cx);

        let camera_label = self
            .selected_camera_idx
            .and_then(|idx| self.available_cameras.get(idx))
            .map(|c| c.label.clone())
            .unwrap_or_else(|| "No camera selected".to_string());

        let frame_status = self
            .latest_frame
            .as_ref()
            .map(|f| format!("Camera: {camera_label} {}x{}", f.width, f.height))
            .unwrap_or_else(|| format!("Camera: {camera_label}, waiting for frames..."));

        let faces_text = self
            .latest_analysis
            .as_ref()
            .map(|a| match a.faces.as_slice() {
                [] => "No face in frame".to_string(),
                [face] => format!("1 face ({:.0}%)", face.score * 100.0),
                faces => format!("{} faces", faces.len()),
            })
            .unwrap_or_else(|| "--".to_string());

        let ratio = self.camera_aspect_ratio();
        let camera_height =
            (CAMERA_PANEL_WIDTH / ratio).clamp(CAMERA_MIN_HEIGHT, CAMERA_MAX_HEIGHT);

        let frame_view: AnyElement = if let Some(image) = &self.latest_image {
            super::img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .rounded_t_lg()
                .into_any_element()
        } else {
            super::div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .rounded_t_lg()
                .child("Waiting for camera...")
                .into_any_element()
        };

        let camera_shell = super::div()
            .relative()
            .w(super::px(CAMERA_PANEL_WIDTH))
            .h(super::px(camera_height))
            .overflow_hidden()
            .rounded_t_lg()
            .bg(gpui::rgb(0x000000))
            .child(frame_view);

        let mut info_column = v_flex().gap_2().p_3().child(
            h_flex()
                .justify_between()
                .items_center()
                .gap_2()
                .child(
                    super::div()
                        .text_xs()
                        .text_color(gpui::rgb(0xa0aab8))
                        .child(faces_text),
                )
                .child(
                    Button::new(SharedString::from("take-snapshot"))
                        .primary()
                        .label("Take Snapshot")
                        .on_click(cx.listener(|this, _, window, cx| {
                            this.take_snapshot(window, cx);
                            cx.notify();
                        })),
                ),
        );

        info_column = info_column.child(
            super::div()
                .text_xs()
                .text_color(gpui::rgb(0x8b95a5))
                .overflow_hidden()
                .text_ellipsis()
                .whitespace_nowrap()
                .child(frame_status),
        );

        if let Some(error) = &self.camera_error {
            info_column = info_column.child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .p_2()
                    .rounded_lg()
                    .bg(gpui::rgba(0xef444433))
                    .border_1()
                    .border_color(gpui::rgba(0xef4444ff))
                    .child(super::div().text_xs().child("✗"))
                    .child(
                        super::div()
                            .text_xs()
                            .text_color(gpui::rgb(0xfca5a5))
                            .overflow_hidden()
                            .text_ellipsis()
                            .child(error.clone()),
                    ),
            );
        }

        if let Some(warning) = &self.playback_warning {
            info_column = info_column.child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .p_2()
                    .rounded_lg()
                    .bg(gpui::rgba(0xf59e0b22))
                    .border_1()
                    .border_color(gpui::rgba(0xf59e0baa))
                    .child(super::div().text_xs().child("⚠"))
                    .child(
                        super::div()
                            .text_xs()
                            .text_color(gpui::rgb(0xfcd34d))
                            .overflow_hidden()
                            .text_ellipsis()
                            .child(warning.clone()),
                    ),
            );
        }

        let camera_card = super::div().w(super::px(CAMERA_PANEL_WIDTH)).child(
            v_flex()
                .w_full()
                .rounded_lg()
                .overflow_hidden()
                .bg(gpui::rgb(0x0f1419))
                .child(camera_shell)
                .child(info_column),
        );

        h_flex()
            .size_full()
            .gap_3()
            .p_4()
            .items_start()
            .justify_center()
            .child(camera_card)
            .child(self.render_snapshot_panel(cx))
            .into_any_element()
    }

    fn poll_pipeline_channels(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        while let Ok(analysis) = self.result_rx.try_recv() {
            // Frames with no face keep the previous summary; on multi-face
            // frames the last face wins.
            if let Some(face) = analysis.faces.last() {
                self.latest_summary = Some(face.summary());
            }
            self.latest_analysis = Some(analysis);
        }

        while let Ok(warning) = self.warning_rx.try_recv() {
            self.playback_warning = Some(warning);
        }

        let frame_rx = self.ui_frame_rx.take();
        if let Some(rx) = frame_rx.as_ref() {
            let mut frames = Vec::new();
            while let Ok(frame) = rx.try_recv() {
                frames.push(frame);
            }

            for frame in frames {
                if let Some(image) = frame_to_image(&frame, self.latest_analysis.as_ref()) {
                    self.replace_latest_image(image, window, cx);
                }
                self.latest_frame = Some(frame);
            }
        }
        self.ui_frame_rx = frame_rx;
    }

    fn render_snapshot_panel(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        let _ = cx;
        let mut panel = v_flex()
            .w(super::px(SNAPSHOT_PANEL_WIDTH))
            .gap_2()
            .p_3()
            .rounded_lg()
            .bg(gpui::rgb(0x0f1419))
            .child(
                super::div()
                    .text_sm()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child("Snapshot"),
            );

        match (&self.snapshot, &self.snapshot_image) {
            (Some(record), Some(image)) => {
                panel = panel.child(
                    super::div()
                        .w_full()
                        .overflow_hidden()
                        .rounded_lg()
                        .bg(gpui::rgb(0x000000))
                        .child(
                            super::img(image.clone())
                                .w_full()
                                .object_fit(ObjectFit::Contain),
                        ),
                );

                panel = panel.child(
                    super::div()
                        .text_xs()
                        .text_color(gpui::rgb(0x8b95a5))
                        .child(format!(
                            "{}x{} PNG, {} KB",
                            record.width,
                            record.height,
                            record.png.len() / 1024
                        )),
                );

                panel = panel.child(match &record.summary {
                    Some(summary) => v_flex()
                        .gap_1()
                        .mt_1()
                        .child(
                            super::div()
                                .text_sm()
                                .font_semibold()
                                .text_color(gpui::rgb(0xe2e8f0))
                                .child("Detected info"),
                        )
                        .child(summary_row("Gender", summary.gender.label().to_string()))
                        .child(summary_row("Age", format!("{} years", summary.age_years)))
                        .child(summary_row(
                            "Expression",
                            summary.expression.label().to_string(),
                        ))
                        .into_any_element(),
                    None => super::div()
                        .text_xs()
                        .text_color(gpui::rgb(0x8b95a5))
                        .child("No face detected yet")
                        .into_any_element(),
                });
            }
            _ => {
                panel = panel.child(
                    super::div()
                        .text_xs()
                        .text_color(gpui::rgb(0x8b95a5))
                        .child("Press Take Snapshot to capture the current frame."),
                );
            }
        }

        panel.into_any_element()
    }

    /// Synchronous capture of the current raw frame plus the last known
    /// face summary. Each capture replaces the previous record.
    fn take_snapshot(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let Some(frame) = self.latest_frame.clone() else {
            log::warn!("snapshot requested before any camera frame arrived");
            return;
        };

        match snapshot::capture(&frame, self.latest_summary) {
            Ok(record) => {
                self.snapshot = Some(record);
                if let Some(image) = raw_frame_to_image(&frame) {
                    if let Some(old) = self.snapshot_image.replace(image) {
                        cx.drop_image(old, Some(window));
                    }
                }
            }
            Err(err) => {
                log::error!("snapshot capture failed: {err:?}");
            }
        }
    }

    fn camera_aspect_ratio(&self) -> f32 {
        if let Some(frame) = &self.latest_frame {
            if frame.height > 0 {
                return frame.width as f32 / frame.height as f32;
            }
        }
        DEFAULT_CAMERA_RATIO
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<super::RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // Explicitly drop the previous GPU texture; otherwise the sprite atlas keeps
            // every frame and memory will climb rapidly while the camera is running.
            cx.drop_image(old_image, Some(window));
        }
    }
}

fn summary_row(label: &'static str, value: String) -> AnyElement {
    h_flex()
        .justify_between()
        .gap_2()
        .child(
            super::div()
                .text_xs()
                .text_color(gpui::rgb(0x8b95a5))
                .child(label),
        )
        .child(
            super::div()
                .text_xs()
                .text_color(gpui::rgb(0xcbd5e1))
                .child(value),
        )
        .into_any_element()
}
