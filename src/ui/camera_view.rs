use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, CameraDevice, CameraError,
    CameraPhase, CameraState, Context, FluentBuilder, InteractiveElement, IntoElement,
    ParentElement, Screen, SharedString, Styled, StyledExt, div, h_flex, pipeline, v_flex,
};

impl AppView {
    /// Enumerate devices once the model bundle is ready. No backend or no
    /// device at all maps to the terminal Unsupported state.
    pub(super) fn initial_camera_phase(&mut self) -> CameraPhase {
        match pipeline::available_cameras() {
            Ok(cameras) if cameras.is_empty() => {
                self.camera_state = CameraState::Unsupported;
                self.available_cameras = Vec::new();
                CameraPhase::Unsupported {
                    message: "No camera was found on this device".to_string(),
                }
            }
            Ok(cameras) => {
                self.available_cameras = cameras.clone();
                self.selected_camera_idx = Some(0);
                CameraPhase::Selection {
                    options: cameras,
                    selected: 0,
                    start_error: None,
                }
            }
            Err(err) => {
                log::error!("camera enumeration failed: {err}");
                self.camera_state = CameraState::Unsupported;
                self.available_cameras = Vec::new();
                CameraPhase::Unsupported {
                    message: format!("Video capture not supported on this device: {err}"),
                }
            }
        }
    }

    pub(super) fn render_camera_view(
        &mut self,
        phase: &mut CameraPhase,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        match phase {
            CameraPhase::Unsupported { message } => v_flex()
                .gap_2()
                .p_4()
                .rounded_lg()
                .border_1()
                .border_color(theme.border)
                .bg(theme.group_box)
                .child(
                    div()
                        .text_sm()
                        .text_color(theme.accent)
                        .font_semibold()
                        .child("⚠ Camera unavailable"),
                )
                .child(
                    div()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child("Check that a camera is connected and permitted."),
                )
                .child(div().text_color(theme.foreground).child(message.clone()))
                .into_any_element(),
            CameraPhase::Selection {
                options,
                selected,
                start_error,
            } => {
                if options.len() == 1 && self.camera_stream.is_none() && start_error.is_none() {
                    let device = options[0].clone();
                    match self.start_camera_for_device(&device) {
                        Ok(()) => {
                            *phase = CameraPhase::Starting;
                            return div()
                                .child(div().child("Starting camera..."))
                                .into_any_element();
                        }
                        Err(err) => {
                            *start_error = Some(err);
                        }
                    }
                }

                let error_msg = start_error.as_deref();
                let picker = self.render_camera_picker(options, *selected, error_msg, cx);

                div()
                    .size_full()
                    .flex()
                    .items_center()
                    .justify_center()
                    .bg(gpui::rgba(0x1a233288))
                    .child(div().w(super::px(450.0)).child(picker))
                    .into_any_element()
            }
            CameraPhase::Starting => v_flex()
                .gap_2()
                .p_4()
                .rounded_lg()
                .border_1()
                .border_color(theme.border)
                .bg(theme.group_box)
                .child(
                    div()
                        .text_sm()
                        .text_color(theme.foreground)
                        .child("⟳ Starting camera..."),
                )
                .into_any_element(),
        }
    }

    fn render_camera_picker(
        &mut self,
        cameras: &[CameraDevice],
        selected_idx: usize,
        error_msg: Option<&str>,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let mut picker = v_flex()
            .gap_2()
            .p_4()
            .rounded_xl()
            .bg(gpui::rgba(0x0f1419f5))
            .border_1()
            .border_color(gpui::rgba(0x2d3748ff))
            .shadow_lg();

        let title_row = h_flex()
            .gap_2()
            .items_center()
            .w_full()
            .mb_2()
            .child(
                div()
                    .text_base()
                    .text_color(gpui::rgb(0xa5b4fc))
                    .child("◉"),
            )
            .child(
                div()
                    .text_sm()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child("Choose a camera"),
            );

        picker = picker.child(title_row);

        for (idx, device) in cameras.iter().enumerate() {
            let is_selected = selected_idx == idx;

            picker = picker.child(
                h_flex()
                    .w_full()
                    .gap_3()
                    .items_center()
                    .p_3()
                    .rounded_lg()
                    .cursor_pointer()
                    .bg(if is_selected {
                        gpui::rgba(0x2d374855)
                    } else {
                        gpui::rgba(0x1e293b00)
                    })
                    .border_1()
                    .border_color(if is_selected {
                        gpui::rgba(0x64748bff)
                    } else {
                        gpui::rgba(0x33415500)
                    })
                    .hover(|this| {
                        this.bg(gpui::rgba(0x2d374844))
                            .border_color(gpui::rgba(0x475569ff))
                    })
                    .on_mouse_down(
                        gpui::MouseButton::Left,
                        cx.listener(move |this, _, _, cx| {
                            this.select_camera(idx);
                            cx.notify();
                        }),
                    )
                    .child(
                        div()
                            .text_lg()
                            .flex_shrink_0()
                            .text_color(if is_selected {
                                gpui::rgb(0xa5b4fc)
                            } else {
                                gpui::rgb(0x94a3b8)
                            })
                            .child("●"),
                    )
                    .child(
                        div()
                            .flex_1()
                            .text_sm()
                            .text_color(if is_selected {
                                gpui::rgb(0xe2e8f0)
                            } else {
                                gpui::rgb(0xcbd5e1)
                            })
                            .overflow_hidden()
                            .text_ellipsis()
                            .whitespace_nowrap()
                            .child(device.label.clone()),
                    )
                    .when(is_selected, |this| {
                        this.child(
                            div()
                                .text_sm()
                                .flex_shrink_0()
                                .text_color(gpui::rgb(0xa5b4fc))
                                .child("✓"),
                        )
                    }),
            );
        }

        if let Some(err) = error_msg {
            picker = picker.child(
                h_flex()
                    .gap_2()
                    .items_start()
                    .mt_2()
                    .p_3()
                    .rounded_lg()
                    .bg(gpui::rgba(0x7f1d1d33))
                    .border_1()
                    .border_color(gpui::rgba(0xef4444aa))
                    .child(
                        div()
                            .text_sm()
                            .flex_shrink_0()
                            .text_color(gpui::rgb(0xfca5a5))
                            .child("!"),
                    )
                    .child(
                        div()
                            .flex_1()
                            .text_xs()
                            .text_color(gpui::rgb(0xfca5a5))
                            .overflow_hidden()
                            .child(err.to_string()),
                    ),
            );
        }

        picker = picker.child(
            Button::new(SharedString::from("camera-confirm"))
                .primary()
                .label("✓ Use selected camera")
                .w_full()
                .mt_2()
                .on_click(cx.listener(|this, _, _, cx| {
                    this.start_selected_camera();
                    cx.notify();
                })),
        );

        picker.into_any_element()
    }

    fn select_camera(&mut self, selected: usize) {
        if let Screen::Camera(CameraPhase::Selection {
            options,
            selected: current,
            start_error,
        }) = &mut self.screen
        {
            if selected < options.len() {
                *current = selected;
                *start_error = None;
                self.selected_camera_idx = Some(selected);
                self.available_cameras = options.clone();
            }
        }
    }

    fn start_selected_camera(&mut self) {
        let selected_device = match &self.screen {
            Screen::Camera(CameraPhase::Selection {
                options, selected, ..
            }) => {
                self.available_cameras = options.clone();
                options
                    .get(*selected)
                    .cloned()
                    .map(|device| (*selected, device))
            }
            _ => None,
        };

        let Some((selected_idx, device)) = selected_device else {
            if let Screen::Camera(CameraPhase::Selection { start_error, .. }) = &mut self.screen {
                *start_error = Some("The selected camera could not be found".to_string());
            }
            return;
        };

        match self.start_camera_for_device(&device) {
            Ok(()) => {
                self.selected_camera_idx = Some(selected_idx);
                self.screen = Screen::Camera(CameraPhase::Starting);
            }
            Err(err) => {
                if let Screen::Camera(CameraPhase::Selection { start_error, .. }) = &mut self.screen
                {
                    *start_error = Some(err);
                }
            }
        }
    }

    fn stop_camera_stream(&mut self) {
        if let Some(stream) = self.camera_stream.take() {
            stream.stop();
        }
    }

    /// Acquire the stream. Success is the Pending→Streaming transition;
    /// failure lands in Denied (or Unsupported if the backend vanished) and
    /// stays there unless the user explicitly picks a device again.
    fn start_camera_for_device(&mut self, device: &CameraDevice) -> Result<(), String> {
        self.stop_camera_stream();

        match pipeline::start_camera_stream(
            device.index.clone(),
            self.analyzer_frame_tx.clone(),
            self.ui_frame_tx.clone(),
            self.warning_tx.clone(),
        ) {
            Ok(stream) => {
                self.camera_stream = Some(stream);
                self.camera_state = CameraState::Streaming;
                self.latest_frame = None;
                self.latest_analysis = None;
                self.latest_summary = None;
                self.latest_image = None;
                self.camera_error = None;
                self.playback_warning = None;
                Ok(())
            }
            Err(err) => {
                self.camera_state = match err {
                    CameraError::Unsupported => CameraState::Unsupported,
                    CameraError::Denied(_) => CameraState::Denied,
                };
                let message = format!("Please grant camera permissions: {err}");
                self.camera_error = Some(message.clone());
                Err(message)
            }
        }
    }
}
