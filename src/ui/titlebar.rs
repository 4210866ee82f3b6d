use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, CameraState, Context, Hsla,
    InteractiveElement, IntoElement, LoadState, LoopState, ParentElement, SharedString, Styled,
    Window, WindowControlArea, div, h_flex, px,
};

impl AppView {
    pub(super) fn render_titlebar(
        &self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let titlebar_height = px(32.0);
        let titlebar_bg = gpui::rgb(0x1a2332);
        let theme = cx.theme();

        let (models_icon, models_text, models_color): (&str, &str, Hsla) = match self.load_state {
            LoadState::Loading => ("○", "Loading models", theme.muted_foreground),
            LoadState::Ready => ("●", "Models ready", theme.success),
            LoadState::Failed => ("✗", "Models failed", theme.accent),
        };

        let (camera_icon, camera_text, camera_color): (&str, &str, Hsla) = match self.camera_state
        {
            CameraState::Pending => ("○", "Camera pending", theme.muted_foreground),
            CameraState::Streaming => ("●", "Camera live", theme.success),
            CameraState::Denied => ("✗", "Camera denied", theme.accent),
            CameraState::Unsupported => ("✗", "Camera unsupported", theme.accent),
        };

        let (loop_icon, loop_text, loop_color): (&str, &str, Hsla) = match self.loop_state {
            LoopState::NotStarted => ("○", "Detection idle", theme.muted_foreground),
            LoopState::Running => ("●", "Detecting", theme.success),
            LoopState::Stopped => ("○", "Detection stopped", theme.muted_foreground),
        };

        let toggle_label = if self.login_open {
            "Face Detection"
        } else {
            "Login Demo"
        };

        h_flex()
            .window_control_area(WindowControlArea::Drag)
            .h(titlebar_height)
            .w_full()
            .items_center()
            .justify_between()
            .bg(titlebar_bg)
            .child(
                h_flex()
                    .gap_3()
                    .pl(px(80.0))
                    .pr_3()
                    .h_full()
                    .items_center()
                    .child(status_chip(models_icon, models_text, models_color))
                    .child(status_chip(camera_icon, camera_text, camera_color))
                    .child(status_chip(loop_icon, loop_text, loop_color)),
            )
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        Button::new(SharedString::from("screen-toggle"))
                            .ghost()
                            .label(toggle_label)
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.login_open = !this.login_open;
                                cx.notify();
                            })),
                    )
                    .child(self.render_window_controls(window)),
            )
            .into_any_element()
    }

    #[cfg(target_os = "macos")]
    fn render_window_controls(&self, _window: &mut Window) -> AnyElement {
        div().into_any_element()
    }

    #[cfg(not(target_os = "macos"))]
    fn render_window_controls(&self, window: &mut Window) -> AnyElement {
        let button_size = px(28.0);
        let icon_size = px(16.0);
        let icon_color = gpui::rgb(0xc9d1d9);
        let hover_bg = gpui::rgb(0x1f2428);
        let close_hover_bg = gpui::rgb(0xe81123);

        let maximize_path = if window.is_maximized() {
            "M 5,7 H 11 V 13 H 5 Z M 7,7 V 4 H 13 V 10 H 11"
        } else {
            "M 4,4 H 12 V 12 H 4 Z"
        };

        h_flex()
            .gap_1()
            .px_2()
            .child(
                div()
                    .id("window-minimize")
                    .size(button_size)
                    .flex()
                    .items_center()
                    .justify_center()
                    .rounded_md()
                    .cursor_pointer()
                    .window_control_area(WindowControlArea::Min)
                    .hover(|s| s.bg(hover_bg))
                    .child(
                        gpui::svg()
                            .size(icon_size)
                            .path("M 4,8 H 12")
                            .text_color(icon_color),
                    ),
            )
            .child(
                div()
                    .id("window-maximize")
                    .size(button_size)
                    .flex()
                    .items_center()
                    .justify_center()
                    .rounded_md()
                    .cursor_pointer()
                    .window_control_area(WindowControlArea::Max)
                    .hover(|s| s.bg(hover_bg))
                    .child(
                        gpui::svg()
                            .size(icon_size)
                            .path(maximize_path)
                            .text_color(icon_color),
                    ),
            )
            .child(
                div()
                    .id("window-close")
                    .size(button_size)
                    .flex()
                    .items_center()
                    .justify_center()
                    .rounded_md()
                    .cursor_pointer()
                    .window_control_area(WindowControlArea::Close)
                    .hover(|s| s.bg(close_hover_bg))
                    .child(
                        gpui::svg()
                            .size(icon_size)
                            .path("M 4,4 L 12,12 M 12,4 L 4,12")
                            .text_color(icon_color),
                    ),
            )
            .into_any_element()
    }
}

fn status_chip(icon: &str, text: &str, color: Hsla) -> AnyElement {
    div()
        .px_2()
        .py_0p5()
        .rounded_md()
        .bg(gpui::rgba(0x00000033))
        .text_xs()
        .text_color(color)
        .child(format!("{icon} {text}"))
        .into_any_element()
}
