use super::{
    AnyElement, AppContext, AppView, Button, ButtonVariants, Context, InputState, IntoElement,
    ParentElement, SharedString, Styled, StyledExt, TextInput, Window, div, h_flex, login, v_flex,
};

impl AppView {
    /// The input entities need a window, so they are created on the first
    /// render of the login screen rather than in `new`.
    pub(super) fn ensure_login_inputs(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        if self.email_input.is_none() {
            self.email_input = Some(cx.new(|cx| {
                InputState::new(window, cx).placeholder("you@example.com")
            }));
        }
        if self.password_input.is_none() {
            self.password_input = Some(cx.new(|cx| {
                InputState::new(window, cx)
                    .placeholder("At least 6 characters")
                    .masked(true)
            }));
        }
    }

    pub(super) fn poll_login_events(&mut self) {
        // Either outcome just stops the spinner; failures were already
        // logged by the submit thread.
        while self.login_done_rx.try_recv().is_ok() {
            self.login_busy = false;
        }
    }

    pub(super) fn render_login_view(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let (Some(email_input), Some(password_input)) =
            (self.email_input.clone(), self.password_input.clone())
        else {
            return div().into_any_element();
        };

        let eye_label = if self.password_visible { "🙈" } else { "👁" };

        let mut card = v_flex()
            .gap_4()
            .p_6()
            .w(super::px(420.0))
            .rounded_xl()
            .bg(gpui::rgba(0x0f1419f5))
            .border_1()
            .border_color(gpui::rgba(0x2d3748ff))
            .shadow_lg()
            .child(
                div()
                    .text_lg()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child("Login"),
            )
            .child(
                v_flex()
                    .gap_1()
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0x8b95a5))
                            .child("Email"),
                    )
                    .child(TextInput::new(&email_input)),
            )
            .child(
                v_flex()
                    .gap_1()
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0x8b95a5))
                            .child("Password"),
                    )
                    .child(
                        h_flex()
                            .gap_2()
                            .items_center()
                            .child(div().flex_1().child(TextInput::new(&password_input)))
                            .child(
                                Button::new(SharedString::from("password-visibility"))
                                    .ghost()
                                    .label(eye_label)
                                    .on_click(cx.listener(|this, _, _, cx| {
                                        this.toggle_password_visibility(cx);
                                        cx.notify();
                                    })),
                            ),
                    ),
            );

        if let Some(error) = &self.login_error {
            card = card.child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .p_3()
                    .rounded_lg()
                    .bg(gpui::rgba(0x7f1d1d33))
                    .border_1()
                    .border_color(gpui::rgba(0xef4444aa))
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0xfca5a5))
                            .child(error.clone()),
                    ),
            );
        }

        card = card.child(
            Button::new(SharedString::from("login-submit"))
                .primary()
                .label("Submit")
                .w_full()
                .loading(self.login_busy)
                .disabled(self.login_busy)
                .on_click(cx.listener(|this, _, _, cx| {
                    this.submit_login(cx);
                    cx.notify();
                })),
        );

        div()
            .size_full()
            .flex()
            .items_center()
            .justify_center()
            .child(card)
            .into_any_element()
    }

    fn toggle_password_visibility(&mut self, cx: &mut Context<'_, Self>) {
        self.password_visible = !self.password_visible;
        let masked = !self.password_visible;
        if let Some(input) = &self.password_input {
            input.update(cx, |state, cx| {
                state.set_masked(masked, cx);
            });
        }
    }

    /// Validation failure blocks with a visible message and performs no
    /// network call; a valid submit runs on a background thread while the
    /// button spins.
    fn submit_login(&mut self, cx: &mut Context<'_, Self>) {
        if self.login_busy {
            return;
        }

        let email = self
            .email_input
            .as_ref()
            .map(|input| input.read(cx).value().to_string())
            .unwrap_or_default();
        let password = self
            .password_input
            .as_ref()
            .map(|input| input.read(cx).value().to_string())
            .unwrap_or_default();

        if let Err(err) = login::validate(&email, &password) {
            self.login_error = Some(format!("Incorrect email or password format: {err}"));
            return;
        }

        self.login_error = None;
        self.login_busy = true;
        // Fire-and-forget; completion comes back over login_done_rx.
        let _ = login::spawn_submit(email, password, self.login_done_tx.clone());
    }
}
