use std::thread;

use anyhow::Context;
use crossbeam_channel::Sender;
use serde::Serialize;
use thiserror::Error;

const SUBMIT_ENDPOINT: &str = "https://jsonplaceholder.typicode.com/posts";

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
}

/// Client-side gate in front of the submit request. Whitespace does not
/// count: a blank email or a padded five-character password is rejected.
pub fn validate(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::EmptyEmail);
    }
    if password.trim().len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

#[derive(Serialize)]
struct SubmitPayload<'a> {
    email: &'a str,
    password: &'a str,
}

/// The spinner stops on either outcome; a failed submit is logged only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed,
    Failed,
}

pub fn spawn_submit(
    email: String,
    password: String,
    done_tx: Sender<SubmitOutcome>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let outcome = match submit(&email, &password) {
            Ok(body) => {
                log::info!("login submit accepted: {body}");
                SubmitOutcome::Completed
            }
            Err(err) => {
                log::error!("login submit failed: {err:?}");
                SubmitOutcome::Failed
            }
        };
        let _ = done_tx.send(outcome);
    })
}

fn submit(email: &str, password: &str) -> anyhow::Result<String> {
    let payload = serde_json::to_string(&SubmitPayload { email, password })
        .context("failed to encode login payload")?;

    let client = reqwest::blocking::Client::new();
    let response = client
        .post(SUBMIT_ENDPOINT)
        .header("Content-Type", "application/json")
        .body(payload)
        .send()
        .context("failed to send login request")?
        .error_for_status()
        .context("login endpoint returned error status")?;

    response.text().context("failed to read login response body")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "abc123")]
    #[case("   ", "123456")]
    fn empty_or_whitespace_email_is_blocked(#[case] email: &str, #[case] password: &str) {
        assert_eq!(validate(email, password), Err(ValidationError::EmptyEmail));
    }

    #[test]
    fn short_password_is_blocked() {
        assert_eq!(
            validate("a@b.com", "12345"),
            Err(ValidationError::PasswordTooShort)
        );
    }

    #[test]
    fn padded_password_counts_trimmed_length() {
        assert_eq!(validate("a@b.com", " 12345 "), Err(ValidationError::PasswordTooShort));
        assert_eq!(validate("a@b.com", " 123456 "), Ok(()));
    }

    #[test]
    fn valid_credentials_pass() {
        assert_eq!(validate("a@b.com", "123456"), Ok(()));
    }

    #[test]
    fn payload_serializes_both_fields() {
        let json = serde_json::to_string(&SubmitPayload {
            email: "a@b.com",
            password: "123456",
        })
        .unwrap();
        assert_eq!(json, r#"{"email":"a@b.com","password":"123456"}"#);
    }
}
