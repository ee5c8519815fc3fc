//! # Protocol Messages
//!
//! The closed set of CP message variants and their wire encoding.
//!
//! Every message shares the two-token envelope `cp <variant-header>`. The
//! variant header selects the parser on decode; the remaining tokens are the
//! variant's fields in a fixed order (see [`crate::core`] for the grammar).
//!
//! Encoding is deterministic and injective per variant as long as free-text
//! fields are single-spaced, which [`Message::encode`] enforces.

use bytes::Bytes;

use crate::core::checksum::region_crc32;
use crate::error::{CpError, Result};

/// Shared envelope token identifying a payload as CP traffic.
pub const ENVELOPE: &str = "cp";

pub(crate) const HDR_COOKIE_REQUEST: &str = "cookie_request";
pub(crate) const HDR_COOKIE_RESPONSE: &str = "cookie_response";
pub(crate) const HDR_COMMAND: &str = "command";
pub(crate) const HDR_COMMAND_RESPONSE: &str = "command_response";
pub(crate) const HDR_VERIFICATION_REQUEST: &str = "cookie_verification_request";
pub(crate) const HDR_VERIFICATION_RESPONSE: &str = "cookie_verification_response";

/// A client command in flight to the command server.
///
/// `length` and `checksum` are wire-only: the declared length is always the
/// byte length of `message` and the checksum is recomputed on encode, so
/// neither is stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Client-chosen correlation id, monotonic within a session.
    pub id: u16,
    /// Session cookie presented for verification.
    pub cookie: i32,
    /// Command keyword, a single whitespace-free token.
    pub command: String,
    /// Optional free-text argument (single-spaced, possibly empty).
    pub message: String,
}

/// The command server's reply to a [`Command`], echoing its `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub id: u16,
    pub success: bool,
    /// Reply text (single-spaced, possibly empty).
    pub message: String,
}

/// A decoded CP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Client → cookie server: request a fresh session cookie.
    CookieRequest,
    /// Cookie server → client: the issued cookie value as text, or a
    /// rejection reason.
    CookieResponse { success: bool, payload: String },
    /// Client → command server.
    Command(Command),
    /// Command server → client.
    CommandResponse(CommandResponse),
    /// Command server → cookie server: verify a presented cookie. `id` is
    /// the command server's correlation token, echoed back in the response.
    CookieVerificationRequest { id: u16, cookie: i32 },
    /// Cookie server → command server.
    CookieVerificationResponse { id: u16, success: bool },
}

impl Message {
    /// Serialize to wire bytes: envelope, fields in documented order, and a
    /// trailing checksum where the variant carries one.
    ///
    /// Fails with [`CpError::UnencodableText`] if a token or free-text field
    /// contains whitespace the wire format cannot round-trip.
    pub fn encode(&self) -> Result<Bytes> {
        let body = match self {
            Message::CookieRequest => HDR_COOKIE_REQUEST.to_string(),
            Message::CookieResponse { success, payload } => {
                validate_text(payload)?;
                if payload.is_empty() {
                    return Err(CpError::UnencodableText(
                        "cookie response payload must not be empty".into(),
                    ));
                }
                format!("{HDR_COOKIE_RESPONSE} {} {payload}", flag(*success))
            }
            Message::Command(cmd) => {
                validate_token(&cmd.command)?;
                validate_text(&cmd.message)?;
                let region = if cmd.message.is_empty() {
                    format!("{HDR_COMMAND} {} {} 0 {}", cmd.id, cmd.cookie, cmd.command)
                } else {
                    format!(
                        "{HDR_COMMAND} {} {} {} {} {}",
                        cmd.id,
                        cmd.cookie,
                        cmd.message.len(),
                        cmd.command,
                        cmd.message
                    )
                };
                with_checksum(region)
            }
            Message::CommandResponse(res) => {
                validate_text(&res.message)?;
                let region = if res.message.is_empty() {
                    format!("{HDR_COMMAND_RESPONSE} {} {} 0", res.id, flag(res.success))
                } else {
                    format!(
                        "{HDR_COMMAND_RESPONSE} {} {} {} {}",
                        res.id,
                        flag(res.success),
                        res.message.len(),
                        res.message
                    )
                };
                with_checksum(region)
            }
            Message::CookieVerificationRequest { id, cookie } => {
                with_checksum(format!("{HDR_VERIFICATION_REQUEST} {id} {cookie}"))
            }
            Message::CookieVerificationResponse { id, success } => with_checksum(format!(
                "{HDR_VERIFICATION_RESPONSE} {id} {}",
                flag(*success)
            )),
        };

        Ok(Bytes::from(format!("{ENVELOPE} {body}")))
    }
}

fn with_checksum(region: String) -> String {
    let crc = region_crc32(&region);
    format!("{region} {crc}")
}

/// Wire spelling of a success flag.
pub(crate) fn flag(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "error"
    }
}

/// A token field must be a single non-empty run of non-whitespace characters.
fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(CpError::UnencodableText(format!(
            "token field must be one whitespace-free word, got {token:?}"
        )));
    }
    Ok(())
}

/// Free text rides the wire between single-space separators, so only
/// single-spaced text survives a round trip. Anything else is rejected here
/// rather than silently mangled.
fn validate_text(text: &str) -> Result<()> {
    let single_spaced = !text.contains("  ")
        && !text.chars().any(|c| c.is_whitespace() && c != ' ')
        && !text.starts_with(' ')
        && !text.ends_with(' ');
    if single_spaced {
        Ok(())
    } else {
        Err(CpError::UnencodableText(format!(
            "free-text field must be single-spaced, got {text:?}"
        )))
    }
}
