//! # Wire Decoder
//!
//! Turns raw datagram bytes back into a [`Message`].
//!
//! Decoding is two-stage: strip the shared `cp` envelope token, then dispatch
//! on the variant header to the matching parser. Checksummed variants split
//! the checksum off the *last* space boundary (free text may contain internal
//! single spaces, so the final token is the only unambiguous place for it)
//! and verify the CRC-32 before interpreting any field.
//!
//! Decoding is pure: no caller state is touched on failure, and the failing
//! validation stage is reported in the [`DecodeError`] variant.

use crate::core::checksum::region_crc32;
use crate::core::message::{
    Command, CommandResponse, Message, ENVELOPE, HDR_COMMAND, HDR_COMMAND_RESPONSE,
    HDR_COOKIE_REQUEST, HDR_COOKIE_RESPONSE, HDR_VERIFICATION_REQUEST, HDR_VERIFICATION_RESPONSE,
};
use crate::error::DecodeError;

type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Decode one datagram payload into a [`Message`].
pub fn decode(payload: &[u8]) -> DecodeResult<Message> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::MalformedEnvelope)?;

    let body = text
        .strip_prefix(ENVELOPE)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or(DecodeError::MalformedEnvelope)?;

    let header = body.split(' ').next().unwrap_or_default();
    match header {
        HDR_COOKIE_REQUEST => parse_cookie_request(body),
        HDR_COOKIE_RESPONSE => parse_cookie_response(body),
        HDR_COMMAND => parse_command(body),
        HDR_COMMAND_RESPONSE => parse_command_response(body),
        HDR_VERIFICATION_REQUEST => parse_verification_request(body),
        HDR_VERIFICATION_RESPONSE => parse_verification_response(body),
        other => Err(DecodeError::UnknownVariant(other.to_string())),
    }
}

fn parse_cookie_request(body: &str) -> DecodeResult<Message> {
    if body == HDR_COOKIE_REQUEST {
        Ok(Message::CookieRequest)
    } else {
        Err(DecodeError::MalformedFields(
            "cookie request carries no fields".into(),
        ))
    }
}

fn parse_cookie_response(body: &str) -> DecodeResult<Message> {
    // cookie_response <ok|error> <payload>
    let rest = body
        .strip_prefix(HDR_COOKIE_RESPONSE)
        .and_then(|r| r.strip_prefix(' '))
        .ok_or_else(|| missing("success flag"))?;
    let (flag_token, payload) = rest.split_once(' ').ok_or_else(|| missing("payload"))?;

    let success = parse_flag(flag_token)?;
    validate_text_field("payload", payload)?;
    if payload.is_empty() {
        return Err(missing("payload"));
    }

    Ok(Message::CookieResponse {
        success,
        payload: payload.to_string(),
    })
}

fn parse_command(body: &str) -> DecodeResult<Message> {
    // command <id> <cookie> <length> <command> [message] <checksum>
    let region = split_checksum(body)?;

    let mut fields = region.splitn(6, ' ');
    let _header = fields.next();
    let id = parse_num::<u16>("id", fields.next())?;
    let cookie = parse_num::<i32>("cookie", fields.next())?;
    let length = parse_num::<usize>("length", fields.next())?;
    let command = fields.next().filter(|t| !t.is_empty()).ok_or_else(|| missing("command"))?;
    let message = fields.next().unwrap_or_default();

    validate_text_field("message", message)?;
    check_declared_length(length, message)?;

    Ok(Message::Command(Command {
        id,
        cookie,
        command: command.to_string(),
        message: message.to_string(),
    }))
}

fn parse_command_response(body: &str) -> DecodeResult<Message> {
    // command_response <id> <ok|error> <length> [message] <checksum>
    let region = split_checksum(body)?;

    let mut fields = region.splitn(5, ' ');
    let _header = fields.next();
    let id = parse_num::<u16>("id", fields.next())?;
    let success = parse_flag(fields.next().ok_or_else(|| missing("success flag"))?)?;
    let length = parse_num::<usize>("length", fields.next())?;
    let message = fields.next().unwrap_or_default();

    validate_text_field("message", message)?;
    check_declared_length(length, message)?;

    Ok(Message::CommandResponse(CommandResponse {
        id,
        success,
        message: message.to_string(),
    }))
}

fn parse_verification_request(body: &str) -> DecodeResult<Message> {
    // cookie_verification_request <id> <cookie> <checksum>
    let region = split_checksum(body)?;

    let mut fields = region.split(' ');
    let _header = fields.next();
    let id = parse_num::<u16>("id", fields.next())?;
    let cookie = parse_num::<i32>("cookie", fields.next())?;
    expect_end(fields.next())?;

    Ok(Message::CookieVerificationRequest { id, cookie })
}

fn parse_verification_response(body: &str) -> DecodeResult<Message> {
    // cookie_verification_response <id> <ok|error> <checksum>
    let region = split_checksum(body)?;

    let mut fields = region.split(' ');
    let _header = fields.next();
    let id = parse_num::<u16>("id", fields.next())?;
    let success = parse_flag(fields.next().ok_or_else(|| missing("success flag"))?)?;
    expect_end(fields.next())?;

    Ok(Message::CookieVerificationResponse { id, success })
}

/// Split the trailing checksum token off the body and verify it against the
/// remaining region. Runs before any field interpretation.
fn split_checksum(body: &str) -> DecodeResult<&str> {
    let (region, checksum_token) = body
        .rsplit_once(' ')
        .ok_or_else(|| missing("checksum"))?;
    let declared: u32 = checksum_token
        .parse()
        .map_err(|_| DecodeError::MalformedFields("checksum is not a decimal u32".into()))?;

    let computed = region_crc32(region);
    if declared != computed {
        return Err(DecodeError::ChecksumMismatch { declared, computed });
    }
    Ok(region)
}

fn parse_flag(token: &str) -> DecodeResult<bool> {
    match token {
        "ok" => Ok(true),
        "error" => Ok(false),
        other => Err(DecodeError::MalformedFields(format!(
            "success flag must be ok or error, got {other:?}"
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, token: Option<&str>) -> DecodeResult<T> {
    let token = token.filter(|t| !t.is_empty()).ok_or_else(|| missing(name))?;
    token
        .parse()
        .map_err(|_| DecodeError::MalformedFields(format!("{name} is not numeric: {token:?}")))
}

/// Free text inside a decoded message must be single-spaced; an embedded run
/// of whitespace means the sender's field boundaries are unrecoverable.
fn validate_text_field(name: &str, text: &str) -> DecodeResult<()> {
    if text.contains("  ")
        || text.chars().any(|c| c.is_whitespace() && c != ' ')
        || text.starts_with(' ')
        || text.ends_with(' ')
    {
        return Err(DecodeError::MalformedFields(format!(
            "{name} contains an unparseable whitespace run"
        )));
    }
    Ok(())
}

fn check_declared_length(declared: usize, message: &str) -> DecodeResult<()> {
    if declared != message.len() {
        return Err(DecodeError::MalformedFields(format!(
            "declared length {declared} does not match message length {}",
            message.len()
        )));
    }
    Ok(())
}

fn missing(name: &str) -> DecodeError {
    DecodeError::MalformedFields(format!("missing {name}"))
}

fn expect_end(token: Option<&str>) -> DecodeResult<()> {
    match token {
        None => Ok(()),
        Some(extra) => Err(DecodeError::MalformedFields(format!(
            "unexpected trailing token {extra:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: Message) {
        let wire = msg.encode().unwrap();
        assert_eq!(decode(&wire).unwrap(), msg);
    }

    #[test]
    fn roundtrips_every_variant() {
        roundtrip(Message::CookieRequest);
        roundtrip(Message::CookieResponse {
            success: true,
            payload: "348776110".into(),
        });
        roundtrip(Message::CookieResponse {
            success: false,
            payload: "server full".into(),
        });
        roundtrip(Message::Command(Command {
            id: 65535,
            cookie: i32::MAX,
            command: "print".into(),
            message: "hello from a client".into(),
        }));
        roundtrip(Message::Command(Command {
            id: 0,
            cookie: 0,
            command: "status".into(),
            message: String::new(),
        }));
        roundtrip(Message::CommandResponse(CommandResponse {
            id: 12,
            success: false,
            message: "invalid or expired cookie".into(),
        }));
        roundtrip(Message::CookieVerificationRequest {
            id: 1,
            cookie: 77,
        });
        roundtrip(Message::CookieVerificationResponse {
            id: 1,
            success: true,
        });
    }

    #[test]
    fn rejects_missing_envelope() {
        assert_eq!(
            decode(b"command 1 2 0 status 123"),
            Err(DecodeError::MalformedEnvelope)
        );
        assert_eq!(decode(b"cp"), Err(DecodeError::MalformedEnvelope));
        assert_eq!(decode(b""), Err(DecodeError::MalformedEnvelope));
        assert_eq!(decode(&[0xff, 0xfe]), Err(DecodeError::MalformedEnvelope));
    }

    #[test]
    fn rejects_unknown_variant() {
        assert_eq!(
            decode(b"cp teleport 1 2 3"),
            Err(DecodeError::UnknownVariant("teleport".into()))
        );
    }

    #[test]
    fn flips_anywhere_in_region_break_the_checksum() {
        let wire = Message::Command(Command {
            id: 9,
            cookie: 42,
            command: "print".into(),
            message: "abc".into(),
        })
        .encode()
        .unwrap();
        let region_end = wire.iter().rposition(|&b| b == b' ').unwrap();
        // "cp command " - corruption before this point breaks the envelope or
        // the dispatch header instead of the checksum.
        let fields_start = "cp command ".len();

        for pos in 0..region_end {
            let mut corrupted = wire.to_vec();
            corrupted[pos] ^= 0x01;
            let outcome = decode(&corrupted);
            assert!(outcome.is_err(), "corrupted byte {pos} decoded");
            if pos >= fields_start {
                assert!(
                    matches!(outcome, Err(DecodeError::ChecksumMismatch { .. })),
                    "byte {pos} slipped past the checksum: {outcome:?}"
                );
            }
        }
    }

    #[test]
    fn checksum_verified_before_fields() {
        // Garbage fields but a bad checksum: must surface as the checksum
        // failure, not a field error.
        assert!(matches!(
            decode(b"cp command x y z w 0"),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let region = "command 1 2 99 print hello";
        let wire = format!("cp {region} {}", crate::core::checksum::region_crc32(region));
        assert!(matches!(
            decode(wire.as_bytes()),
            Err(DecodeError::MalformedFields(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_id() {
        let region = "command abc 2 0 print";
        let wire = format!("cp {region} {}", crate::core::checksum::region_crc32(region));
        assert!(matches!(
            decode(wire.as_bytes()),
            Err(DecodeError::MalformedFields(_))
        ));
    }

    #[test]
    fn rejects_bad_success_flag() {
        let region = "command_response 1 maybe 0";
        let wire = format!("cp {region} {}", crate::core::checksum::region_crc32(region));
        assert!(matches!(
            decode(wire.as_bytes()),
            Err(DecodeError::MalformedFields(_))
        ));
    }

    #[test]
    fn rejects_cookie_request_with_fields() {
        assert!(matches!(
            decode(b"cp cookie_request extra"),
            Err(DecodeError::MalformedFields(_))
        ));
    }

    #[test]
    fn cookie_response_payload_may_contain_spaces() {
        let msg = decode(b"cp cookie_response error server full").unwrap();
        assert_eq!(
            msg,
            Message::CookieResponse {
                success: false,
                payload: "server full".into()
            }
        );
    }
}
