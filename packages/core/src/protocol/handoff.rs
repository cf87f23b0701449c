// Формирование URI для передачи во внешние приложения

use crate::protocol::messages::{Channel, HandoffRequest};
use crate::utils::error::HandoffError;
use url::form_urlencoded;

/// Percent-encodes a message body for a query string. Spaces become `%20`
/// rather than `+`, which SMS apps would show literally.
pub fn encode_body(body: &str) -> String {
    form_urlencoded::byte_serialize(body.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Keeps digits and a single leading `+`.
pub fn normalize_phone(raw: &str) -> Result<String, HandoffError> {
    let trimmed = raw.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        normalized.push('+');
    }
    normalized.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));

    if normalized.trim_start_matches('+').is_empty() {
        return Err(HandoffError::InvalidTarget(raw.to_string()));
    }
    Ok(normalized)
}

fn validate_email(raw: &str) -> Result<String, HandoffError> {
    let email = raw.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email.to_string()),
        _ => Err(HandoffError::InvalidTarget(raw.to_string())),
    }
}

/// Builds the request for a hand-off channel. `InApp` is not a hand-off.
pub fn build_request(
    channel: Channel,
    target: &str,
    body: Option<&str>,
) -> Result<HandoffRequest, HandoffError> {
    let body = body.filter(|b| !b.is_empty());
    match channel {
        Channel::Sms => {
            let number = normalize_phone(target)?;
            let uri = match body {
                Some(text) => format!("sms:{}?body={}", number, encode_body(text)),
                None => format!("sms:{}", number),
            };
            Ok(HandoffRequest {
                channel,
                target: number,
                body: body.map(str::to_string),
                uri,
            })
        }
        Channel::Call => {
            let number = normalize_phone(target)?;
            Ok(HandoffRequest {
                channel,
                uri: format!("tel:{}", number),
                target: number,
                body: None,
            })
        }
        Channel::Email => {
            let address = validate_email(target)?;
            let uri = match body {
                Some(text) => format!("mailto:{}?body={}", address, encode_body(text)),
                None => format!("mailto:{}", address),
            };
            Ok(HandoffRequest {
                channel,
                target: address,
                body: body.map(str::to_string),
                uri,
            })
        }
        Channel::InApp => Err(HandoffError::InvalidTarget(
            "in-app messages are not handed off".to_string(),
        )),
    }
}
