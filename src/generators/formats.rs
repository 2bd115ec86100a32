//! Built-in string format strategies.
//!
//! Each registered format produces syntactically valid samples for its
//! `format` keyword; schemas with an unregistered format fall back to
//! generic strings constrained only by `minLength`/`maxLength`/`pattern`.

use chrono::{TimeZone, Utc};
use uuid::Uuid;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[must_use]
pub fn is_registered(format: &str) -> bool {
    matches!(
        format,
        "date" | "date-time" | "uuid" | "byte" | "binary" | "email" | "ipv4" | "ipv6"
    )
}

/// Generate a value for a registered `format`, or `None` if unregistered.
#[must_use]
pub fn generate(format: &str, rng: &mut fastrand::Rng) -> Option<String> {
    match format {
        "date" => Some(generate_date(rng)),
        "date-time" => Some(generate_date_time(rng)),
        "uuid" => Some(Uuid::from_bytes(rng.u128(..).to_le_bytes()[..16].try_into().unwrap()).to_string()),
        "byte" => Some(generate_byte(rng)),
        "binary" => Some(generate_byte(rng)),
        "email" => Some(generate_email(rng)),
        "ipv4" => Some(generate_ipv4(rng)),
        "ipv6" => Some(generate_ipv6(rng)),
        _ => None,
    }
}

/// Generate a value that syntactically *violates* `format` — used by the
/// negative-mode generator when `format` is the negated keyword.
#[must_use]
pub fn generate_invalid(format: &str, rng: &mut fastrand::Rng) -> Option<String> {
    match format {
        "date" | "date-time" => Some("not-a-date".to_string()),
        "uuid" => Some("not-a-uuid".to_string()),
        "email" => Some("not-an-email".to_string()),
        "ipv4" => Some("999.999.999.999".to_string()),
        "ipv6" => Some("not-an-ipv6-address".to_string()),
        "byte" => Some("***not-base64***".to_string()),
        _ => {
            let _ = rng;
            None
        }
    }
}

fn generate_date(rng: &mut fastrand::Rng) -> String {
    let days_since_epoch = rng.i64(0..20_000);
    Utc.timestamp_opt(days_since_epoch * 86_400, 0)
        .single()
        .map_or_else(|| "1970-01-01".to_string(), |dt| dt.format("%Y-%m-%d").to_string())
}

fn generate_date_time(rng: &mut fastrand::Rng) -> String {
    let secs_since_epoch = rng.i64(0..1_900_000_000);
    Utc.timestamp_opt(secs_since_epoch, 0)
        .single()
        .map_or_else(|| "1970-01-01T00:00:00Z".to_string(), |dt| dt.to_rfc3339())
}

fn generate_byte(rng: &mut fastrand::Rng) -> String {
    use base64::Engine;
    let len = rng.usize(0..=16);
    let bytes: Vec<u8> = (0..len).map(|_| rng.u8(..)).collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn generate_email(rng: &mut fastrand::Rng) -> String {
    format!("{}@{}.example", random_token(rng, 6), random_token(rng, 4))
}

fn generate_ipv4(rng: &mut fastrand::Rng) -> String {
    format!("{}.{}.{}.{}", rng.u8(..), rng.u8(..), rng.u8(..), rng.u8(..))
}

fn generate_ipv6(rng: &mut fastrand::Rng) -> String {
    (0..8)
        .map(|_| format!("{:x}", rng.u16(..)))
        .collect::<Vec<_>>()
        .join(":")
}

fn random_token(rng: &mut fastrand::Rng, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.usize(..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_time_is_rfc3339_shaped() {
        let mut rng = fastrand::Rng::with_seed(1);
        let value = generate_date_time(&mut rng);
        assert!(chrono::DateTime::parse_from_rfc3339(&value).is_ok());
    }

    #[test]
    fn uuid_format_round_trips() {
        let mut rng = fastrand::Rng::with_seed(2);
        let value = generate("uuid", &mut rng).unwrap();
        assert!(Uuid::parse_str(&value).is_ok());
    }

    #[test]
    fn unregistered_format_returns_none() {
        let mut rng = fastrand::Rng::with_seed(3);
        assert!(generate("made-up-format", &mut rng).is_none());
    }
}
