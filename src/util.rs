use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::error::EngineError;

/// Length of generated SSIDs.
pub const RANDOM_SSID_LEN: usize = 8;

/// Longest WPA passphrase.
pub const MAX_PASSPHRASE_LEN: usize = 63;

pub fn random_ssid() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SSID_LEN)
        .map(char::from)
        .collect()
}

/// SSIDs are 1 to 32 bytes.
pub fn is_valid_ssid(ssid: &str) -> bool {
    !ssid.is_empty() && ssid.len() <= 32
}

/// Trim a passphrase typed at a prompt and strip one pair of surrounding
/// quotes.
pub fn sanitize_password(raw: &str) -> Result<String, EngineError> {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|quote| {
            trimmed
                .strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(trimmed);

    if unquoted.is_empty() {
        return Err(EngineError::invalid_target("password is empty"));
    }
    if unquoted.chars().count() > MAX_PASSPHRASE_LEN {
        return Err(EngineError::invalid_target(format!(
            "password is longer than {MAX_PASSPHRASE_LEN} characters"
        )));
    }
    Ok(unquoted.to_string())
}
