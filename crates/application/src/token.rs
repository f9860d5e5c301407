//! Opaque token generation for email-flow and shared-link invitations.

use std::fmt::Write;

use grantflow_core::{AppError, AppResult};

/// Generates a 256-bit random token rendered as lowercase hex.
pub(crate) fn generate_token() -> AppResult<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Internal(format!("failed to generate token: {error}")))?;

    Ok(bytes
        .iter()
        .fold(String::with_capacity(64), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        }))
}

#[cfg(test)]
mod tests {
    use super::generate_token;

    #[test]
    fn tokens_are_hex_and_distinct() {
        let first = generate_token().unwrap_or_default();
        let second = generate_token().unwrap_or_default();

        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|character| character.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
