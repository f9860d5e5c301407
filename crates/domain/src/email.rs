//! Email address validation shared by invitations and access requests.

use grantflow_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Validated, lowercase email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Performs basic structural validation: non-empty, contains exactly one `@`,
    /// local part and domain are non-empty, domain contains at least one `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        let Some((local, domain)) = split_email(trimmed.as_str()) else {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        };

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.'".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the part after `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        split_email(self.0.as_str())
            .map(|(_, domain)| domain)
            .unwrap_or_default()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Returns the domain of a raw email value, or `None` unless it has exactly one `@`.
#[must_use]
pub fn email_domain(email: &str) -> Option<&str> {
    split_email(email.trim())
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

fn split_email(value: &str) -> Option<(&str, &str)> {
    let mut parts = value.split('@');
    let local = parts.next()?;
    let domain = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    Some((local, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_is_lowercased() {
        let email = EmailAddress::new("  USER@Example.COM ");
        assert!(email.is_ok());
        assert_eq!(
            email.unwrap_or_else(|_| panic!("test")).as_str(),
            "user@example.com"
        );
    }

    #[test]
    fn email_without_at_is_rejected() {
        assert!(EmailAddress::new("noatsign").is_err());
    }

    #[test]
    fn email_with_two_ats_is_rejected() {
        assert!(EmailAddress::new("a@b@example.com").is_err());
    }

    #[test]
    fn email_without_domain_dot_is_rejected() {
        assert!(EmailAddress::new("user@nodot").is_err());
    }

    #[test]
    fn domain_is_extracted() {
        let email = EmailAddress::new("user@good.com").unwrap_or_else(|_| unreachable!());
        assert_eq!(email.domain(), "good.com");
        assert_eq!(email_domain("user@good.com"), Some("good.com"));
        assert_eq!(email_domain("user@@good.com"), None);
        assert_eq!(email_domain("user"), None);
        assert_eq!(email_domain("user@"), None);
    }
}
