use chrono::Duration;

use grantflow_core::{AppError, AppResult};

/// Tunables applied by the invitation services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvitationPolicy {
    /// Validity window applied when an invitation has no explicit expiry.
    pub default_expiry: Duration,
    /// Largest accepted bulk invitation input.
    pub max_bulk_emails: usize,
    /// Minimum age of an invitation, and minimum spacing, between reminders.
    pub reminder_min_age: Duration,
    /// Maximum reminders per invitation.
    pub max_reminders: u32,
    /// Upper bound applied to listing page sizes.
    pub list_limit_cap: usize,
}

impl Default for InvitationPolicy {
    fn default() -> Self {
        Self {
            default_expiry: Duration::days(7),
            max_bulk_emails: 500,
            reminder_min_age: Duration::hours(48),
            max_reminders: 3,
            list_limit_cap: 200,
        }
    }
}

impl InvitationPolicy {
    /// Rejects non-positive windows and zero limits.
    pub fn validate(&self) -> AppResult<()> {
        if self.default_expiry <= Duration::zero() {
            return Err(AppError::Validation(
                "default_expiry must be greater than zero".to_owned(),
            ));
        }

        if self.reminder_min_age <= Duration::zero() {
            return Err(AppError::Validation(
                "reminder_min_age must be greater than zero".to_owned(),
            ));
        }

        if self.max_bulk_emails == 0 || self.list_limit_cap == 0 {
            return Err(AppError::Validation(
                "max_bulk_emails and list_limit_cap must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}
