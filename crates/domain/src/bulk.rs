use std::str::FromStr;

use chrono::{DateTime, Utc};
use grantflow_core::{AppError, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};

use crate::{BulkInvitationId, GrantRole, GrantType, InvitationId, TargetId};

/// Completion status of one bulk invitation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkInvitationStatus {
    /// Items are still being processed.
    InProgress,
    /// Every attempted item succeeded.
    Completed,
    /// Some items failed and some succeeded.
    PartialFailure,
    /// Every attempted item failed.
    Failed,
}

impl BulkInvitationStatus {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::PartialFailure => "partial_failure",
            Self::Failed => "failed",
        }
    }

    /// Derives the final status from item counts.
    #[must_use]
    pub fn from_counts(success_count: u32, failed_count: u32) -> Self {
        match (success_count, failed_count) {
            (_, 0) => Self::Completed,
            (0, _) => Self::Failed,
            _ => Self::PartialFailure,
        }
    }
}

impl FromStr for BulkInvitationStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "partial_failure" => Ok(Self::PartialFailure),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown bulk invitation status '{value}'"
            ))),
        }
    }
}

/// Outcome of one email in a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BulkItemOutcome {
    /// Invitation created.
    Created {
        /// Identifier of the created invitation.
        invitation_id: InvitationId,
    },
    /// Creation failed.
    Failed {
        /// Error message.
        error: String,
    },
    /// Deliberately excluded before creation.
    Skipped {
        /// Why the item was excluded.
        reason: String,
    },
}

/// One input email and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkInviteItem {
    /// Email as supplied by the caller.
    pub email: String,
    /// Item outcome.
    pub outcome: BulkItemOutcome,
}

/// Summary of one bulk invitation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkInvitationResult {
    /// Stable identifier.
    pub id: BulkInvitationId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Inviting user.
    pub invited_by: UserId,
    /// Scope being shared.
    pub grant_type: GrantType,
    /// Target being shared.
    pub target_id: TargetId,
    /// Role granted to every invitee.
    pub role: GrantRole,
    /// Number of input emails.
    pub total_count: u32,
    /// Items with a created invitation.
    pub success_count: u32,
    /// Items that failed.
    pub failed_count: u32,
    /// Items excluded before creation.
    pub skipped_count: u32,
    /// Run status.
    pub status: BulkInvitationStatus,
    /// Emails whose creation failed.
    pub failed_emails: Vec<String>,
    /// Start timestamp.
    pub created_at: DateTime<Utc>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

impl BulkInvitationResult {
    /// Starts an in-progress summary.
    #[must_use]
    pub fn start(
        workspace_id: WorkspaceId,
        invited_by: UserId,
        grant_type: GrantType,
        target_id: TargetId,
        role: GrantRole,
        total_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BulkInvitationId::new(),
            workspace_id,
            invited_by,
            grant_type,
            target_id,
            role,
            total_count,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            status: BulkInvitationStatus::InProgress,
            failed_emails: Vec::new(),
            created_at: now,
            completed_at: None,
        }
    }

    /// Fills counts from per-item outcomes and finalises the status.
    pub fn finalize(&mut self, items: &[BulkInviteItem], now: DateTime<Utc>) {
        let mut success_count = 0_u32;
        let mut skipped_count = 0_u32;
        let mut failed_emails = Vec::new();

        for item in items {
            match &item.outcome {
                BulkItemOutcome::Created { .. } => success_count = success_count.saturating_add(1),
                BulkItemOutcome::Skipped { .. } => skipped_count = skipped_count.saturating_add(1),
                BulkItemOutcome::Failed { .. } => failed_emails.push(item.email.clone()),
            }
        }

        let failed_count = u32::try_from(failed_emails.len()).unwrap_or(u32::MAX);
        self.success_count = success_count;
        self.failed_count = failed_count;
        self.skipped_count = skipped_count;
        self.failed_emails = failed_emails;
        self.status = BulkInvitationStatus::from_counts(success_count, failed_count);
        self.completed_at = Some(now);
    }
}
