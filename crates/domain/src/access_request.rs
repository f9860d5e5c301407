//! Self-service access requests reviewed by an approver.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use grantflow_core::{AppError, AppResult, NonEmptyString, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};

use crate::{AccessRequestId, EmailAddress, GrantType, TargetId};

/// Review status of an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRequestStatus {
    /// Waiting for review.
    Pending,
    /// Approved by a reviewer.
    Approved,
    /// Denied by a reviewer.
    Denied,
}

impl AccessRequestStatus {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

impl FromStr for AccessRequestStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            _ => Err(AppError::Validation(format!(
                "unknown access request status '{value}'"
            ))),
        }
    }
}

/// Reviewer decision on a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequestDecision {
    /// Grant the request.
    Approve,
    /// Refuse the request with a reason.
    Deny {
        /// Reason shown to the requester.
        reason: NonEmptyString,
    },
}

impl AccessRequestDecision {
    /// Returns the status reached by this decision.
    #[must_use]
    pub fn target_status(&self) -> AccessRequestStatus {
        match self {
            Self::Approve => AccessRequestStatus::Approved,
            Self::Deny { .. } => AccessRequestStatus::Denied,
        }
    }

    /// Returns the denial reason, if any.
    #[must_use]
    pub fn denial_reason(&self) -> Option<&str> {
        match self {
            Self::Approve => None,
            Self::Deny { reason } => Some(reason.as_str()),
        }
    }
}

/// Input for a new access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccessRequest {
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Requesting user.
    pub requester_id: UserId,
    /// Requester email.
    pub email: String,
    /// Scope being requested.
    pub grant_type: GrantType,
    /// Target being requested.
    pub target_id: TargetId,
    /// Optional note to the reviewer.
    pub message: Option<String>,
}

/// A user-initiated request for access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Stable identifier.
    pub id: AccessRequestId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Requesting user.
    pub requester_id: UserId,
    /// Requester email.
    pub email: EmailAddress,
    /// Scope being requested.
    pub grant_type: GrantType,
    /// Target being requested.
    pub target_id: TargetId,
    /// Optional note to the reviewer.
    pub message: Option<String>,
    /// Review status.
    pub status: AccessRequestStatus,
    /// Reviewer.
    pub processed_by: Option<UserId>,
    /// Review timestamp.
    pub processed_at: Option<DateTime<Utc>>,
    /// Reason recorded on denial.
    pub denial_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl AccessRequest {
    /// Builds a pending request from validated input.
    pub fn create(input: NewAccessRequest, now: DateTime<Utc>) -> AppResult<Self> {
        Ok(Self {
            id: AccessRequestId::new(),
            workspace_id: input.workspace_id,
            requester_id: input.requester_id,
            email: EmailAddress::new(input.email)?,
            grant_type: input.grant_type,
            target_id: input.target_id,
            message: input
                .message
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            status: AccessRequestStatus::Pending,
            processed_by: None,
            processed_at: None,
            denial_reason: None,
            created_at: now,
        })
    }

    /// Records a review decision. Processed requests are terminal.
    pub fn apply_decision(
        &mut self,
        decision: &AccessRequestDecision,
        processed_by: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.status != AccessRequestStatus::Pending {
            return Err(AppError::AlreadyResolved(format!(
                "access request '{}' is already {}",
                self.id,
                self.status.as_str()
            )));
        }

        self.status = decision.target_status();
        self.processed_by = Some(processed_by);
        self.processed_at = Some(now);
        self.denial_reason = decision.denial_reason().map(str::to_owned);
        Ok(())
    }
}
