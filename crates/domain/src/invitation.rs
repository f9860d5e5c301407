//! Invitation records and their lifecycle rules.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use grantflow_core::{AppError, AppResult, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EmailAddress, GrantRole, GrantType, InvitationId, PermissionLevel, TargetId};

/// Lifecycle status of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    /// Waiting for a response.
    Pending,
    /// Accepted by the invitee.
    Accepted,
    /// Declined by the invitee.
    Declined,
    /// Validity window passed before a response.
    Expired,
    /// Withdrawn by the inviter before a response.
    Cancelled,
    /// Withdrawn by an administrator.
    Revoked,
}

impl InvitationStatus {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Revoked => "revoked",
        }
    }

    /// Returns whether no further transition is allowed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Pending => false,
            Self::Accepted | Self::Declined | Self::Expired | Self::Cancelled | Self::Revoked => {
                true
            }
        }
    }
}

impl FromStr for InvitationStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            "revoked" => Ok(Self::Revoked),
            _ => Err(AppError::Validation(format!(
                "unknown invitation status '{value}'"
            ))),
        }
    }
}

/// Delivery channel of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationMethod {
    /// Personal token sent by email.
    Email,
    /// Shared reusable link.
    Link,
    /// Granted directly by an administrator.
    Direct,
}

impl InvitationMethod {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Link => "link",
            Self::Direct => "direct",
        }
    }
}

impl FromStr for InvitationMethod {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "email" => Ok(Self::Email),
            "link" => Ok(Self::Link),
            "direct" => Ok(Self::Direct),
            _ => Err(AppError::Validation(format!(
                "unknown invitation method '{value}'"
            ))),
        }
    }
}

/// A move out of `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationTransition {
    /// Invitee accepted; records who accepted.
    Accept {
        /// User that accepted the invitation.
        user_id: UserId,
    },
    /// Invitee declined.
    Decline,
    /// Validity window passed.
    Expire,
    /// Inviter withdrew the invitation.
    Cancel,
    /// Administrator withdrew the invitation.
    Revoke,
}

impl InvitationTransition {
    /// Returns the status reached by this transition.
    #[must_use]
    pub fn target_status(&self) -> InvitationStatus {
        match self {
            Self::Accept { .. } => InvitationStatus::Accepted,
            Self::Decline => InvitationStatus::Declined,
            Self::Expire => InvitationStatus::Expired,
            Self::Cancel => InvitationStatus::Cancelled,
            Self::Revoke => InvitationStatus::Revoked,
        }
    }
}

/// Input for a new invitation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvitation {
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Raw invitee email.
    pub email: String,
    /// Scope being shared.
    pub grant_type: GrantType,
    /// Target being shared.
    pub target_id: TargetId,
    /// Role granted on acceptance.
    pub role: GrantRole,
    /// Explicit permission; defaults from the role when absent.
    pub permission: Option<PermissionLevel>,
    /// Inviting user.
    pub invited_by: UserId,
    /// Delivery channel; defaults to email.
    pub method: Option<InvitationMethod>,
    /// Optional personal note.
    pub message: Option<String>,
    /// Absolute expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Caller-supplied token; a fresh one is used when absent.
    pub token: Option<String>,
    /// Shared link token for link-based invitations.
    pub link_token: Option<String>,
    /// Expiry of the shared link.
    pub link_expires_at: Option<DateTime<Utc>>,
    /// Use ceiling for link-shared invitations.
    pub max_uses: Option<u32>,
    /// Opaque pass-through payload.
    pub metadata: Option<Value>,
}

impl NewInvitation {
    /// Creates an email invitation input with every optional field unset.
    #[must_use]
    pub fn new(
        workspace_id: WorkspaceId,
        email: impl Into<String>,
        grant_type: GrantType,
        target_id: TargetId,
        role: GrantRole,
        invited_by: UserId,
    ) -> Self {
        Self {
            workspace_id,
            email: email.into(),
            grant_type,
            target_id,
            role,
            permission: None,
            invited_by,
            method: None,
            message: None,
            expires_at: None,
            token: None,
            link_token: None,
            link_expires_at: None,
            max_uses: None,
            metadata: None,
        }
    }
}

/// A single grant in progress or its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    /// Stable identifier.
    pub id: InvitationId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Invitee email.
    pub email: EmailAddress,
    /// Unique opaque token for the email flow.
    pub token: String,
    /// Shared link token, for link-based invitations.
    pub link_token: Option<String>,
    /// Scope being shared.
    pub grant_type: GrantType,
    /// Target being shared.
    pub target_id: TargetId,
    /// Granted role.
    pub role: GrantRole,
    /// Granted permission level.
    pub permission: PermissionLevel,
    /// Inviting user.
    pub invited_by: UserId,
    /// Accepting user, set on acceptance.
    pub invitee_user_id: Option<UserId>,
    /// Lifecycle status.
    pub status: InvitationStatus,
    /// Delivery channel.
    pub method: InvitationMethod,
    /// Optional personal note.
    pub message: Option<String>,
    /// Absolute expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Expiry of the shared link.
    pub link_expires_at: Option<DateTime<Utc>>,
    /// Acceptance timestamp.
    pub accepted_at: Option<DateTime<Utc>>,
    /// Decline timestamp.
    pub declined_at: Option<DateTime<Utc>>,
    /// Last reminder timestamp.
    pub reminder_sent_at: Option<DateTime<Utc>>,
    /// Reminders sent so far.
    pub reminder_count: u32,
    /// Use ceiling for link-shared invitations.
    pub max_uses: Option<u32>,
    /// Uses consumed for link-shared invitations.
    pub use_count: u32,
    /// Opaque pass-through payload.
    pub metadata: Option<Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    /// Builds a pending invitation from validated input.
    ///
    /// `fresh_token` is used unless the input carries a non-blank token.
    pub fn create(
        input: NewInvitation,
        fresh_token: String,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let email = EmailAddress::new(input.email)?;
        input.grant_type.ensure_role_allowed(input.role)?;

        let token = input
            .token
            .filter(|token| !token.trim().is_empty())
            .unwrap_or(fresh_token);
        if token.trim().is_empty() {
            return Err(AppError::Validation(
                "invitation token must not be empty".to_owned(),
            ));
        }

        let message = input.message.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            id: InvitationId::new(),
            workspace_id: input.workspace_id,
            email,
            token,
            link_token: input.link_token,
            grant_type: input.grant_type,
            target_id: input.target_id,
            role: input.role,
            permission: input
                .permission
                .unwrap_or_else(|| PermissionLevel::default_for_role(input.role)),
            invited_by: input.invited_by,
            invitee_user_id: None,
            status: InvitationStatus::Pending,
            method: input.method.unwrap_or(InvitationMethod::Email),
            message,
            expires_at: input.expires_at,
            link_expires_at: input.link_expires_at,
            accepted_at: None,
            declined_at: None,
            reminder_sent_at: None,
            reminder_count: 0,
            max_uses: input.max_uses,
            use_count: 0,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns whether the invitation still awaits a response.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    /// True only when an expiry is set and has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Returns whether the invitation may be accepted.
    #[must_use]
    pub fn can_accept(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && !self.is_expired(now)
    }

    /// Returns whether the invitation may be resent.
    #[must_use]
    pub fn can_resend(&self) -> bool {
        self.is_pending()
    }

    /// Returns whether the invitation may be cancelled.
    #[must_use]
    pub fn can_cancel(&self) -> bool {
        self.is_pending()
    }

    /// Applies a transition out of `pending`.
    ///
    /// Fails with [`AppError::AlreadyResolved`] when the invitation is terminal.
    pub fn apply_transition(
        &mut self,
        transition: InvitationTransition,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if !self.is_pending() {
            return Err(AppError::AlreadyResolved(format!(
                "invitation '{}' is already {}",
                self.id,
                self.status.as_str()
            )));
        }

        match transition {
            InvitationTransition::Accept { user_id } => {
                self.invitee_user_id = Some(user_id);
                self.accepted_at = Some(now);
            }
            InvitationTransition::Decline => self.declined_at = Some(now),
            InvitationTransition::Expire
            | InvitationTransition::Cancel
            | InvitationTransition::Revoke => {}
        }

        self.status = transition.target_status();
        self.updated_at = now;
        Ok(())
    }

    /// Returns whether the invitation is due for a follow-up reminder.
    ///
    /// Reminders are spaced at least `min_age` apart and capped at `max_reminders`.
    #[must_use]
    pub fn is_due_for_reminder(
        &self,
        now: DateTime<Utc>,
        min_age: Duration,
        max_reminders: u32,
    ) -> bool {
        let threshold = now - min_age;

        self.is_pending()
            && !self.is_expired(now)
            && self.reminder_count < max_reminders
            && self.created_at < threshold
            && self
                .reminder_sent_at
                .is_none_or(|sent_at| sent_at < threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(now: DateTime<Utc>) -> Invitation {
        let input = NewInvitation::new(
            WorkspaceId::new(),
            "invitee@example.com",
            GrantType::Project,
            TargetId::new(),
            GrantRole::Member,
            UserId::new(),
        );
        Invitation::create(input, "token-1".to_owned(), now).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn create_defaults_permission_status_and_method() {
        let invitation = pending(Utc::now());
        assert_eq!(invitation.permission, PermissionLevel::Edit);
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert_eq!(invitation.method, InvitationMethod::Email);
        assert_eq!(invitation.token, "token-1");
    }

    #[test]
    fn create_keeps_explicit_permission_and_token() {
        let mut input = NewInvitation::new(
            WorkspaceId::new(),
            "invitee@example.com",
            GrantType::Workspace,
            TargetId::new(),
            GrantRole::Admin,
            UserId::new(),
        );
        input.permission = Some(PermissionLevel::Comment);
        input.token = Some("caller-token".to_owned());

        let invitation = Invitation::create(input, "fresh".to_owned(), Utc::now());
        assert!(invitation.is_ok());
        let invitation = invitation.unwrap_or_else(|_| unreachable!());
        assert_eq!(invitation.permission, PermissionLevel::Comment);
        assert_eq!(invitation.token, "caller-token");
    }

    #[test]
    fn create_rejects_role_outside_scope() {
        let input = NewInvitation::new(
            WorkspaceId::new(),
            "invitee@example.com",
            GrantType::Task,
            TargetId::new(),
            GrantRole::Admin,
            UserId::new(),
        );
        let result = Invitation::create(input, "t".to_owned(), Utc::now());
        assert!(matches!(result, Err(AppError::InvalidRoleForType { .. })));
    }

    #[test]
    fn invitation_without_expiry_never_expires() {
        let invitation = pending(Utc::now());
        assert!(!invitation.is_expired(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn expired_invitation_cannot_be_accepted() {
        let now = Utc::now();
        let mut invitation = pending(now);
        invitation.expires_at = Some(now - Duration::minutes(1));
        assert!(invitation.is_expired(now));
        assert!(!invitation.can_accept(now));
        assert!(invitation.can_cancel());
    }

    #[test]
    fn terminal_invitation_rejects_second_transition() {
        let now = Utc::now();
        let mut invitation = pending(now);
        let user_id = UserId::new();

        assert!(
            invitation
                .apply_transition(InvitationTransition::Decline, now)
                .is_ok()
        );
        let second = invitation.apply_transition(InvitationTransition::Accept { user_id }, now);

        assert!(matches!(second, Err(AppError::AlreadyResolved(_))));
        assert_eq!(invitation.status, InvitationStatus::Declined);
        assert_eq!(invitation.invitee_user_id, None);
        assert!(!invitation.can_resend());
    }

    #[test]
    fn accept_records_invitee_and_timestamp() {
        let now = Utc::now();
        let mut invitation = pending(now);
        let user_id = UserId::new();

        let result = invitation.apply_transition(InvitationTransition::Accept { user_id }, now);
        assert!(result.is_ok());
        assert_eq!(invitation.status, InvitationStatus::Accepted);
        assert_eq!(invitation.invitee_user_id, Some(user_id));
        assert_eq!(invitation.accepted_at, Some(now));
    }

    #[test]
    fn reminder_spacing_and_cap_are_enforced() {
        let now = Utc::now();
        let min_age = Duration::hours(48);
        let mut invitation = pending(now - Duration::hours(72));

        assert!(invitation.is_due_for_reminder(now, min_age, 3));

        invitation.reminder_sent_at = Some(now - Duration::hours(1));
        invitation.reminder_count = 1;
        assert!(!invitation.is_due_for_reminder(now, min_age, 3));

        invitation.reminder_sent_at = Some(now - Duration::hours(49));
        assert!(invitation.is_due_for_reminder(now, min_age, 3));

        invitation.reminder_count = 3;
        assert!(!invitation.is_due_for_reminder(now, min_age, 3));
    }

    #[test]
    fn young_invitation_is_not_due_for_reminder() {
        let now = Utc::now();
        let invitation = pending(now - Duration::hours(1));
        assert!(!invitation.is_due_for_reminder(now, Duration::hours(48), 3));
    }

    #[test]
    fn status_storage_values_roundtrip() {
        for status in [
            InvitationStatus::Pending,
            InvitationStatus::Accepted,
            InvitationStatus::Declined,
            InvitationStatus::Expired,
            InvitationStatus::Cancelled,
            InvitationStatus::Revoked,
        ] {
            let parsed = InvitationStatus::from_str(status.as_str());
            assert!(matches!(parsed, Ok(value) if value == status));
        }
    }
}
