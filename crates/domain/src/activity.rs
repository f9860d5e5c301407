use std::str::FromStr;

use chrono::{DateTime, Utc};
use grantflow_core::{Actor, ActorType, AppError, UserId};
use serde::{Deserialize, Serialize};

use crate::{ActivityId, InvitationId, InvitationStatus};

/// Stable actions recorded in the invitation audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    /// Invitation was created.
    Created,
    /// Invitation was resent with a new token.
    Resent,
    /// Token was rotated without resending.
    TokenRegenerated,
    /// A follow-up reminder went out.
    ReminderSent,
    /// A shared link admitted the invitee.
    LinkUsed,
    /// Invitee accepted.
    Accepted,
    /// Invitee declined.
    Declined,
    /// Validity window passed.
    Expired,
    /// Inviter cancelled.
    Cancelled,
    /// Administrator revoked.
    Revoked,
}

impl ActivityAction {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Resent => "resent",
            Self::TokenRegenerated => "token_regenerated",
            Self::ReminderSent => "reminder_sent",
            Self::LinkUsed => "link_used",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Revoked => "revoked",
        }
    }

    /// Returns the action recorded when an invitation reaches `status`.
    #[must_use]
    pub fn for_status(status: InvitationStatus) -> Self {
        match status {
            InvitationStatus::Pending => Self::Created,
            InvitationStatus::Accepted => Self::Accepted,
            InvitationStatus::Declined => Self::Declined,
            InvitationStatus::Expired => Self::Expired,
            InvitationStatus::Cancelled => Self::Cancelled,
            InvitationStatus::Revoked => Self::Revoked,
        }
    }
}

impl FromStr for ActivityAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(Self::Created),
            "resent" => Ok(Self::Resent),
            "token_regenerated" => Ok(Self::TokenRegenerated),
            "reminder_sent" => Ok(Self::ReminderSent),
            "link_used" => Ok(Self::LinkUsed),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            "revoked" => Ok(Self::Revoked),
            _ => Err(AppError::Validation(format!(
                "unknown invitation activity '{value}'"
            ))),
        }
    }
}

/// One append-only audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationActivity {
    /// Stable identifier.
    pub id: ActivityId,
    /// Invitation the entry belongs to.
    pub invitation_id: InvitationId,
    /// Recorded action.
    pub action: ActivityAction,
    /// Acting user, absent for system actions.
    pub actor_id: Option<UserId>,
    /// Acting principal kind.
    pub actor_type: ActorType,
    /// Caller IP address.
    pub ip_address: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
    /// Free-text details.
    pub details: Option<String>,
    /// Entry timestamp.
    pub created_at: DateTime<Utc>,
}

impl InvitationActivity {
    /// Builds an entry attributed to `actor`.
    #[must_use]
    pub fn record(
        invitation_id: InvitationId,
        action: ActivityAction,
        actor: &Actor,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActivityId::new(),
            invitation_id,
            action,
            actor_id: actor.user_id(),
            actor_type: actor.actor_type(),
            ip_address: actor.ip_address().map(str::to_owned),
            user_agent: actor.user_agent().map(str::to_owned),
            details,
            created_at: now,
        }
    }
}
