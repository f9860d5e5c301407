use async_trait::async_trait;
use serde::Serialize;

use grantflow_core::{AppResult, WorkspaceId};
use grantflow_domain::{GrantType, Invitation, InvitationId, InvitationStatus, TargetId};

/// Why an invitation event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationEventKind {
    /// A pending invitation was created.
    Created,
    /// A pending invitation was resent with a fresh token.
    Resent,
    /// A follow-up reminder is due.
    Reminder,
    /// The invitation left `pending`.
    StatusChanged,
}

impl InvitationEventKind {
    /// Returns a stable value for logs and transports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Resent => "resent",
            Self::Reminder => "reminder",
            Self::StatusChanged => "status_changed",
        }
    }
}

/// Payload handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationEvent {
    /// Event reason.
    pub kind: InvitationEventKind,
    /// Invitation identifier.
    pub invitation_id: InvitationId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Scope being shared.
    pub grant_type: GrantType,
    /// Target being shared.
    pub target_id: TargetId,
    /// Invitee email.
    pub email: String,
    /// Current token, so the collaborator can render the accept URL.
    pub token: String,
    /// Status after the change.
    pub status: InvitationStatus,
}

impl InvitationEvent {
    /// Builds an event describing the current state of `invitation`.
    #[must_use]
    pub fn from_invitation(kind: InvitationEventKind, invitation: &Invitation) -> Self {
        Self {
            kind,
            invitation_id: invitation.id,
            workspace_id: invitation.workspace_id,
            grant_type: invitation.grant_type,
            target_id: invitation.target_id,
            email: invitation.email.as_str().to_owned(),
            token: invitation.token.clone(),
            status: invitation.status,
        }
    }
}

/// Port for the external notification collaborator.
#[async_trait]
pub trait InvitationNotifier: Send + Sync {
    /// Hands one event over for rendering and delivery.
    async fn publish(&self, event: InvitationEvent) -> AppResult<()>;
}
