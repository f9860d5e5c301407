//! Invitation lifecycle orchestration.
//!
//! Every status change goes through a single conditional write in the
//! repository; the service only classifies the outcome, records the audit
//! trail and hands events to the notification collaborator.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use grantflow_core::{Actor, AppError, AppResult};
use grantflow_domain::{
    ActivityAction, Invitation, InvitationActivity, InvitationId, InvitationTransition,
};

use crate::invitation_ports::{
    BulkInvitationRepository, InvitationActivityRepository, InvitationEvent, InvitationEventKind,
    InvitationNotifier, InvitationRepository,
};
use crate::InvitationPolicy;

mod bulk;
mod insights;
mod lifecycle;
mod sweeps;


pub use bulk::{BulkInviteInput, BulkInviteReport};
pub use sweeps::SweepReport;

/// Ports an [`InvitationService`] is wired with.
#[derive(Clone)]
pub struct InvitationServicePorts {
    /// Invitation persistence.
    pub invitations: Arc<dyn InvitationRepository>,
    /// Bulk run summaries.
    pub bulk_results: Arc<dyn BulkInvitationRepository>,
    /// Audit trail.
    pub activity: Arc<dyn InvitationActivityRepository>,
    /// Notification collaborator.
    pub notifier: Arc<dyn InvitationNotifier>,
}

/// Application service for invitation lifecycle workflows.
#[derive(Clone)]
pub struct InvitationService {
    invitations: Arc<dyn InvitationRepository>,
    bulk_results: Arc<dyn BulkInvitationRepository>,
    activity: Arc<dyn InvitationActivityRepository>,
    notifier: Arc<dyn InvitationNotifier>,
    policy: InvitationPolicy,
}

impl InvitationService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(ports: InvitationServicePorts, policy: InvitationPolicy) -> Self {
        Self {
            invitations: ports.invitations,
            bulk_results: ports.bulk_results,
            activity: ports.activity,
            notifier: ports.notifier,
            policy,
        }
    }

    /// Returns the policy this service applies.
    #[must_use]
    pub fn policy(&self) -> &InvitationPolicy {
        &self.policy
    }

    async fn require_invitation(&self, invitation_id: InvitationId) -> AppResult<Invitation> {
        self.invitations
            .find_invitation(invitation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("invitation '{invitation_id}' not found")))
    }

    /// Runs one conditional transition and its side effects.
    pub(crate) async fn apply_transition(
        &self,
        actor: &Actor,
        invitation_id: InvitationId,
        transition: InvitationTransition,
        details: Option<String>,
    ) -> AppResult<Invitation> {
        let Some(invitation) = self
            .invitations
            .transition_invitation(invitation_id, transition, Utc::now())
            .await?
        else {
            return Err(self.missed_transition_error(invitation_id).await);
        };

        info!(
            invitation_id = %invitation.id,
            workspace_id = %invitation.workspace_id,
            status = invitation.status.as_str(),
            "invitation transitioned"
        );

        self.record_activity(
            actor,
            invitation.id,
            ActivityAction::for_status(invitation.status),
            details,
        )
        .await?;
        self.publish(InvitationEventKind::StatusChanged, &invitation)
            .await;

        Ok(invitation)
    }

    /// Cancels an invitation whose creation could not be fully recorded.
    ///
    /// Writes only the status. Returns whether a pending row was cancelled.
    pub(crate) async fn withdraw_unrecorded(&self, invitation_id: InvitationId) -> bool {
        match self
            .invitations
            .transition_invitation(invitation_id, InvitationTransition::Cancel, Utc::now())
            .await
        {
            Ok(cancelled) => cancelled.is_some(),
            Err(error) => {
                warn!(
                    invitation_id = %invitation_id,
                    error = %error,
                    "failed to withdraw unrecorded invitation"
                );
                false
            }
        }
    }

    /// Explains why a conditional write matched no pending row.
    async fn missed_transition_error(&self, invitation_id: InvitationId) -> AppError {
        match self.invitations.find_invitation(invitation_id).await {
            Ok(Some(current)) if current.is_pending() => AppError::LinkInvalid(format!(
                "invitation '{invitation_id}' has expired"
            )),
            Ok(Some(current)) => AppError::AlreadyResolved(format!(
                "invitation '{invitation_id}' is already {}",
                current.status.as_str()
            )),
            Ok(None) => AppError::NotFound(format!("invitation '{invitation_id}' not found")),
            Err(error) => error,
        }
    }

    async fn record_activity(
        &self,
        actor: &Actor,
        invitation_id: InvitationId,
        action: ActivityAction,
        details: Option<String>,
    ) -> AppResult<()> {
        self.activity
            .append_activity(InvitationActivity::record(
                invitation_id,
                action,
                actor,
                details,
                Utc::now(),
            ))
            .await
    }

    /// Notifier failures never undo committed state.
    async fn publish(&self, kind: InvitationEventKind, invitation: &Invitation) {
        if let Err(error) = self
            .notifier
            .publish(InvitationEvent::from_invitation(kind, invitation))
            .await
        {
            warn!(
                invitation_id = %invitation.id,
                kind = kind.as_str(),
                error = %error,
                "failed to publish invitation event"
            );
        }
    }
}
