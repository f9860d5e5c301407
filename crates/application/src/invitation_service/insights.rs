use grantflow_core::{AppResult, WorkspaceId};
use grantflow_domain::{
    BulkInvitationId, BulkInvitationResult, EmailAddress, Invitation, InvitationActivity,
    InvitationId, InvitationPermissions, InvitationStats,
};

use crate::invitation_ports::StatsScope;

use super::InvitationService;

impl InvitationService {
    /// Aggregates counts, acceptance rate and mean time-to-accept over a scope.
    pub async fn compute_stats(&self, scope: StatsScope) -> AppResult<InvitationStats> {
        let invitations = self.invitations.list_invitations(&scope.filter()).await?;
        Ok(InvitationStats::from_invitations(&invitations))
    }

    /// Effective capability flags: the stored granular record, or flags
    /// derived from the permission level.
    pub async fn invitation_permissions(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<InvitationPermissions> {
        let invitation = self.require_invitation(invitation_id).await?;
        Ok(self
            .invitations
            .find_permissions(invitation.id)
            .await?
            .unwrap_or_else(|| InvitationPermissions::for_level(invitation.permission)))
    }

    /// Audit trail of an invitation, oldest first.
    pub async fn activity_for(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Vec<InvitationActivity>> {
        self.require_invitation(invitation_id).await?;
        self.activity.list_activity(invitation_id).await
    }

    /// Invitations addressed to an email inside a workspace.
    pub async fn invitations_for_email(
        &self,
        workspace_id: WorkspaceId,
        email: &str,
    ) -> AppResult<Vec<Invitation>> {
        let email = EmailAddress::new(email)?;
        self.invitations.find_by_email(workspace_id, &email).await
    }

    /// Finds a bulk run summary.
    pub async fn find_bulk_result(
        &self,
        bulk_invitation_id: BulkInvitationId,
    ) -> AppResult<Option<BulkInvitationResult>> {
        self.bulk_results.find_bulk_result(bulk_invitation_id).await
    }
}
