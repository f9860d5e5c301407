use chrono::Utc;
use tracing::info;

use grantflow_core::{Actor, AppError, AppResult, UserId};
use grantflow_domain::{
    ActivityAction, EmailAddress, GrantType, Invitation, InvitationId, InvitationPermissions,
    InvitationTransition, NewInvitation, TargetId,
};

use crate::invitation_ports::{InvitationEventKind, InvitationFilter};
use crate::token::generate_token;

use super::InvitationService;

impl InvitationService {
    /// Creates a pending invitation with a fresh token.
    ///
    /// Granular capability flags are stored alongside when supplied.
    pub async fn create_invitation(
        &self,
        actor: &Actor,
        mut input: NewInvitation,
        permissions: Option<InvitationPermissions>,
    ) -> AppResult<Invitation> {
        let now = Utc::now();
        if input.expires_at.is_none() {
            input.expires_at = Some(now + self.policy.default_expiry);
        }

        let invitation = Invitation::create(input, generate_token()?, now)?;
        self.invitations
            .create_invitation(invitation.clone())
            .await?;

        if let Err(error) = self
            .record_creation(actor, &invitation, permissions)
            .await
        {
            self.withdraw_unrecorded(invitation.id).await;
            return Err(error);
        }

        info!(
            invitation_id = %invitation.id,
            workspace_id = %invitation.workspace_id,
            grant_type = invitation.grant_type.as_str(),
            method = invitation.method.as_str(),
            "invitation created"
        );

        self.publish(InvitationEventKind::Created, &invitation)
            .await;

        Ok(invitation)
    }

    async fn record_creation(
        &self,
        actor: &Actor,
        invitation: &Invitation,
        permissions: Option<InvitationPermissions>,
    ) -> AppResult<()> {
        if let Some(permissions) = permissions {
            self.invitations
                .save_permissions(invitation.id, permissions)
                .await?;
        }

        self.record_activity(
            actor,
            invitation.id,
            ActivityAction::Created,
            Some(format!(
                "invited as {} to {} '{}'",
                invitation.role.as_str(),
                invitation.grant_type.as_str(),
                invitation.target_id
            )),
        )
        .await
    }

    /// Finds an invitation by identifier.
    pub async fn find_invitation(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Option<Invitation>> {
        self.invitations.find_invitation(invitation_id).await
    }

    /// Finds an invitation by its email-flow token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<Invitation>> {
        self.invitations.find_by_token(token).await
    }

    /// Lists invitations created through one shared link.
    pub async fn find_by_link_token(&self, link_token: &str) -> AppResult<Vec<Invitation>> {
        self.invitations.find_by_link_token(link_token).await
    }

    /// Lists invitations accepted by a user.
    pub async fn find_by_invitee(&self, user_id: UserId) -> AppResult<Vec<Invitation>> {
        self.invitations.find_by_invitee(user_id).await
    }

    /// Lists invitations matching a filter with the page size capped by policy.
    pub async fn list_invitations(&self, mut filter: InvitationFilter) -> AppResult<Vec<Invitation>> {
        let cap = self.policy.list_limit_cap;
        filter.limit = Some(filter.limit.map_or(cap, |limit| limit.clamp(1, cap)));
        self.invitations.list_invitations(&filter).await
    }

    /// Counts invitations matching a filter.
    pub async fn count_invitations(&self, filter: &InvitationFilter) -> AppResult<u64> {
        self.invitations.count_invitations(filter).await
    }

    /// Advisory duplicate check; not atomic with creation.
    pub async fn exists_pending_for_email(
        &self,
        grant_type: GrantType,
        target_id: TargetId,
        email: &str,
    ) -> AppResult<bool> {
        let email = EmailAddress::new(email)?;
        self.invitations
            .exists_pending_for_email(grant_type, target_id, &email)
            .await
    }

    /// Advisory duplicate check; not atomic with creation.
    pub async fn exists_pending_for_user(
        &self,
        grant_type: GrantType,
        target_id: TargetId,
        user_id: UserId,
    ) -> AppResult<bool> {
        self.invitations
            .exists_pending_for_user(grant_type, target_id, user_id)
            .await
    }

    /// Counts one use of a link-shared invitation and records it in the audit trail.
    pub(crate) async fn record_link_use(
        &self,
        actor: &Actor,
        invitation_id: InvitationId,
        link_token: &str,
    ) -> AppResult<()> {
        self.invitations
            .increment_link_use_count(invitation_id)
            .await?;
        self.record_activity(
            actor,
            invitation_id,
            ActivityAction::LinkUsed,
            Some(format!("joined through link {}", abbreviate(link_token))),
        )
        .await
    }

    /// Accepts an invitation by identifier.
    ///
    /// When `accepting_email` is given it must match the invited address.
    pub async fn accept_by_id(
        &self,
        actor: &Actor,
        invitation_id: InvitationId,
        accepting_user: UserId,
        accepting_email: Option<&str>,
    ) -> AppResult<Invitation> {
        let invitation = self.require_invitation(invitation_id).await?;
        self.accept(actor, invitation, accepting_user, accepting_email)
            .await
    }

    /// Accepts an invitation by its email-flow token.
    pub async fn accept_by_token(
        &self,
        actor: &Actor,
        token: &str,
        accepting_user: UserId,
        accepting_email: Option<&str>,
    ) -> AppResult<Invitation> {
        let invitation = self
            .invitations
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("invitation token not found".to_owned()))?;
        self.accept(actor, invitation, accepting_user, accepting_email)
            .await
    }

    async fn accept(
        &self,
        actor: &Actor,
        invitation: Invitation,
        accepting_user: UserId,
        accepting_email: Option<&str>,
    ) -> AppResult<Invitation> {
        if !invitation.is_pending() {
            return Err(AppError::AlreadyResolved(format!(
                "invitation '{}' is already {}",
                invitation.id,
                invitation.status.as_str()
            )));
        }

        if !invitation.can_accept(Utc::now()) {
            return Err(self.expire_on_access(invitation.id).await);
        }

        if let Some(email) = accepting_email {
            let email = EmailAddress::new(email)?;
            if email != invitation.email {
                return Err(AppError::Forbidden(
                    "invitation was issued to a different email address".to_owned(),
                ));
            }
        }

        match self
            .apply_transition(
                actor,
                invitation.id,
                InvitationTransition::Accept {
                    user_id: accepting_user,
                },
                None,
            )
            .await
        {
            Err(AppError::LinkInvalid(_)) => Err(self.expire_on_access(invitation.id).await),
            other => other,
        }
    }

    /// Marks an overdue pending invitation expired and returns the error for the caller.
    async fn expire_on_access(&self, invitation_id: InvitationId) -> AppError {
        match self
            .apply_transition(
                &Actor::system(),
                invitation_id,
                InvitationTransition::Expire,
                Some("expired on access".to_owned()),
            )
            .await
        {
            Ok(_) | Err(AppError::AlreadyResolved(_)) => {
                AppError::LinkInvalid(format!("invitation '{invitation_id}' has expired"))
            }
            Err(error) => error,
        }
    }

    /// Declines an invitation by identifier.
    pub async fn decline_by_id(
        &self,
        actor: &Actor,
        invitation_id: InvitationId,
    ) -> AppResult<Invitation> {
        self.apply_transition(actor, invitation_id, InvitationTransition::Decline, None)
            .await
    }

    /// Declines an invitation by its email-flow token.
    pub async fn decline_by_token(&self, actor: &Actor, token: &str) -> AppResult<Invitation> {
        let invitation = self
            .invitations
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("invitation token not found".to_owned()))?;
        self.decline_by_id(actor, invitation.id).await
    }

    /// Cancels a pending invitation on behalf of the inviter.
    pub async fn cancel(&self, actor: &Actor, invitation_id: InvitationId) -> AppResult<Invitation> {
        self.apply_transition(actor, invitation_id, InvitationTransition::Cancel, None)
            .await
    }

    /// Revokes a pending invitation.
    pub async fn revoke(
        &self,
        actor: &Actor,
        invitation_id: InvitationId,
        reason: Option<&str>,
    ) -> AppResult<Invitation> {
        self.apply_transition(
            actor,
            invitation_id,
            InvitationTransition::Revoke,
            reason.map(str::to_owned),
        )
        .await
    }

    /// Marks a pending invitation expired.
    pub async fn mark_expired(
        &self,
        actor: &Actor,
        invitation_id: InvitationId,
    ) -> AppResult<Invitation> {
        self.apply_transition(actor, invitation_id, InvitationTransition::Expire, None)
            .await
    }

    /// Issues a fresh token, resets reminder state and restarts the validity window.
    pub async fn resend(&self, actor: &Actor, invitation_id: InvitationId) -> AppResult<Invitation> {
        let invitation = self.require_invitation(invitation_id).await?;
        if !invitation.can_resend() {
            return Err(AppError::AlreadyResolved(format!(
                "invitation '{}' is already {}",
                invitation.id,
                invitation.status.as_str()
            )));
        }

        let now = Utc::now();
        let expires_at = invitation
            .expires_at
            .map(|_| now + self.policy.default_expiry);
        let token = generate_token()?;

        let Some(resent) = self
            .invitations
            .reset_for_resend(invitation_id, token.as_str(), expires_at, now)
            .await?
        else {
            return Err(self.missed_transition_error(invitation_id).await);
        };

        self.record_activity(actor, resent.id, ActivityAction::Resent, None)
            .await?;
        info!(invitation_id = %resent.id, "invitation resent");
        self.publish(InvitationEventKind::Resent, &resent).await;

        Ok(resent)
    }

    /// Rotates the email-flow token of a pending invitation; the old token stops working.
    pub async fn regenerate_token(
        &self,
        actor: &Actor,
        invitation_id: InvitationId,
    ) -> AppResult<Invitation> {
        let invitation = self.require_invitation(invitation_id).await?;
        if !invitation.is_pending() {
            return Err(AppError::AlreadyResolved(format!(
                "invitation '{}' is already {}",
                invitation.id,
                invitation.status.as_str()
            )));
        }

        let token = generate_token()?;
        let Some(rotated) = self
            .invitations
            .regenerate_token(invitation_id, token.as_str(), Utc::now())
            .await?
        else {
            return Err(self.missed_transition_error(invitation_id).await);
        };

        self.record_activity(actor, rotated.id, ActivityAction::TokenRegenerated, None)
            .await?;
        info!(invitation_id = %rotated.id, "invitation token regenerated");

        Ok(rotated)
    }
}

/// Keeps full tokens out of the audit trail.
fn abbreviate(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
