//! Reusable invitation links: policy management and self-service joining.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use grantflow_core::{Actor, AppError, AppResult, UserId, WorkspaceId};
use grantflow_domain::{
    AccessRequest, EmailAddress, Invitation, InvitationLinkSettings, InvitationMethod, LinkSettingsId,
    NewAccessRequest, NewInvitation, NewLinkSettings,
};

use crate::invitation_ports::InvitationLinkRepository;
use crate::token::generate_token;
use crate::{AccessRequestService, InvitationService};

#[cfg(test)]
mod tests;

/// Result of presenting a shared link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum JoinOutcome {
    /// The user joined directly through an accepted link invitation.
    Joined(Invitation),
    /// The link requires approval; an access request was filed.
    PendingApproval(AccessRequest),
}

/// Application service for shared invitation links.
#[derive(Clone)]
pub struct InvitationLinkService {
    links: Arc<dyn InvitationLinkRepository>,
    invitations: InvitationService,
    access_requests: AccessRequestService,
}

impl InvitationLinkService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        links: Arc<dyn InvitationLinkRepository>,
        invitations: InvitationService,
        access_requests: AccessRequestService,
    ) -> Self {
        Self {
            links,
            invitations,
            access_requests,
        }
    }

    /// Creates an active link policy with a fresh link token.
    pub async fn create_link_settings(
        &self,
        input: NewLinkSettings,
    ) -> AppResult<InvitationLinkSettings> {
        let settings = InvitationLinkSettings::create(input, generate_token()?, Utc::now())?;
        self.links.create_link_settings(settings.clone()).await?;

        info!(
            link_settings_id = %settings.id,
            workspace_id = %settings.workspace_id,
            grant_type = settings.grant_type.as_str(),
            requires_approval = settings.requires_approval,
            "invitation link created"
        );

        Ok(settings)
    }

    /// Activates or deactivates a link.
    pub async fn set_link_active(
        &self,
        link_settings_id: LinkSettingsId,
        is_active: bool,
    ) -> AppResult<InvitationLinkSettings> {
        let settings = self
            .links
            .set_link_active(link_settings_id, is_active, Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("invitation link '{link_settings_id}' not found"))
            })?;

        info!(link_settings_id = %settings.id, is_active, "invitation link updated");
        Ok(settings)
    }

    /// Finds a link policy by identifier.
    pub async fn find_link_settings(
        &self,
        link_settings_id: LinkSettingsId,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        self.links.find_link_settings(link_settings_id).await
    }

    /// Finds a link policy by its shared token.
    pub async fn find_link_settings_by_token(
        &self,
        link_token: &str,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        self.links.find_link_settings_by_token(link_token).await
    }

    /// Lists link policies in a workspace.
    pub async fn list_link_settings(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<InvitationLinkSettings>> {
        self.links.list_link_settings(workspace_id).await
    }

    /// Checks validity then domain policy for one prospective joiner.
    pub async fn validate_link(
        &self,
        link_token: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> AppResult<InvitationLinkSettings> {
        let settings = self
            .links
            .find_link_settings_by_token(link_token)
            .await?
            .ok_or_else(|| AppError::NotFound("invitation link not found".to_owned()))?;

        settings.admit(email, now)?;
        Ok(settings)
    }

    /// Joins through a shared link, or files an access request when the link
    /// requires approval.
    ///
    /// A use is consumed with one conditional increment before the grant is
    /// created, so concurrent joiners can never exceed the ceiling. A join that
    /// fails after the increment gives the use back.
    pub async fn join_via_link(
        &self,
        actor: &Actor,
        link_token: &str,
        user_id: UserId,
        email: &str,
    ) -> AppResult<JoinOutcome> {
        let settings = self.validate_link(link_token, email, Utc::now()).await?;

        if settings.requires_approval {
            let request = self
                .access_requests
                .request_access(NewAccessRequest {
                    workspace_id: settings.workspace_id,
                    requester_id: user_id,
                    email: email.to_owned(),
                    grant_type: settings.grant_type,
                    target_id: settings.target_id,
                    message: None,
                })
                .await?;
            return Ok(JoinOutcome::PendingApproval(request));
        }

        let email = EmailAddress::new(email)?;
        let now = Utc::now();
        let Some(consumed) = self
            .links
            .increment_link_settings_use_count(link_token, now)
            .await?
        else {
            return Err(self.exhausted_link_error(link_token, now).await);
        };

        let accepted = self
            .admit_through_link(actor, &consumed, user_id, &email)
            .await?;

        info!(
            link_settings_id = %consumed.id,
            invitation_id = %accepted.id,
            use_count = consumed.use_count,
            "joined through invitation link"
        );

        Ok(JoinOutcome::Joined(accepted))
    }

    async fn admit_through_link(
        &self,
        actor: &Actor,
        consumed: &InvitationLinkSettings,
        user_id: UserId,
        email: &EmailAddress,
    ) -> AppResult<Invitation> {
        let mut input = NewInvitation::new(
            consumed.workspace_id,
            email.as_str(),
            consumed.grant_type,
            consumed.target_id,
            consumed.default_role,
            consumed.created_by,
        );
        input.permission = Some(consumed.default_permission);
        input.method = Some(InvitationMethod::Link);
        input.link_token = Some(consumed.link_token.clone());
        input.link_expires_at = consumed.expires_at;

        let invitation = match self.invitations.create_invitation(actor, input, None).await {
            Ok(invitation) => invitation,
            Err(error) => {
                self.release_use(consumed.link_token.as_str()).await;
                return Err(error);
            }
        };

        let joined = async {
            self.invitations
                .record_link_use(actor, invitation.id, consumed.link_token.as_str())
                .await?;
            self.invitations
                .accept_by_id(actor, invitation.id, user_id, None)
                .await
        }
        .await;

        if joined.is_err() && self.invitations.withdraw_unrecorded(invitation.id).await {
            self.release_use(consumed.link_token.as_str()).await;
        }
        joined
    }

    async fn release_use(&self, link_token: &str) {
        if let Err(error) = self
            .links
            .release_link_settings_use(link_token, Utc::now())
            .await
        {
            warn!(error = %error, "failed to release invitation link use");
        }
    }

    /// The increment matched nothing: report the current reason when one is visible.
    async fn exhausted_link_error(&self, link_token: &str, now: DateTime<Utc>) -> AppError {
        match self.links.find_link_settings_by_token(link_token).await {
            Ok(Some(current)) => AppError::LinkInvalid(
                current
                    .invalid_reason(now)
                    .unwrap_or("invitation link is no longer available")
                    .to_owned(),
            ),
            Ok(None) => AppError::NotFound("invitation link not found".to_owned()),
            Err(error) => error,
        }
    }
}
