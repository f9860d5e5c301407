use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use grantflow_application::{InvitationFilter, InvitationRepository};
use grantflow_core::{AppError, AppResult, UserId, WorkspaceId};
use grantflow_domain::{
    EmailAddress, GrantType, Invitation, InvitationId, InvitationPermissions,
    InvitationTransition, TargetId,
};

use super::{InMemoryInvitationStore, newest_first};

impl InMemoryInvitationStore {
    async fn collect_invitations(
        &self,
        predicate: impl Fn(&Invitation) -> bool,
    ) -> Vec<Invitation> {
        let mut values: Vec<Invitation> = self
            .invitations
            .read()
            .await
            .values()
            .filter(|invitation| predicate(invitation))
            .cloned()
            .collect();
        values.sort_by(newest_first);
        values
    }

    async fn oldest_first(
        &self,
        limit: usize,
        predicate: impl Fn(&Invitation) -> bool,
    ) -> Vec<Invitation> {
        let mut values = self.collect_invitations(predicate).await;
        values.reverse();
        values.truncate(limit);
        values
    }
}

#[async_trait]
impl InvitationRepository for InMemoryInvitationStore {
    async fn create_invitation(&self, invitation: Invitation) -> AppResult<()> {
        let mut invitations = self.invitations.write().await;

        if invitations.contains_key(&invitation.id) {
            return Err(AppError::Conflict(format!(
                "invitation '{}' already exists",
                invitation.id
            )));
        }

        if invitations
            .values()
            .any(|existing| existing.token == invitation.token)
        {
            return Err(AppError::Conflict(
                "invitation token is already in use".to_owned(),
            ));
        }

        invitations.insert(invitation.id, invitation);
        Ok(())
    }

    async fn find_invitation(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Option<Invitation>> {
        Ok(self.invitations.read().await.get(&invitation_id).cloned())
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Invitation>> {
        Ok(self
            .invitations
            .read()
            .await
            .values()
            .find(|invitation| invitation.token == token)
            .cloned())
    }

    async fn find_by_link_token(&self, link_token: &str) -> AppResult<Vec<Invitation>> {
        Ok(self
            .collect_invitations(|invitation| invitation.link_token.as_deref() == Some(link_token))
            .await)
    }

    async fn find_by_email(
        &self,
        workspace_id: WorkspaceId,
        email: &EmailAddress,
    ) -> AppResult<Vec<Invitation>> {
        Ok(self
            .collect_invitations(|invitation| {
                invitation.workspace_id == workspace_id && &invitation.email == email
            })
            .await)
    }

    async fn find_by_invitee(&self, user_id: UserId) -> AppResult<Vec<Invitation>> {
        Ok(self
            .collect_invitations(|invitation| invitation.invitee_user_id == Some(user_id))
            .await)
    }

    async fn list_invitations(&self, filter: &InvitationFilter) -> AppResult<Vec<Invitation>> {
        Ok(self
            .collect_invitations(|invitation| filter.matches(invitation))
            .await
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_invitations(&self, filter: &InvitationFilter) -> AppResult<u64> {
        let count = self
            .invitations
            .read()
            .await
            .values()
            .filter(|invitation| filter.matches(invitation))
            .count();

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("invitation count overflow: {error}")))
    }

    async fn exists_pending_for_email(
        &self,
        grant_type: GrantType,
        target_id: TargetId,
        email: &EmailAddress,
    ) -> AppResult<bool> {
        Ok(self.invitations.read().await.values().any(|invitation| {
            invitation.is_pending()
                && invitation.grant_type == grant_type
                && invitation.target_id == target_id
                && &invitation.email == email
        }))
    }

    async fn exists_pending_for_user(
        &self,
        grant_type: GrantType,
        target_id: TargetId,
        user_id: UserId,
    ) -> AppResult<bool> {
        Ok(self.invitations.read().await.values().any(|invitation| {
            invitation.is_pending()
                && invitation.grant_type == grant_type
                && invitation.target_id == target_id
                && invitation.invitee_user_id == Some(user_id)
        }))
    }

    async fn transition_invitation(
        &self,
        invitation_id: InvitationId,
        transition: InvitationTransition,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>> {
        let mut invitations = self.invitations.write().await;
        let Some(invitation) = invitations.get_mut(&invitation_id) else {
            return Ok(None);
        };

        let admissible = match transition {
            InvitationTransition::Accept { .. } => invitation.can_accept(now),
            InvitationTransition::Decline
            | InvitationTransition::Expire
            | InvitationTransition::Cancel
            | InvitationTransition::Revoke => invitation.is_pending(),
        };
        if !admissible {
            return Ok(None);
        }

        invitation.apply_transition(transition, now)?;
        Ok(Some(invitation.clone()))
    }

    async fn regenerate_token(
        &self,
        invitation_id: InvitationId,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>> {
        let mut invitations = self.invitations.write().await;
        if invitations
            .values()
            .any(|existing| existing.id != invitation_id && existing.token == token)
        {
            return Err(AppError::Conflict(
                "invitation token is already in use".to_owned(),
            ));
        }

        Ok(invitations
            .get_mut(&invitation_id)
            .filter(|invitation| invitation.is_pending())
            .map(|invitation| {
                invitation.token = token.to_owned();
                invitation.updated_at = now;
                invitation.clone()
            }))
    }

    async fn reset_for_resend(
        &self,
        invitation_id: InvitationId,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>> {
        let mut invitations = self.invitations.write().await;
        if invitations
            .values()
            .any(|existing| existing.id != invitation_id && existing.token == token)
        {
            return Err(AppError::Conflict(
                "invitation token is already in use".to_owned(),
            ));
        }

        Ok(invitations
            .get_mut(&invitation_id)
            .filter(|invitation| invitation.is_pending())
            .map(|invitation| {
                invitation.token = token.to_owned();
                invitation.reminder_count = 0;
                invitation.reminder_sent_at = None;
                invitation.expires_at = expires_at;
                invitation.updated_at = now;
                invitation.clone()
            }))
    }

    async fn update_reminder_sent(
        &self,
        invitation_id: InvitationId,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(invitation) = self.invitations.write().await.get_mut(&invitation_id) {
            invitation.reminder_count = invitation.reminder_count.saturating_add(1);
            invitation.reminder_sent_at = Some(now);
            invitation.updated_at = now;
        }

        Ok(())
    }

    async fn find_pending_for_reminder(
        &self,
        min_age: Duration,
        max_reminders: u32,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Invitation>> {
        Ok(self
            .oldest_first(limit, |invitation| {
                invitation.is_due_for_reminder(now, min_age, max_reminders)
            })
            .await)
    }

    async fn find_expired(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<Invitation>> {
        Ok(self
            .oldest_first(limit, |invitation| {
                invitation.is_pending() && invitation.is_expired(now)
            })
            .await)
    }

    async fn increment_link_use_count(&self, invitation_id: InvitationId) -> AppResult<()> {
        let mut invitations = self.invitations.write().await;
        let invitation = invitations.get_mut(&invitation_id).ok_or_else(|| {
            AppError::NotFound(format!("invitation '{invitation_id}' not found"))
        })?;
        invitation.use_count = invitation.use_count.saturating_add(1);
        Ok(())
    }

    async fn save_permissions(
        &self,
        invitation_id: InvitationId,
        permissions: InvitationPermissions,
    ) -> AppResult<()> {
        self.permissions
            .write()
            .await
            .insert(invitation_id, permissions);
        Ok(())
    }

    async fn find_permissions(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Option<InvitationPermissions>> {
        Ok(self.permissions.read().await.get(&invitation_id).cloned())
    }
}
