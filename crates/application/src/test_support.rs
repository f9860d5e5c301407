use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use grantflow_core::{AppError, AppResult, UserId, WorkspaceId};
use grantflow_domain::{
    AccessRequest, AccessRequestDecision, AccessRequestId, AccessRequestStatus,
    BulkInvitationId, BulkInvitationResult, EmailAddress, GrantType, Invitation,
    InvitationActivity, InvitationId, InvitationLinkSettings, InvitationPermissions,
    InvitationTransition, LinkSettingsId, TargetId,
};

use crate::{
    AccessRequestRepository, AccessRequestService, BulkInvitationRepository,
    InvitationActivityRepository, InvitationEvent, InvitationFilter, InvitationLinkRepository,
    InvitationNotifier, InvitationPolicy, InvitationRepository, InvitationService,
    InvitationServicePorts,
};

#[derive(Default)]
pub(crate) struct FakeStore {
    pub(crate) invitations: Mutex<HashMap<InvitationId, Invitation>>,
    pub(crate) permissions: Mutex<HashMap<InvitationId, InvitationPermissions>>,
    pub(crate) links: Mutex<HashMap<LinkSettingsId, InvitationLinkSettings>>,
    pub(crate) access_requests: Mutex<HashMap<AccessRequestId, AccessRequest>>,
    pub(crate) bulk_results: Mutex<HashMap<BulkInvitationId, BulkInvitationResult>>,
    pub(crate) activity: Mutex<Vec<InvitationActivity>>,
    pub(crate) fail_reminder_updates: bool,
    pub(crate) fail_invitation_creates: bool,
    pub(crate) fail_activity_appends: bool,
}

#[async_trait]
impl InvitationRepository for FakeStore {
    async fn create_invitation(&self, invitation: Invitation) -> AppResult<()> {
        if self.fail_invitation_creates {
            return Err(AppError::Internal("invitation store unavailable".to_owned()));
        }
        let mut invitations = self.invitations.lock().await;
        if invitations
            .values()
            .any(|existing| existing.token == invitation.token)
        {
            return Err(AppError::Conflict("token already in use".to_owned()));
        }
        invitations.insert(invitation.id, invitation);
        Ok(())
    }

    async fn find_invitation(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Option<Invitation>> {
        Ok(self.invitations.lock().await.get(&invitation_id).cloned())
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .await
            .values()
            .find(|invitation| invitation.token == token)
            .cloned())
    }

    async fn find_by_link_token(&self, link_token: &str) -> AppResult<Vec<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .await
            .values()
            .filter(|invitation| invitation.link_token.as_deref() == Some(link_token))
            .cloned()
            .collect())
    }

    async fn find_by_email(
        &self,
        workspace_id: WorkspaceId,
        email: &EmailAddress,
    ) -> AppResult<Vec<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .await
            .values()
            .filter(|invitation| {
                invitation.workspace_id == workspace_id && &invitation.email == email
            })
            .cloned()
            .collect())
    }

    async fn find_by_invitee(&self, user_id: UserId) -> AppResult<Vec<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .await
            .values()
            .filter(|invitation| invitation.invitee_user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn list_invitations(&self, filter: &InvitationFilter) -> AppResult<Vec<Invitation>> {
        let mut matching: Vec<Invitation> = self
            .invitations
            .lock()
            .await
            .values()
            .filter(|invitation| filter.matches(invitation))
            .cloned()
            .collect();
        matching.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_invitations(&self, filter: &InvitationFilter) -> AppResult<u64> {
        let count = self
            .invitations
            .lock()
            .await
            .values()
            .filter(|invitation| filter.matches(invitation))
            .count();
        Ok(count as u64)
    }

    async fn exists_pending_for_email(
        &self,
        grant_type: GrantType,
        target_id: TargetId,
        email: &EmailAddress,
    ) -> AppResult<bool> {
        Ok(self.invitations.lock().await.values().any(|invitation| {
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
        Ok(self.invitations.lock().await.values().any(|invitation| {
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
        let mut invitations = self.invitations.lock().await;
        let Some(invitation) = invitations.get_mut(&invitation_id) else {
            return Ok(None);
        };
        if matches!(transition, InvitationTransition::Accept { .. }) && !invitation.can_accept(now)
        {
            return Ok(None);
        }
        if invitation.apply_transition(transition, now).is_err() {
            return Ok(None);
        }
        Ok(Some(invitation.clone()))
    }

    async fn regenerate_token(
        &self,
        invitation_id: InvitationId,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>> {
        let mut invitations = self.invitations.lock().await;
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
        let mut invitations = self.invitations.lock().await;
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
        if self.fail_reminder_updates {
            return Err(AppError::Internal("reminder store unavailable".to_owned()));
        }
        if let Some(invitation) = self.invitations.lock().await.get_mut(&invitation_id) {
            invitation.reminder_count += 1;
            invitation.reminder_sent_at = Some(now);
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
            .invitations
            .lock()
            .await
            .values()
            .filter(|invitation| invitation.is_due_for_reminder(now, min_age, max_reminders))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_expired(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<Invitation>> {
        Ok(self
            .invitations
            .lock()
            .await
            .values()
            .filter(|invitation| invitation.is_pending() && invitation.is_expired(now))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn increment_link_use_count(&self, invitation_id: InvitationId) -> AppResult<()> {
        if let Some(invitation) = self.invitations.lock().await.get_mut(&invitation_id) {
            invitation.use_count += 1;
        }
        Ok(())
    }

    async fn save_permissions(
        &self,
        invitation_id: InvitationId,
        permissions: InvitationPermissions,
    ) -> AppResult<()> {
        self.permissions
            .lock()
            .await
            .insert(invitation_id, permissions);
        Ok(())
    }

    async fn find_permissions(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Option<InvitationPermissions>> {
        Ok(self.permissions.lock().await.get(&invitation_id).cloned())
    }
}

#[async_trait]
impl InvitationLinkRepository for FakeStore {
    async fn create_link_settings(&self, settings: InvitationLinkSettings) -> AppResult<()> {
        self.links.lock().await.insert(settings.id, settings);
        Ok(())
    }

    async fn find_link_settings(
        &self,
        link_settings_id: LinkSettingsId,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        Ok(self.links.lock().await.get(&link_settings_id).cloned())
    }

    async fn find_link_settings_by_token(
        &self,
        link_token: &str,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        Ok(self
            .links
            .lock()
            .await
            .values()
            .find(|settings| settings.link_token == link_token)
            .cloned())
    }

    async fn list_link_settings(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<InvitationLinkSettings>> {
        Ok(self
            .links
            .lock()
            .await
            .values()
            .filter(|settings| settings.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn set_link_active(
        &self,
        link_settings_id: LinkSettingsId,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        Ok(self
            .links
            .lock()
            .await
            .get_mut(&link_settings_id)
            .map(|settings| {
                settings.is_active = is_active;
                settings.updated_at = now;
                settings.clone()
            }))
    }

    async fn increment_link_settings_use_count(
        &self,
        link_token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        let mut links = self.links.lock().await;
        Ok(links
            .values_mut()
            .find(|settings| settings.link_token == link_token)
            .filter(|settings| settings.is_valid(now))
            .map(|settings| {
                settings.use_count += 1;
                settings.updated_at = now;
                settings.clone()
            }))
    }

    async fn release_link_settings_use(
        &self,
        link_token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(settings) = self
            .links
            .lock()
            .await
            .values_mut()
            .find(|settings| settings.link_token == link_token)
        {
            settings.use_count = settings.use_count.saturating_sub(1);
            settings.updated_at = now;
        }
        Ok(())
    }
}

#[async_trait]
impl AccessRequestRepository for FakeStore {
    async fn create_access_request(&self, request: AccessRequest) -> AppResult<()> {
        let mut requests = self.access_requests.lock().await;
        if requests.values().any(|existing| {
            existing.status == AccessRequestStatus::Pending
                && existing.requester_id == request.requester_id
                && existing.grant_type == request.grant_type
                && existing.target_id == request.target_id
        }) {
            return Err(AppError::Conflict(
                "a pending access request already exists for this target".to_owned(),
            ));
        }
        requests.insert(request.id, request);
        Ok(())
    }

    async fn find_access_request(
        &self,
        access_request_id: AccessRequestId,
    ) -> AppResult<Option<AccessRequest>> {
        Ok(self
            .access_requests
            .lock()
            .await
            .get(&access_request_id)
            .cloned())
    }

    async fn list_access_requests(
        &self,
        workspace_id: WorkspaceId,
        status: Option<AccessRequestStatus>,
    ) -> AppResult<Vec<AccessRequest>> {
        Ok(self
            .access_requests
            .lock()
            .await
            .values()
            .filter(|request| {
                request.workspace_id == workspace_id
                    && status.is_none_or(|status| request.status == status)
            })
            .cloned()
            .collect())
    }

    async fn exists_pending_access_request(
        &self,
        requester_id: UserId,
        grant_type: GrantType,
        target_id: TargetId,
    ) -> AppResult<bool> {
        Ok(self.access_requests.lock().await.values().any(|request| {
            request.status == AccessRequestStatus::Pending
                && request.requester_id == requester_id
                && request.grant_type == grant_type
                && request.target_id == target_id
        }))
    }

    async fn update_access_request_status(
        &self,
        access_request_id: AccessRequestId,
        decision: &AccessRequestDecision,
        processed_by: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AccessRequest>> {
        let mut requests = self.access_requests.lock().await;
        let Some(request) = requests.get_mut(&access_request_id) else {
            return Ok(None);
        };
        if request.apply_decision(decision, processed_by, now).is_err() {
            return Ok(None);
        }
        Ok(Some(request.clone()))
    }
}

#[async_trait]
impl BulkInvitationRepository for FakeStore {
    async fn create_bulk_result(&self, result: BulkInvitationResult) -> AppResult<()> {
        self.bulk_results.lock().await.insert(result.id, result);
        Ok(())
    }

    async fn complete_bulk_result(&self, result: &BulkInvitationResult) -> AppResult<()> {
        self.bulk_results
            .lock()
            .await
            .insert(result.id, result.clone());
        Ok(())
    }

    async fn find_bulk_result(
        &self,
        bulk_invitation_id: BulkInvitationId,
    ) -> AppResult<Option<BulkInvitationResult>> {
        Ok(self
            .bulk_results
            .lock()
            .await
            .get(&bulk_invitation_id)
            .cloned())
    }
}

#[async_trait]
impl InvitationActivityRepository for FakeStore {
    async fn append_activity(&self, activity: InvitationActivity) -> AppResult<()> {
        if self.fail_activity_appends {
            return Err(AppError::Internal("activity store unavailable".to_owned()));
        }
        self.activity.lock().await.push(activity);
        Ok(())
    }

    async fn list_activity(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Vec<InvitationActivity>> {
        Ok(self
            .activity
            .lock()
            .await
            .iter()
            .filter(|activity| activity.invitation_id == invitation_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) events: Mutex<Vec<InvitationEvent>>,
    pub(crate) fail: bool,
}

#[async_trait]
impl InvitationNotifier for RecordingNotifier {
    async fn publish(&self, event: InvitationEvent) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Internal("notifier unavailable".to_owned()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) fn invitation_service(
    store: &Arc<FakeStore>,
    notifier: &Arc<RecordingNotifier>,
) -> InvitationService {
    InvitationService::new(
        InvitationServicePorts {
            invitations: store.clone(),
            bulk_results: store.clone(),
            activity: store.clone(),
            notifier: notifier.clone(),
        },
        InvitationPolicy::default(),
    )
}

pub(crate) fn access_request_service(store: &Arc<FakeStore>) -> AccessRequestService {
    AccessRequestService::new(store.clone())
}
