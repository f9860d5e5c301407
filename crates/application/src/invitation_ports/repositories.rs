use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use grantflow_core::{AppResult, UserId, WorkspaceId};
use grantflow_domain::{
    AccessRequest, AccessRequestDecision, AccessRequestId, AccessRequestStatus,
    BulkInvitationId, BulkInvitationResult, EmailAddress, GrantType, Invitation,
    InvitationActivity, InvitationId, InvitationLinkSettings, InvitationPermissions,
    InvitationTransition, LinkSettingsId, TargetId,
};

use super::queries::InvitationFilter;

/// Repository port for invitation persistence.
///
/// Every `find_*` method reports absence as `Ok(None)` or an empty list.
#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// Stores a new invitation. Fails with `Conflict` when the token is taken.
    async fn create_invitation(&self, invitation: Invitation) -> AppResult<()>;

    /// Finds an invitation by identifier.
    async fn find_invitation(&self, invitation_id: InvitationId)
    -> AppResult<Option<Invitation>>;

    /// Finds an invitation by its email-flow token.
    async fn find_by_token(&self, token: &str) -> AppResult<Option<Invitation>>;

    /// Lists invitations created through one shared link.
    async fn find_by_link_token(&self, link_token: &str) -> AppResult<Vec<Invitation>>;

    /// Lists invitations addressed to an email inside a workspace.
    async fn find_by_email(
        &self,
        workspace_id: WorkspaceId,
        email: &EmailAddress,
    ) -> AppResult<Vec<Invitation>>;

    /// Lists invitations accepted by a user.
    async fn find_by_invitee(&self, user_id: UserId) -> AppResult<Vec<Invitation>>;

    /// Lists invitations matching a filter, newest first.
    async fn list_invitations(&self, filter: &InvitationFilter) -> AppResult<Vec<Invitation>>;

    /// Counts invitations matching a filter, ignoring pagination.
    async fn count_invitations(&self, filter: &InvitationFilter) -> AppResult<u64>;

    /// Returns whether a pending invitation exists for the email and target.
    async fn exists_pending_for_email(
        &self,
        grant_type: GrantType,
        target_id: TargetId,
        email: &EmailAddress,
    ) -> AppResult<bool>;

    /// Returns whether a pending invitation exists for the user and target.
    async fn exists_pending_for_user(
        &self,
        grant_type: GrantType,
        target_id: TargetId,
        user_id: UserId,
    ) -> AppResult<bool>;

    /// Moves a pending invitation out of `pending` in one conditional write.
    ///
    /// Returns `None` when no pending row matched, either because the
    /// invitation does not exist or because another writer resolved it first.
    async fn transition_invitation(
        &self,
        invitation_id: InvitationId,
        transition: InvitationTransition,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>>;

    /// Replaces the email-flow token of a pending invitation.
    ///
    /// Returns `None` when the invitation is missing or no longer pending.
    async fn regenerate_token(
        &self,
        invitation_id: InvitationId,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>>;

    /// Replaces the token, resets reminder state and sets the expiry, if still pending.
    async fn reset_for_resend(
        &self,
        invitation_id: InvitationId,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>>;

    /// Increments the reminder count and stamps the reminder time.
    async fn update_reminder_sent(
        &self,
        invitation_id: InvitationId,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Lists pending invitations due for a reminder, oldest first.
    async fn find_pending_for_reminder(
        &self,
        min_age: Duration,
        max_reminders: u32,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Invitation>>;

    /// Lists pending invitations whose expiry has passed, oldest first.
    async fn find_expired(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<Invitation>>;

    /// Atomically increments the use count of a link-shared invitation.
    async fn increment_link_use_count(&self, invitation_id: InvitationId) -> AppResult<()>;

    /// Stores granular capability flags for an invitation.
    async fn save_permissions(
        &self,
        invitation_id: InvitationId,
        permissions: InvitationPermissions,
    ) -> AppResult<()>;

    /// Finds granular capability flags for an invitation.
    async fn find_permissions(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Option<InvitationPermissions>>;
}

/// Repository port for reusable invitation links.
#[async_trait]
pub trait InvitationLinkRepository: Send + Sync {
    /// Stores a new link policy. Fails with `Conflict` when the token is taken.
    async fn create_link_settings(&self, settings: InvitationLinkSettings) -> AppResult<()>;

    /// Finds a link policy by identifier.
    async fn find_link_settings(
        &self,
        link_settings_id: LinkSettingsId,
    ) -> AppResult<Option<InvitationLinkSettings>>;

    /// Finds a link policy by its shared token.
    async fn find_link_settings_by_token(
        &self,
        link_token: &str,
    ) -> AppResult<Option<InvitationLinkSettings>>;

    /// Lists link policies in a workspace, newest first.
    async fn list_link_settings(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<InvitationLinkSettings>>;

    /// Activates or deactivates a link policy.
    async fn set_link_active(
        &self,
        link_settings_id: LinkSettingsId,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Option<InvitationLinkSettings>>;

    /// Consumes one use in a single conditional increment.
    ///
    /// Returns `None` when the link is missing, inactive, expired, or at its ceiling.
    async fn increment_link_settings_use_count(
        &self,
        link_token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<InvitationLinkSettings>>;

    /// Gives back one consumed use after a join that did not complete.
    ///
    /// Never drops the count below zero.
    async fn release_link_settings_use(
        &self,
        link_token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// Repository port for self-service access requests.
#[async_trait]
pub trait AccessRequestRepository: Send + Sync {
    /// Stores a new access request.
    async fn create_access_request(&self, request: AccessRequest) -> AppResult<()>;

    /// Finds an access request by identifier.
    async fn find_access_request(
        &self,
        access_request_id: AccessRequestId,
    ) -> AppResult<Option<AccessRequest>>;

    /// Lists access requests in a workspace, newest first.
    async fn list_access_requests(
        &self,
        workspace_id: WorkspaceId,
        status: Option<AccessRequestStatus>,
    ) -> AppResult<Vec<AccessRequest>>;

    /// Returns whether the requester already waits on the same target.
    async fn exists_pending_access_request(
        &self,
        requester_id: UserId,
        grant_type: GrantType,
        target_id: TargetId,
    ) -> AppResult<bool>;

    /// Records a decision on a pending request in one conditional write.
    ///
    /// Returns `None` when no pending row matched.
    async fn update_access_request_status(
        &self,
        access_request_id: AccessRequestId,
        decision: &AccessRequestDecision,
        processed_by: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AccessRequest>>;
}

/// Repository port for bulk invitation summaries.
#[async_trait]
pub trait BulkInvitationRepository: Send + Sync {
    /// Stores a summary at the start of a run.
    async fn create_bulk_result(&self, result: BulkInvitationResult) -> AppResult<()>;

    /// Stores the finalised counts of a run.
    async fn complete_bulk_result(&self, result: &BulkInvitationResult) -> AppResult<()>;

    /// Finds a summary by identifier.
    async fn find_bulk_result(
        &self,
        bulk_invitation_id: BulkInvitationId,
    ) -> AppResult<Option<BulkInvitationResult>>;
}

/// Port for the append-only invitation audit trail.
#[async_trait]
pub trait InvitationActivityRepository: Send + Sync {
    /// Appends one entry.
    async fn append_activity(&self, activity: InvitationActivity) -> AppResult<()>;

    /// Lists entries for an invitation, oldest first.
    async fn list_activity(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Vec<InvitationActivity>>;
}
