use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use grantflow_core::{ActorType, AppError, AppResult, UserId, WorkspaceId};
use grantflow_domain::{
    AccessRequest, AccessRequestId, AccessRequestStatus, ActivityAction, ActivityId,
    BulkInvitationId, BulkInvitationResult, BulkInvitationStatus, DomainList, EmailAddress,
    GrantRole, GrantType, Invitation, InvitationActivity, InvitationId, InvitationLinkSettings,
    InvitationMethod, InvitationPermissions, InvitationStatus, LinkSettingsId, PermissionLevel,
    TargetId,
};

macro_rules! invitation_columns {
    () => {
        r#"
            id, workspace_id, email, token, link_token, grant_type, target_id, role,
            permission, invited_by, invitee_user_id, status, method, message, expires_at,
            link_expires_at, accepted_at, declined_at, reminder_sent_at, reminder_count,
            max_uses, use_count, metadata, created_at, updated_at
        "#
    };
}

macro_rules! link_settings_columns {
    () => {
        r#"
            id, workspace_id, link_token, grant_type, target_id, default_role,
            default_permission, is_active, requires_approval, allowed_domains,
            blocked_domains, max_uses, use_count, expires_at, created_by, created_at,
            updated_at
        "#
    };
}

macro_rules! access_request_columns {
    () => {
        r#"
            id, workspace_id, requester_id, email, grant_type, target_id, message, status,
            processed_by, processed_at, denial_reason, created_at
        "#
    };
}

pub(super) use {access_request_columns, invitation_columns, link_settings_columns};

fn to_count(value: i32, field: &str) -> AppResult<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::Internal(format!("stored {field} is negative: {value}")))
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct InvitationRow {
    id: Uuid,
    workspace_id: Uuid,
    email: String,
    token: String,
    link_token: Option<String>,
    grant_type: String,
    target_id: Uuid,
    role: String,
    permission: String,
    invited_by: Uuid,
    invitee_user_id: Option<Uuid>,
    status: String,
    method: String,
    message: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    link_expires_at: Option<DateTime<Utc>>,
    accepted_at: Option<DateTime<Utc>>,
    declined_at: Option<DateTime<Utc>>,
    reminder_sent_at: Option<DateTime<Utc>>,
    reminder_count: i32,
    max_uses: Option<i32>,
    use_count: i32,
    metadata: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = AppError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: InvitationId::from_uuid(row.id),
            workspace_id: WorkspaceId::from_uuid(row.workspace_id),
            email: EmailAddress::new(row.email)?,
            token: row.token,
            link_token: row.link_token,
            grant_type: GrantType::from_str(row.grant_type.as_str())?,
            target_id: TargetId::from_uuid(row.target_id),
            role: GrantRole::from_str(row.role.as_str())?,
            permission: PermissionLevel::from_str(row.permission.as_str())?,
            invited_by: UserId::from_uuid(row.invited_by),
            invitee_user_id: row.invitee_user_id.map(UserId::from_uuid),
            status: InvitationStatus::from_str(row.status.as_str())?,
            method: InvitationMethod::from_str(row.method.as_str())?,
            message: row.message,
            expires_at: row.expires_at,
            link_expires_at: row.link_expires_at,
            accepted_at: row.accepted_at,
            declined_at: row.declined_at,
            reminder_sent_at: row.reminder_sent_at,
            reminder_count: to_count(row.reminder_count, "reminder_count")?,
            max_uses: row
                .max_uses
                .map(|value| to_count(value, "max_uses"))
                .transpose()?,
            use_count: to_count(row.use_count, "use_count")?,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(super) fn invitations_from_rows(rows: Vec<InvitationRow>) -> AppResult<Vec<Invitation>> {
    rows.into_iter().map(Invitation::try_from).collect()
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PermissionsRow {
    can_edit_tasks: bool,
    can_create_tasks: bool,
    can_delete_tasks: bool,
    can_comment: bool,
    can_create_subtasks: bool,
    can_assign: bool,
    can_see_time: bool,
    can_track_time: bool,
    can_add_tags: bool,
    can_create_views: bool,
    can_invite_others: bool,
    can_manage_sprints: bool,
    can_view_reports: bool,
    can_export: bool,
    custom_permissions: Option<Value>,
}

impl From<PermissionsRow> for InvitationPermissions {
    fn from(row: PermissionsRow) -> Self {
        Self {
            can_edit_tasks: row.can_edit_tasks,
            can_create_tasks: row.can_create_tasks,
            can_delete_tasks: row.can_delete_tasks,
            can_comment: row.can_comment,
            can_create_subtasks: row.can_create_subtasks,
            can_assign: row.can_assign,
            can_see_time: row.can_see_time,
            can_track_time: row.can_track_time,
            can_add_tags: row.can_add_tags,
            can_create_views: row.can_create_views,
            can_invite_others: row.can_invite_others,
            can_manage_sprints: row.can_manage_sprints,
            can_view_reports: row.can_view_reports,
            can_export: row.can_export,
            custom_permissions: row.custom_permissions,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct LinkSettingsRow {
    id: Uuid,
    workspace_id: Uuid,
    link_token: String,
    grant_type: String,
    target_id: Uuid,
    default_role: String,
    default_permission: String,
    is_active: bool,
    requires_approval: bool,
    allowed_domains: Vec<String>,
    blocked_domains: Vec<String>,
    max_uses: Option<i32>,
    use_count: i32,
    expires_at: Option<DateTime<Utc>>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LinkSettingsRow> for InvitationLinkSettings {
    type Error = AppError;

    fn try_from(row: LinkSettingsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: LinkSettingsId::from_uuid(row.id),
            workspace_id: WorkspaceId::from_uuid(row.workspace_id),
            link_token: row.link_token,
            grant_type: GrantType::from_str(row.grant_type.as_str())?,
            target_id: TargetId::from_uuid(row.target_id),
            default_role: GrantRole::from_str(row.default_role.as_str())?,
            default_permission: PermissionLevel::from_str(row.default_permission.as_str())?,
            is_active: row.is_active,
            requires_approval: row.requires_approval,
            allowed_domains: DomainList::new(row.allowed_domains),
            blocked_domains: DomainList::new(row.blocked_domains),
            max_uses: row
                .max_uses
                .map(|value| to_count(value, "max_uses"))
                .transpose()?,
            use_count: to_count(row.use_count, "use_count")?,
            expires_at: row.expires_at,
            created_by: UserId::from_uuid(row.created_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct AccessRequestRow {
    id: Uuid,
    workspace_id: Uuid,
    requester_id: Uuid,
    email: String,
    grant_type: String,
    target_id: Uuid,
    message: Option<String>,
    status: String,
    processed_by: Option<Uuid>,
    processed_at: Option<DateTime<Utc>>,
    denial_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccessRequestRow> for AccessRequest {
    type Error = AppError;

    fn try_from(row: AccessRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AccessRequestId::from_uuid(row.id),
            workspace_id: WorkspaceId::from_uuid(row.workspace_id),
            requester_id: UserId::from_uuid(row.requester_id),
            email: EmailAddress::new(row.email)?,
            grant_type: GrantType::from_str(row.grant_type.as_str())?,
            target_id: TargetId::from_uuid(row.target_id),
            message: row.message,
            status: AccessRequestStatus::from_str(row.status.as_str())?,
            processed_by: row.processed_by.map(UserId::from_uuid),
            processed_at: row.processed_at,
            denial_reason: row.denial_reason,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct BulkResultRow {
    id: Uuid,
    workspace_id: Uuid,
    invited_by: Uuid,
    grant_type: String,
    target_id: Uuid,
    role: String,
    total_count: i32,
    success_count: i32,
    failed_count: i32,
    skipped_count: i32,
    status: String,
    failed_emails: Vec<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BulkResultRow> for BulkInvitationResult {
    type Error = AppError;

    fn try_from(row: BulkResultRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: BulkInvitationId::from_uuid(row.id),
            workspace_id: WorkspaceId::from_uuid(row.workspace_id),
            invited_by: UserId::from_uuid(row.invited_by),
            grant_type: GrantType::from_str(row.grant_type.as_str())?,
            target_id: TargetId::from_uuid(row.target_id),
            role: GrantRole::from_str(row.role.as_str())?,
            total_count: to_count(row.total_count, "total_count")?,
            success_count: to_count(row.success_count, "success_count")?,
            failed_count: to_count(row.failed_count, "failed_count")?,
            skipped_count: to_count(row.skipped_count, "skipped_count")?,
            status: BulkInvitationStatus::from_str(row.status.as_str())?,
            failed_emails: row.failed_emails,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ActivityRow {
    id: Uuid,
    invitation_id: Uuid,
    action: String,
    actor_id: Option<Uuid>,
    actor_type: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    details: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for InvitationActivity {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ActivityId::from_uuid(row.id),
            invitation_id: InvitationId::from_uuid(row.invitation_id),
            action: ActivityAction::from_str(row.action.as_str())?,
            actor_id: row.actor_id.map(UserId::from_uuid),
            actor_type: ActorType::from_str(row.actor_type.as_str())?,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            details: row.details,
            created_at: row.created_at,
        })
    }
}
