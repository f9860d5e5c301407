use super::*;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use grantflow_application::{InvitationFilter, InvitationRepository};
use grantflow_core::{UserId, WorkspaceId};
use grantflow_domain::{
    EmailAddress, GrantType, Invitation, InvitationId, InvitationPermissions,
    InvitationTransition, TargetId,
};

use super::rows::{InvitationRow, PermissionsRow, invitation_columns, invitations_from_rows};

/// Flattened filter values bound positionally as `$1..$7`.
struct FilterParams {
    workspace_id: Option<Uuid>,
    grant_type: Option<&'static str>,
    target_id: Option<Uuid>,
    status: Option<&'static str>,
    email: Option<String>,
    invitee_user_id: Option<Uuid>,
    invited_by: Option<Uuid>,
}

impl FilterParams {
    fn from_filter(filter: &InvitationFilter) -> Self {
        Self {
            workspace_id: filter.workspace_id.map(|value| value.as_uuid()),
            grant_type: filter.target.map(|(grant_type, _)| grant_type.as_str()),
            target_id: filter.target.map(|(_, target_id)| target_id.as_uuid()),
            status: filter.status.map(|status| status.as_str()),
            email: filter.email.as_ref().map(|email| email.as_str().to_owned()),
            invitee_user_id: filter.invitee_user_id.map(|value| value.as_uuid()),
            invited_by: filter.invited_by.map(|value| value.as_uuid()),
        }
    }
}

macro_rules! filter_clause {
    () => {
        r#"
        WHERE ($1::UUID IS NULL OR workspace_id = $1)
          AND ($2::TEXT IS NULL OR grant_type = $2)
          AND ($3::UUID IS NULL OR target_id = $3)
          AND ($4::TEXT IS NULL OR status = $4)
          AND ($5::TEXT IS NULL OR email = $5)
          AND ($6::UUID IS NULL OR invitee_user_id = $6)
          AND ($7::UUID IS NULL OR invited_by = $7)
        "#
    };
}

impl PostgresInvitationStore {
    async fn token_update(
        &self,
        invitation_id: InvitationId,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        reset_reminders: bool,
    ) -> AppResult<Option<Invitation>> {
        sqlx::query_as::<_, InvitationRow>(concat!(
            r#"
            UPDATE invitations
            SET token = $2,
                expires_at = CASE WHEN $5 THEN $3 ELSE expires_at END,
                reminder_count = CASE WHEN $5 THEN 0 ELSE reminder_count END,
                reminder_sent_at = CASE WHEN $5 THEN NULL ELSE reminder_sent_at END,
                updated_at = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING
            "#,
            invitation_columns!()
        ))
        .bind(invitation_id.as_uuid())
        .bind(token)
        .bind(expires_at)
        .bind(now)
        .bind(reset_reminders)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            map_unique_violation(
                error,
                "invitation token is already in use",
                "update invitation token",
            )
        })?
        .map(Invitation::try_from)
        .transpose()
    }
}

#[async_trait]
impl InvitationRepository for PostgresInvitationStore {
    async fn create_invitation(&self, invitation: Invitation) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invitations (
                id, workspace_id, email, token, link_token, grant_type, target_id, role,
                permission, invited_by, invitee_user_id, status, method, message, expires_at,
                link_expires_at, accepted_at, declined_at, reminder_sent_at, reminder_count,
                max_uses, use_count, metadata, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25
            )
            "#,
        )
        .bind(invitation.id.as_uuid())
        .bind(invitation.workspace_id.as_uuid())
        .bind(invitation.email.as_str())
        .bind(invitation.token.as_str())
        .bind(invitation.link_token.as_deref())
        .bind(invitation.grant_type.as_str())
        .bind(invitation.target_id.as_uuid())
        .bind(invitation.role.as_str())
        .bind(invitation.permission.as_str())
        .bind(invitation.invited_by.as_uuid())
        .bind(invitation.invitee_user_id.map(|value| value.as_uuid()))
        .bind(invitation.status.as_str())
        .bind(invitation.method.as_str())
        .bind(invitation.message.as_deref())
        .bind(invitation.expires_at)
        .bind(invitation.link_expires_at)
        .bind(invitation.accepted_at)
        .bind(invitation.declined_at)
        .bind(invitation.reminder_sent_at)
        .bind(to_db_count(invitation.reminder_count, "reminder_count")?)
        .bind(
            invitation
                .max_uses
                .map(|value| to_db_count(value, "max_uses"))
                .transpose()?,
        )
        .bind(to_db_count(invitation.use_count, "use_count")?)
        .bind(invitation.metadata.as_ref())
        .bind(invitation.created_at)
        .bind(invitation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_violation(
                error,
                "invitation token is already in use",
                "create invitation",
            )
        })?;

        Ok(())
    }

    async fn find_invitation(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Option<Invitation>> {
        sqlx::query_as::<_, InvitationRow>(concat!(
            "SELECT ",
            invitation_columns!(),
            " FROM invitations WHERE id = $1"
        ))
        .bind(invitation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find invitation: {error}")))?
        .map(Invitation::try_from)
        .transpose()
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Invitation>> {
        sqlx::query_as::<_, InvitationRow>(concat!(
            "SELECT ",
            invitation_columns!(),
            " FROM invitations WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find invitation by token: {error}"))
        })?
        .map(Invitation::try_from)
        .transpose()
    }

    async fn find_by_link_token(&self, link_token: &str) -> AppResult<Vec<Invitation>> {
        let rows = sqlx::query_as::<_, InvitationRow>(concat!(
            "SELECT ",
            invitation_columns!(),
            " FROM invitations WHERE link_token = $1 ORDER BY created_at DESC, id"
        ))
        .bind(link_token)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list invitations by link token: {error}"))
        })?;

        invitations_from_rows(rows)
    }

    async fn find_by_email(
        &self,
        workspace_id: WorkspaceId,
        email: &EmailAddress,
    ) -> AppResult<Vec<Invitation>> {
        let rows = sqlx::query_as::<_, InvitationRow>(concat!(
            "SELECT ",
            invitation_columns!(),
            r#"
            FROM invitations
            WHERE workspace_id = $1 AND email = $2
            ORDER BY created_at DESC, id
            "#
        ))
        .bind(workspace_id.as_uuid())
        .bind(email.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list invitations by email: {error}"))
        })?;

        invitations_from_rows(rows)
    }

    async fn find_by_invitee(&self, user_id: UserId) -> AppResult<Vec<Invitation>> {
        let rows = sqlx::query_as::<_, InvitationRow>(concat!(
            "SELECT ",
            invitation_columns!(),
            " FROM invitations WHERE invitee_user_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list invitations by invitee: {error}"))
        })?;

        invitations_from_rows(rows)
    }

    async fn list_invitations(&self, filter: &InvitationFilter) -> AppResult<Vec<Invitation>> {
        let params = FilterParams::from_filter(filter);
        let rows = sqlx::query_as::<_, InvitationRow>(concat!(
            "SELECT ",
            invitation_columns!(),
            " FROM invitations ",
            filter_clause!(),
            " ORDER BY created_at DESC, id LIMIT $8 OFFSET $9"
        ))
        .bind(params.workspace_id)
        .bind(params.grant_type)
        .bind(params.target_id)
        .bind(params.status)
        .bind(params.email)
        .bind(params.invitee_user_id)
        .bind(params.invited_by)
        .bind(filter.limit.map(to_db_limit))
        .bind(to_db_limit(filter.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list invitations: {error}")))?;

        invitations_from_rows(rows)
    }

    async fn count_invitations(&self, filter: &InvitationFilter) -> AppResult<u64> {
        let params = FilterParams::from_filter(filter);
        let count = sqlx::query_scalar::<_, i64>(concat!(
            "SELECT COUNT(*) FROM invitations ",
            filter_clause!()
        ))
        .bind(params.workspace_id)
        .bind(params.grant_type)
        .bind(params.target_id)
        .bind(params.status)
        .bind(params.email)
        .bind(params.invitee_user_id)
        .bind(params.invited_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count invitations: {error}")))?;

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("invalid invitation count: {error}")))
    }

    async fn exists_pending_for_email(
        &self,
        grant_type: GrantType,
        target_id: TargetId,
        email: &EmailAddress,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invitations
                WHERE grant_type = $1 AND target_id = $2 AND email = $3 AND status = 'pending'
            )
            "#,
        )
        .bind(grant_type.as_str())
        .bind(target_id.as_uuid())
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to check pending invitation for email: {error}"
            ))
        })
    }

    async fn exists_pending_for_user(
        &self,
        grant_type: GrantType,
        target_id: TargetId,
        user_id: UserId,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invitations
                WHERE grant_type = $1
                  AND target_id = $2
                  AND invitee_user_id = $3
                  AND status = 'pending'
            )
            "#,
        )
        .bind(grant_type.as_str())
        .bind(target_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to check pending invitation for user: {error}"
            ))
        })
    }

    async fn transition_invitation(
        &self,
        invitation_id: InvitationId,
        transition: InvitationTransition,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>> {
        let accepting_user = match transition {
            InvitationTransition::Accept { user_id } => Some(user_id.as_uuid()),
            InvitationTransition::Decline
            | InvitationTransition::Expire
            | InvitationTransition::Cancel
            | InvitationTransition::Revoke => None,
        };

        sqlx::query_as::<_, InvitationRow>(concat!(
            r#"
            UPDATE invitations
            SET status = $2::TEXT,
                invitee_user_id = COALESCE($3, invitee_user_id),
                accepted_at = CASE WHEN $2::TEXT = 'accepted' THEN $4 ELSE accepted_at END,
                declined_at = CASE WHEN $2::TEXT = 'declined' THEN $4 ELSE declined_at END,
                updated_at = $4
            WHERE id = $1
              AND status = 'pending'
              AND ($2::TEXT <> 'accepted' OR expires_at IS NULL OR expires_at >= $4)
            RETURNING
            "#,
            invitation_columns!()
        ))
        .bind(invitation_id.as_uuid())
        .bind(transition.target_status().as_str())
        .bind(accepting_user)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to transition invitation: {error}"))
        })?
        .map(Invitation::try_from)
        .transpose()
    }

    async fn regenerate_token(
        &self,
        invitation_id: InvitationId,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>> {
        self.token_update(invitation_id, token, None, now, false)
            .await
    }

    async fn reset_for_resend(
        &self,
        invitation_id: InvitationId,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>> {
        self.token_update(invitation_id, token, expires_at, now, true)
            .await
    }

    async fn update_reminder_sent(
        &self,
        invitation_id: InvitationId,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE invitations
            SET reminder_count = reminder_count + 1,
                reminder_sent_at = $2,
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(invitation_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record invitation reminder: {error}"))
        })?;

        Ok(())
    }

    async fn find_pending_for_reminder(
        &self,
        min_age: Duration,
        max_reminders: u32,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Invitation>> {
        let rows = sqlx::query_as::<_, InvitationRow>(concat!(
            "SELECT ",
            invitation_columns!(),
            r#"
            FROM invitations
            WHERE status = 'pending'
              AND (expires_at IS NULL OR expires_at >= $1)
              AND reminder_count < $2
              AND created_at < $3
              AND (reminder_sent_at IS NULL OR reminder_sent_at < $3)
            ORDER BY created_at ASC, id
            LIMIT $4
            "#
        ))
        .bind(now)
        .bind(i64::from(max_reminders))
        .bind(now - min_age)
        .bind(to_db_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to select invitations for reminder: {error}"))
        })?;

        invitations_from_rows(rows)
    }

    async fn find_expired(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<Invitation>> {
        let rows = sqlx::query_as::<_, InvitationRow>(concat!(
            "SELECT ",
            invitation_columns!(),
            r#"
            FROM invitations
            WHERE status = 'pending'
              AND expires_at IS NOT NULL
              AND expires_at < $1
            ORDER BY created_at ASC, id
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(to_db_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to select overdue invitations: {error}"))
        })?;

        invitations_from_rows(rows)
    }

    async fn increment_link_use_count(&self, invitation_id: InvitationId) -> AppResult<()> {
        let result = sqlx::query("UPDATE invitations SET use_count = use_count + 1 WHERE id = $1")
            .bind(invitation_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to increment invitation use count: {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "invitation '{invitation_id}' not found"
            )));
        }

        Ok(())
    }

    async fn save_permissions(
        &self,
        invitation_id: InvitationId,
        permissions: InvitationPermissions,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invitation_permissions (
                invitation_id, can_edit_tasks, can_create_tasks, can_delete_tasks, can_comment,
                can_create_subtasks, can_assign, can_see_time, can_track_time, can_add_tags,
                can_create_views, can_invite_others, can_manage_sprints, can_view_reports,
                can_export, custom_permissions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (invitation_id) DO UPDATE SET
                can_edit_tasks = EXCLUDED.can_edit_tasks,
                can_create_tasks = EXCLUDED.can_create_tasks,
                can_delete_tasks = EXCLUDED.can_delete_tasks,
                can_comment = EXCLUDED.can_comment,
                can_create_subtasks = EXCLUDED.can_create_subtasks,
                can_assign = EXCLUDED.can_assign,
                can_see_time = EXCLUDED.can_see_time,
                can_track_time = EXCLUDED.can_track_time,
                can_add_tags = EXCLUDED.can_add_tags,
                can_create_views = EXCLUDED.can_create_views,
                can_invite_others = EXCLUDED.can_invite_others,
                can_manage_sprints = EXCLUDED.can_manage_sprints,
                can_view_reports = EXCLUDED.can_view_reports,
                can_export = EXCLUDED.can_export,
                custom_permissions = EXCLUDED.custom_permissions
            "#,
        )
        .bind(invitation_id.as_uuid())
        .bind(permissions.can_edit_tasks)
        .bind(permissions.can_create_tasks)
        .bind(permissions.can_delete_tasks)
        .bind(permissions.can_comment)
        .bind(permissions.can_create_subtasks)
        .bind(permissions.can_assign)
        .bind(permissions.can_see_time)
        .bind(permissions.can_track_time)
        .bind(permissions.can_add_tags)
        .bind(permissions.can_create_views)
        .bind(permissions.can_invite_others)
        .bind(permissions.can_manage_sprints)
        .bind(permissions.can_view_reports)
        .bind(permissions.can_export)
        .bind(permissions.custom_permissions)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save invitation permissions: {error}"))
        })?;

        Ok(())
    }

    async fn find_permissions(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Option<InvitationPermissions>> {
        let row = sqlx::query_as::<_, PermissionsRow>(
            r#"
            SELECT can_edit_tasks, can_create_tasks, can_delete_tasks, can_comment,
                   can_create_subtasks, can_assign, can_see_time, can_track_time, can_add_tags,
                   can_create_views, can_invite_others, can_manage_sprints, can_view_reports,
                   can_export, custom_permissions
            FROM invitation_permissions
            WHERE invitation_id = $1
            "#,
        )
        .bind(invitation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find invitation permissions: {error}"))
        })?;

        Ok(row.map(InvitationPermissions::from))
    }
}
