use super::*;

use async_trait::async_trait;

use grantflow_application::{BulkInvitationRepository, InvitationActivityRepository};
use grantflow_domain::{BulkInvitationId, BulkInvitationResult, InvitationActivity, InvitationId};

use super::rows::{ActivityRow, BulkResultRow};

#[async_trait]
impl BulkInvitationRepository for PostgresInvitationStore {
    async fn create_bulk_result(&self, result: BulkInvitationResult) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bulk_invitation_results (
                id, workspace_id, invited_by, grant_type, target_id, role, total_count,
                success_count, failed_count, skipped_count, status, failed_emails, created_at,
                completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(result.id.as_uuid())
        .bind(result.workspace_id.as_uuid())
        .bind(result.invited_by.as_uuid())
        .bind(result.grant_type.as_str())
        .bind(result.target_id.as_uuid())
        .bind(result.role.as_str())
        .bind(to_db_count(result.total_count, "total_count")?)
        .bind(to_db_count(result.success_count, "success_count")?)
        .bind(to_db_count(result.failed_count, "failed_count")?)
        .bind(to_db_count(result.skipped_count, "skipped_count")?)
        .bind(result.status.as_str())
        .bind(result.failed_emails)
        .bind(result.created_at)
        .bind(result.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to create bulk invitation result: {error}"))
        })?;

        Ok(())
    }

    async fn complete_bulk_result(&self, result: &BulkInvitationResult) -> AppResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE bulk_invitation_results
            SET success_count = $2,
                failed_count = $3,
                skipped_count = $4,
                status = $5,
                failed_emails = $6,
                completed_at = $7
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(result.id.as_uuid())
        .bind(to_db_count(result.success_count, "success_count")?)
        .bind(to_db_count(result.failed_count, "failed_count")?)
        .bind(to_db_count(result.skipped_count, "skipped_count")?)
        .bind(result.status.as_str())
        .bind(result.failed_emails.clone())
        .bind(result.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to complete bulk invitation result: {error}"))
        })?;

        if updated.rows_affected() > 0 {
            return Ok(());
        }

        match self.find_bulk_result(result.id).await? {
            Some(_) => Err(AppError::AlreadyResolved(format!(
                "bulk invitation '{}' is already completed",
                result.id
            ))),
            None => Err(AppError::NotFound(format!(
                "bulk invitation '{}' not found",
                result.id
            ))),
        }
    }

    async fn find_bulk_result(
        &self,
        bulk_invitation_id: BulkInvitationId,
    ) -> AppResult<Option<BulkInvitationResult>> {
        sqlx::query_as::<_, BulkResultRow>(
            r#"
            SELECT id, workspace_id, invited_by, grant_type, target_id, role, total_count,
                   success_count, failed_count, skipped_count, status, failed_emails,
                   created_at, completed_at
            FROM bulk_invitation_results
            WHERE id = $1
            "#,
        )
        .bind(bulk_invitation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find bulk invitation result: {error}"))
        })?
        .map(BulkInvitationResult::try_from)
        .transpose()
    }
}

#[async_trait]
impl InvitationActivityRepository for PostgresInvitationStore {
    async fn append_activity(&self, activity: InvitationActivity) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invitation_activity (
                id, invitation_id, action, actor_id, actor_type, ip_address, user_agent,
                details, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(activity.id.as_uuid())
        .bind(activity.invitation_id.as_uuid())
        .bind(activity.action.as_str())
        .bind(activity.actor_id.map(|value| value.as_uuid()))
        .bind(activity.actor_type.as_str())
        .bind(activity.ip_address)
        .bind(activity.user_agent)
        .bind(activity.details)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to append invitation activity: {error}"))
        })?;

        Ok(())
    }

    async fn list_activity(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Vec<InvitationActivity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, invitation_id, action, actor_id, actor_type, ip_address, user_agent,
                   details, created_at
            FROM invitation_activity
            WHERE invitation_id = $1
            ORDER BY created_at ASC, id
            "#,
        )
        .bind(invitation_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list invitation activity: {error}"))
        })?;

        rows.into_iter().map(InvitationActivity::try_from).collect()
    }
}
