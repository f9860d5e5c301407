use super::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use grantflow_application::AccessRequestRepository;
use grantflow_core::{UserId, WorkspaceId};
use grantflow_domain::{
    AccessRequest, AccessRequestDecision, AccessRequestId, AccessRequestStatus, GrantType,
    TargetId,
};

use super::rows::{AccessRequestRow, access_request_columns};

#[async_trait]
impl AccessRequestRepository for PostgresInvitationStore {
    async fn create_access_request(&self, request: AccessRequest) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_requests (
                id, workspace_id, requester_id, email, grant_type, target_id, message, status,
                processed_by, processed_at, denial_reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.workspace_id.as_uuid())
        .bind(request.requester_id.as_uuid())
        .bind(request.email.as_str())
        .bind(request.grant_type.as_str())
        .bind(request.target_id.as_uuid())
        .bind(request.message.as_deref())
        .bind(request.status.as_str())
        .bind(request.processed_by.map(|value| value.as_uuid()))
        .bind(request.processed_at)
        .bind(request.denial_reason.as_deref())
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_violation(
                error,
                "a pending access request already exists for this target",
                "create access request",
            )
        })?;

        Ok(())
    }

    async fn find_access_request(
        &self,
        access_request_id: AccessRequestId,
    ) -> AppResult<Option<AccessRequest>> {
        sqlx::query_as::<_, AccessRequestRow>(concat!(
            "SELECT ",
            access_request_columns!(),
            " FROM access_requests WHERE id = $1"
        ))
        .bind(access_request_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find access request: {error}")))?
        .map(AccessRequest::try_from)
        .transpose()
    }

    async fn list_access_requests(
        &self,
        workspace_id: WorkspaceId,
        status: Option<AccessRequestStatus>,
    ) -> AppResult<Vec<AccessRequest>> {
        let rows = sqlx::query_as::<_, AccessRequestRow>(concat!(
            "SELECT ",
            access_request_columns!(),
            r#"
            FROM access_requests
            WHERE workspace_id = $1
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC, id
            "#
        ))
        .bind(workspace_id.as_uuid())
        .bind(status.map(|value| value.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list access requests: {error}")))?;

        rows.into_iter().map(AccessRequest::try_from).collect()
    }

    async fn exists_pending_access_request(
        &self,
        requester_id: UserId,
        grant_type: GrantType,
        target_id: TargetId,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM access_requests
                WHERE requester_id = $1
                  AND grant_type = $2
                  AND target_id = $3
                  AND status = 'pending'
            )
            "#,
        )
        .bind(requester_id.as_uuid())
        .bind(grant_type.as_str())
        .bind(target_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to check pending access request: {error}"))
        })
    }

    async fn update_access_request_status(
        &self,
        access_request_id: AccessRequestId,
        decision: &AccessRequestDecision,
        processed_by: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AccessRequest>> {
        sqlx::query_as::<_, AccessRequestRow>(concat!(
            r#"
            UPDATE access_requests
            SET status = $2,
                processed_by = $3,
                processed_at = $4,
                denial_reason = $5
            WHERE id = $1 AND status = 'pending'
            RETURNING
            "#,
            access_request_columns!()
        ))
        .bind(access_request_id.as_uuid())
        .bind(decision.target_status().as_str())
        .bind(processed_by.as_uuid())
        .bind(now)
        .bind(decision.denial_reason())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record access request decision: {error}"))
        })?
        .map(AccessRequest::try_from)
        .transpose()
    }
}
