use super::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use grantflow_application::InvitationLinkRepository;
use grantflow_core::WorkspaceId;
use grantflow_domain::{InvitationLinkSettings, LinkSettingsId};

use super::rows::{LinkSettingsRow, link_settings_columns};

#[async_trait]
impl InvitationLinkRepository for PostgresInvitationStore {
    async fn create_link_settings(&self, settings: InvitationLinkSettings) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invitation_link_settings (
                id, workspace_id, link_token, grant_type, target_id, default_role,
                default_permission, is_active, requires_approval, allowed_domains,
                blocked_domains, max_uses, use_count, expires_at, created_by, created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(settings.id.as_uuid())
        .bind(settings.workspace_id.as_uuid())
        .bind(settings.link_token.as_str())
        .bind(settings.grant_type.as_str())
        .bind(settings.target_id.as_uuid())
        .bind(settings.default_role.as_str())
        .bind(settings.default_permission.as_str())
        .bind(settings.is_active)
        .bind(settings.requires_approval)
        .bind(settings.allowed_domains.as_slice().to_vec())
        .bind(settings.blocked_domains.as_slice().to_vec())
        .bind(
            settings
                .max_uses
                .map(|value| to_db_count(value, "max_uses"))
                .transpose()?,
        )
        .bind(to_db_count(settings.use_count, "use_count")?)
        .bind(settings.expires_at)
        .bind(settings.created_by.as_uuid())
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_violation(
                error,
                "invitation link token is already in use",
                "create invitation link",
            )
        })?;

        Ok(())
    }

    async fn find_link_settings(
        &self,
        link_settings_id: LinkSettingsId,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        sqlx::query_as::<_, LinkSettingsRow>(concat!(
            "SELECT ",
            link_settings_columns!(),
            " FROM invitation_link_settings WHERE id = $1"
        ))
        .bind(link_settings_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find invitation link: {error}")))?
        .map(InvitationLinkSettings::try_from)
        .transpose()
    }

    async fn find_link_settings_by_token(
        &self,
        link_token: &str,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        sqlx::query_as::<_, LinkSettingsRow>(concat!(
            "SELECT ",
            link_settings_columns!(),
            " FROM invitation_link_settings WHERE link_token = $1"
        ))
        .bind(link_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find invitation link by token: {error}"))
        })?
        .map(InvitationLinkSettings::try_from)
        .transpose()
    }

    async fn list_link_settings(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<InvitationLinkSettings>> {
        let rows = sqlx::query_as::<_, LinkSettingsRow>(concat!(
            "SELECT ",
            link_settings_columns!(),
            r#"
            FROM invitation_link_settings
            WHERE workspace_id = $1
            ORDER BY created_at DESC, id
            "#
        ))
        .bind(workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list invitation links: {error}"))
        })?;

        rows.into_iter()
            .map(InvitationLinkSettings::try_from)
            .collect()
    }

    async fn set_link_active(
        &self,
        link_settings_id: LinkSettingsId,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        sqlx::query_as::<_, LinkSettingsRow>(concat!(
            r#"
            UPDATE invitation_link_settings
            SET is_active = $2, updated_at = $3
            WHERE id = $1
            RETURNING
            "#,
            link_settings_columns!()
        ))
        .bind(link_settings_id.as_uuid())
        .bind(is_active)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update invitation link: {error}"))
        })?
        .map(InvitationLinkSettings::try_from)
        .transpose()
    }

    async fn increment_link_settings_use_count(
        &self,
        link_token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        sqlx::query_as::<_, LinkSettingsRow>(concat!(
            r#"
            UPDATE invitation_link_settings
            SET use_count = use_count + 1, updated_at = $2
            WHERE link_token = $1
              AND is_active
              AND (expires_at IS NULL OR expires_at >= $2)
              AND (max_uses IS NULL OR use_count < max_uses)
            RETURNING
            "#,
            link_settings_columns!()
        ))
        .bind(link_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to consume invitation link use: {error}"))
        })?
        .map(InvitationLinkSettings::try_from)
        .transpose()
    }

    async fn release_link_settings_use(
        &self,
        link_token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE invitation_link_settings
            SET use_count = use_count - 1, updated_at = $2
            WHERE link_token = $1 AND use_count > 0
            "#,
        )
        .bind(link_token)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to release invitation link use: {error}"))
        })?;

        Ok(())
    }
}
