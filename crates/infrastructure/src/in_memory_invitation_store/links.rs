use async_trait::async_trait;
use chrono::{DateTime, Utc};

use grantflow_application::InvitationLinkRepository;
use grantflow_core::{AppError, AppResult, WorkspaceId};
use grantflow_domain::{InvitationLinkSettings, LinkSettingsId};

use super::InMemoryInvitationStore;

#[async_trait]
impl InvitationLinkRepository for InMemoryInvitationStore {
    async fn create_link_settings(&self, settings: InvitationLinkSettings) -> AppResult<()> {
        let mut links = self.links.write().await;

        if links
            .values()
            .any(|existing| existing.link_token == settings.link_token)
        {
            return Err(AppError::Conflict(
                "invitation link token is already in use".to_owned(),
            ));
        }

        links.insert(settings.id, settings);
        Ok(())
    }

    async fn find_link_settings(
        &self,
        link_settings_id: LinkSettingsId,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        Ok(self.links.read().await.get(&link_settings_id).cloned())
    }

    async fn find_link_settings_by_token(
        &self,
        link_token: &str,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        Ok(self
            .links
            .read()
            .await
            .values()
            .find(|settings| settings.link_token == link_token)
            .cloned())
    }

    async fn list_link_settings(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<InvitationLinkSettings>> {
        let mut values: Vec<InvitationLinkSettings> = self
            .links
            .read()
            .await
            .values()
            .filter(|settings| settings.workspace_id == workspace_id)
            .cloned()
            .collect();
        values.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        Ok(values)
    }

    async fn set_link_active(
        &self,
        link_settings_id: LinkSettingsId,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Option<InvitationLinkSettings>> {
        Ok(self
            .links
            .write()
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
        let mut links = self.links.write().await;

        Ok(links
            .values_mut()
            .find(|settings| settings.link_token == link_token)
            .filter(|settings| settings.is_valid(now))
            .map(|settings| {
                settings.use_count = settings.use_count.saturating_add(1);
                settings.updated_at = now;
                settings.clone()
            }))
    }

    async fn release_link_settings_use(
        &self,
        link_token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut links = self.links.write().await;

        if let Some(settings) = links
            .values_mut()
            .find(|settings| settings.link_token == link_token)
        {
            settings.use_count = settings.use_count.saturating_sub(1);
            settings.updated_at = now;
        }

        Ok(())
    }
}
