use async_trait::async_trait;

use grantflow_application::{BulkInvitationRepository, InvitationActivityRepository};
use grantflow_core::{AppError, AppResult};
use grantflow_domain::{BulkInvitationId, BulkInvitationResult, InvitationActivity, InvitationId};

use super::InMemoryInvitationStore;

#[async_trait]
impl BulkInvitationRepository for InMemoryInvitationStore {
    async fn create_bulk_result(&self, result: BulkInvitationResult) -> AppResult<()> {
        self.bulk_results.write().await.insert(result.id, result);
        Ok(())
    }

    async fn complete_bulk_result(&self, result: &BulkInvitationResult) -> AppResult<()> {
        let mut results = self.bulk_results.write().await;
        let stored = results.get_mut(&result.id).ok_or_else(|| {
            AppError::NotFound(format!("bulk invitation '{}' not found", result.id))
        })?;

        if stored.completed_at.is_some() {
            return Err(AppError::AlreadyResolved(format!(
                "bulk invitation '{}' is already completed",
                result.id
            )));
        }

        *stored = result.clone();
        Ok(())
    }

    async fn find_bulk_result(
        &self,
        bulk_invitation_id: BulkInvitationId,
    ) -> AppResult<Option<BulkInvitationResult>> {
        Ok(self
            .bulk_results
            .read()
            .await
            .get(&bulk_invitation_id)
            .cloned())
    }
}

#[async_trait]
impl InvitationActivityRepository for InMemoryInvitationStore {
    async fn append_activity(&self, activity: InvitationActivity) -> AppResult<()> {
        self.activity.write().await.push(activity);
        Ok(())
    }

    async fn list_activity(
        &self,
        invitation_id: InvitationId,
    ) -> AppResult<Vec<InvitationActivity>> {
        Ok(self
            .activity
            .read()
            .await
            .iter()
            .filter(|activity| activity.invitation_id == invitation_id)
            .cloned()
            .collect())
    }
}
