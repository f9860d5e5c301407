use async_trait::async_trait;
use chrono::{DateTime, Utc};

use grantflow_application::AccessRequestRepository;
use grantflow_core::{AppError, AppResult, UserId, WorkspaceId};
use grantflow_domain::{
    AccessRequest, AccessRequestDecision, AccessRequestId, AccessRequestStatus, GrantType,
    TargetId,
};

use super::InMemoryInvitationStore;

#[async_trait]
impl AccessRequestRepository for InMemoryInvitationStore {
    async fn create_access_request(&self, request: AccessRequest) -> AppResult<()> {
        let mut requests = self.access_requests.write().await;

        if requests.contains_key(&request.id) {
            return Err(AppError::Conflict(format!(
                "access request '{}' already exists",
                request.id
            )));
        }

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
            .read()
            .await
            .get(&access_request_id)
            .cloned())
    }

    async fn list_access_requests(
        &self,
        workspace_id: WorkspaceId,
        status: Option<AccessRequestStatus>,
    ) -> AppResult<Vec<AccessRequest>> {
        let mut values: Vec<AccessRequest> = self
            .access_requests
            .read()
            .await
            .values()
            .filter(|request| {
                request.workspace_id == workspace_id
                    && status.is_none_or(|status| request.status == status)
            })
            .cloned()
            .collect();
        values.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        Ok(values)
    }

    async fn exists_pending_access_request(
        &self,
        requester_id: UserId,
        grant_type: GrantType,
        target_id: TargetId,
    ) -> AppResult<bool> {
        Ok(self.access_requests.read().await.values().any(|request| {
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
        let mut requests = self.access_requests.write().await;
        let Some(request) = requests
            .get_mut(&access_request_id)
            .filter(|request| request.status == AccessRequestStatus::Pending)
        else {
            return Ok(None);
        };

        request.apply_decision(decision, processed_by, now)?;
        Ok(Some(request.clone()))
    }
}
