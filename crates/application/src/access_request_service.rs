use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use grantflow_core::{AppError, AppResult, NonEmptyString, UserId, WorkspaceId};
use grantflow_domain::{
    AccessRequest, AccessRequestDecision, AccessRequestId, AccessRequestStatus, NewAccessRequest,
};

use crate::invitation_ports::AccessRequestRepository;


/// Application service for self-service access requests.
///
/// Approval only records the decision; granting the resulting access is the
/// caller's concern.
#[derive(Clone)]
pub struct AccessRequestService {
    repository: Arc<dyn AccessRequestRepository>,
}

impl AccessRequestService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(repository: Arc<dyn AccessRequestRepository>) -> Self {
        Self { repository }
    }

    /// Files a pending request; one pending request per requester and target.
    pub async fn request_access(&self, input: NewAccessRequest) -> AppResult<AccessRequest> {
        let request = AccessRequest::create(input, Utc::now())?;

        if self
            .repository
            .exists_pending_access_request(
                request.requester_id,
                request.grant_type,
                request.target_id,
            )
            .await?
        {
            return Err(AppError::Conflict(format!(
                "an access request for {} '{}' is already pending",
                request.grant_type.as_str(),
                request.target_id
            )));
        }

        self.repository
            .create_access_request(request.clone())
            .await?;

        info!(
            access_request_id = %request.id,
            workspace_id = %request.workspace_id,
            grant_type = request.grant_type.as_str(),
            "access request filed"
        );

        Ok(request)
    }

    /// Approves a pending request.
    pub async fn approve(
        &self,
        access_request_id: AccessRequestId,
        approver: UserId,
    ) -> AppResult<AccessRequest> {
        self.process(access_request_id, AccessRequestDecision::Approve, approver)
            .await
    }

    /// Denies a pending request with a reason.
    pub async fn deny(
        &self,
        access_request_id: AccessRequestId,
        approver: UserId,
        reason: &str,
    ) -> AppResult<AccessRequest> {
        let decision = AccessRequestDecision::Deny {
            reason: NonEmptyString::new(reason.trim())?,
        };
        self.process(access_request_id, decision, approver).await
    }

    /// Finds an access request by identifier.
    pub async fn find(
        &self,
        access_request_id: AccessRequestId,
    ) -> AppResult<Option<AccessRequest>> {
        self.repository.find_access_request(access_request_id).await
    }

    /// Lists requests in a workspace, optionally by status.
    pub async fn list(
        &self,
        workspace_id: WorkspaceId,
        status: Option<AccessRequestStatus>,
    ) -> AppResult<Vec<AccessRequest>> {
        self.repository
            .list_access_requests(workspace_id, status)
            .await
    }

    async fn process(
        &self,
        access_request_id: AccessRequestId,
        decision: AccessRequestDecision,
        approver: UserId,
    ) -> AppResult<AccessRequest> {
        let Some(request) = self
            .repository
            .update_access_request_status(access_request_id, &decision, approver, Utc::now())
            .await?
        else {
            return Err(
                match self.repository.find_access_request(access_request_id).await? {
                    Some(current) => AppError::AlreadyResolved(format!(
                        "access request '{access_request_id}' is already {}",
                        current.status.as_str()
                    )),
                    None => AppError::NotFound(format!(
                        "access request '{access_request_id}' not found"
                    )),
                },
            );
        };

        info!(
            access_request_id = %request.id,
            status = request.status.as_str(),
            processed_by = %approver,
            "access request processed"
        );

        Ok(request)
    }
}
