use grantflow_core::{UserId, WorkspaceId};
use grantflow_domain::{EmailAddress, GrantType, Invitation, InvitationStatus, TargetId};

/// Filter for invitation listing and counting. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvitationFilter {
    /// Owning workspace.
    pub workspace_id: Option<WorkspaceId>,
    /// Scope and target.
    pub target: Option<(GrantType, TargetId)>,
    /// Lifecycle status.
    pub status: Option<InvitationStatus>,
    /// Invitee email.
    pub email: Option<EmailAddress>,
    /// Accepting user.
    pub invitee_user_id: Option<UserId>,
    /// Inviting user.
    pub invited_by: Option<UserId>,
    /// Maximum rows returned; `None` returns every match.
    pub limit: Option<usize>,
    /// Number of rows skipped.
    pub offset: usize,
}

impl InvitationFilter {
    /// Matches every invitation in a workspace.
    #[must_use]
    pub fn for_workspace(workspace_id: WorkspaceId) -> Self {
        Self {
            workspace_id: Some(workspace_id),
            ..Self::default()
        }
    }

    /// Matches every invitation for one target.
    #[must_use]
    pub fn for_target(grant_type: GrantType, target_id: TargetId) -> Self {
        Self {
            target: Some((grant_type, target_id)),
            ..Self::default()
        }
    }

    /// Restricts the filter to one status.
    #[must_use]
    pub fn with_status(mut self, status: InvitationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns whether an invitation satisfies every set criterion. Pagination is ignored.
    #[must_use]
    pub fn matches(&self, invitation: &Invitation) -> bool {
        self.workspace_id
            .is_none_or(|workspace_id| invitation.workspace_id == workspace_id)
            && self.target.is_none_or(|(grant_type, target_id)| {
                invitation.grant_type == grant_type && invitation.target_id == target_id
            })
            && self.status.is_none_or(|status| invitation.status == status)
            && self
                .email
                .as_ref()
                .is_none_or(|email| &invitation.email == email)
            && self
                .invitee_user_id
                .is_none_or(|user_id| invitation.invitee_user_id == Some(user_id))
            && self
                .invited_by
                .is_none_or(|user_id| invitation.invited_by == user_id)
    }
}

/// Population an aggregate is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    /// Every invitation in a workspace.
    Workspace(WorkspaceId),
    /// Every invitation for one target.
    Target {
        /// Scope being shared.
        grant_type: GrantType,
        /// Target being shared.
        target_id: TargetId,
    },
}

impl StatsScope {
    /// Returns the unpaginated filter selecting this population.
    #[must_use]
    pub fn filter(&self) -> InvitationFilter {
        match *self {
            Self::Workspace(workspace_id) => InvitationFilter::for_workspace(workspace_id),
            Self::Target {
                grant_type,
                target_id,
            } => InvitationFilter::for_target(grant_type, target_id),
        }
    }
}
