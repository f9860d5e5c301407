//! Grant scopes, roles, and the permissions a role implies.

use std::str::FromStr;

use grantflow_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hierarchical scope an invitation grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Whole workspace.
    Workspace,
    /// One space inside a workspace.
    Space,
    /// One folder inside a space.
    Folder,
    /// One project.
    Project,
    /// One team.
    Team,
    /// One task.
    Task,
}

impl GrantType {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Space => "space",
            Self::Folder => "folder",
            Self::Project => "project",
            Self::Team => "team",
            Self::Task => "task",
        }
    }

    /// Returns the roles that may be granted at this scope.
    #[must_use]
    pub fn valid_roles(&self) -> &'static [GrantRole] {
        match self {
            Self::Workspace => &[
                GrantRole::Admin,
                GrantRole::Member,
                GrantRole::LimitedMember,
                GrantRole::Guest,
            ],
            Self::Space | Self::Folder | Self::Project => {
                &[GrantRole::Member, GrantRole::LimitedMember, GrantRole::Guest]
            }
            Self::Team => &[GrantRole::Member],
            Self::Task => &[GrantRole::Guest, GrantRole::LimitedMember],
        }
    }

    /// Returns whether `role` may be granted at this scope.
    #[must_use]
    pub fn allows_role(&self, role: GrantRole) -> bool {
        self.valid_roles().contains(&role)
    }

    /// Rejects roles outside [`GrantType::valid_roles`].
    pub fn ensure_role_allowed(&self, role: GrantRole) -> AppResult<()> {
        if self.allows_role(role) {
            return Ok(());
        }

        Err(AppError::InvalidRoleForType {
            role: role.as_str().to_owned(),
            grant_type: self.as_str().to_owned(),
        })
    }
}

impl FromStr for GrantType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "workspace" => Ok(Self::Workspace),
            "space" => Ok(Self::Space),
            "folder" => Ok(Self::Folder),
            "project" => Ok(Self::Project),
            "team" => Ok(Self::Team),
            "task" => Ok(Self::Task),
            _ => Err(AppError::Validation(format!(
                "unknown invitation type '{value}'"
            ))),
        }
    }
}

/// Valid roles for a raw scope value. Unknown scopes only allow `member`.
#[must_use]
pub fn valid_roles_for_type(value: &str) -> &'static [GrantRole] {
    GrantType::from_str(value)
        .map(|grant_type| grant_type.valid_roles())
        .unwrap_or(&[GrantRole::Member])
}

/// Role granted by an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantRole {
    /// Owner of the target.
    Owner,
    /// Administrator.
    Admin,
    /// Regular member.
    Member,
    /// Member with reduced capabilities.
    LimitedMember,
    /// External guest.
    Guest,
}

impl GrantRole {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::LimitedMember => "limited_member",
            Self::Guest => "guest",
        }
    }
}

impl FromStr for GrantRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "limited_member" => Ok(Self::LimitedMember),
            "guest" => Ok(Self::Guest),
            _ => Err(AppError::Validation(format!("unknown role '{value}'"))),
        }
    }
}

/// Coarse access tier attached to a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Read-only access.
    ViewOnly,
    /// Read access plus comments.
    Comment,
    /// Content editing.
    Edit,
    /// Editing plus administration of the target.
    FullEdit,
}

impl PermissionLevel {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewOnly => "view_only",
            Self::Comment => "comment",
            Self::Edit => "edit",
            Self::FullEdit => "full_edit",
        }
    }

    /// Returns the default level a role receives when none is given.
    #[must_use]
    pub fn default_for_role(role: GrantRole) -> Self {
        match role {
            GrantRole::Owner | GrantRole::Admin => Self::FullEdit,
            GrantRole::Member => Self::Edit,
            GrantRole::LimitedMember => Self::Comment,
            GrantRole::Guest => Self::ViewOnly,
        }
    }

    /// Like [`PermissionLevel::default_for_role`] for a raw role value.
    /// Unrecognised roles get `view_only`.
    #[must_use]
    pub fn default_for_role_value(value: &str) -> Self {
        GrantRole::from_str(value)
            .map(Self::default_for_role)
            .unwrap_or(Self::ViewOnly)
    }
}

impl FromStr for PermissionLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "view_only" => Ok(Self::ViewOnly),
            "comment" => Ok(Self::Comment),
            "edit" => Ok(Self::Edit),
            "full_edit" => Ok(Self::FullEdit),
            _ => Err(AppError::Validation(format!(
                "unknown permission level '{value}'"
            ))),
        }
    }
}

/// Granular capability flags attached to one invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationPermissions {
    /// Edit existing tasks.
    pub can_edit_tasks: bool,
    /// Create tasks.
    pub can_create_tasks: bool,
    /// Delete tasks.
    pub can_delete_tasks: bool,
    /// Comment on tasks.
    pub can_comment: bool,
    /// Create subtasks.
    pub can_create_subtasks: bool,
    /// Assign tasks to people.
    pub can_assign: bool,
    /// See tracked time.
    pub can_see_time: bool,
    /// Track time.
    pub can_track_time: bool,
    /// Add tags.
    pub can_add_tags: bool,
    /// Create views.
    pub can_create_views: bool,
    /// Invite other people.
    pub can_invite_others: bool,
    /// Manage sprints.
    pub can_manage_sprints: bool,
    /// View reports.
    pub can_view_reports: bool,
    /// Export data.
    pub can_export: bool,
    /// Pass-through custom permission payload.
    pub custom_permissions: Option<Value>,
}

impl InvitationPermissions {
    /// Derives capability flags from a coarse permission level.
    #[must_use]
    pub fn for_level(level: PermissionLevel) -> Self {
        let full = level == PermissionLevel::FullEdit;
        let edit = level >= PermissionLevel::Edit;
        let comment = level >= PermissionLevel::Comment;

        Self {
            can_edit_tasks: edit,
            can_create_tasks: edit,
            can_delete_tasks: edit,
            can_comment: comment,
            can_create_subtasks: edit,
            can_assign: edit,
            can_see_time: true,
            can_track_time: edit,
            can_add_tags: edit,
            can_create_views: edit,
            can_invite_others: full,
            can_manage_sprints: full,
            can_view_reports: edit,
            can_export: edit,
            custom_permissions: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn default_permission_follows_role() {
        assert_eq!(
            PermissionLevel::default_for_role(GrantRole::Owner),
            PermissionLevel::FullEdit
        );
        assert_eq!(
            PermissionLevel::default_for_role(GrantRole::Admin),
            PermissionLevel::FullEdit
        );
        assert_eq!(
            PermissionLevel::default_for_role(GrantRole::Member),
            PermissionLevel::Edit
        );
        assert_eq!(
            PermissionLevel::default_for_role(GrantRole::LimitedMember),
            PermissionLevel::Comment
        );
        assert_eq!(
            PermissionLevel::default_for_role(GrantRole::Guest),
            PermissionLevel::ViewOnly
        );
    }

    #[test]
    fn unknown_role_value_falls_back_to_view_only() {
        assert_eq!(
            PermissionLevel::default_for_role_value("superuser"),
            PermissionLevel::ViewOnly
        );
        assert_eq!(
            PermissionLevel::default_for_role_value("member"),
            PermissionLevel::Edit
        );
    }

    #[test]
    fn scopes_restrict_roles() {
        assert!(GrantType::Workspace.allows_role(GrantRole::Admin));
        assert!(!GrantType::Project.allows_role(GrantRole::Admin));
        assert_eq!(GrantType::Team.valid_roles(), &[GrantRole::Member]);
        assert!(GrantType::Task.allows_role(GrantRole::Guest));
        assert!(!GrantType::Task.allows_role(GrantRole::Member));
        assert!(!GrantType::Workspace.allows_role(GrantRole::Owner));
    }

    #[test]
    fn unknown_scope_only_allows_member() {
        assert_eq!(valid_roles_for_type("board"), &[GrantRole::Member]);
        assert_eq!(valid_roles_for_type("team"), &[GrantRole::Member]);
    }

    #[test]
    fn disallowed_role_reports_invalid_role_for_type() {
        let result = GrantType::Team.ensure_role_allowed(GrantRole::Guest);
        assert!(matches!(
            result,
            Err(AppError::InvalidRoleForType { ref role, ref grant_type })
                if role == "guest" && grant_type == "team"
        ));
    }

    #[test]
    fn capability_flags_follow_level() {
        let view = InvitationPermissions::for_level(PermissionLevel::ViewOnly);
        assert!(!view.can_comment);
        assert!(!view.can_edit_tasks);
        assert!(view.can_see_time);

        let comment = InvitationPermissions::for_level(PermissionLevel::Comment);
        assert!(comment.can_comment);
        assert!(!comment.can_create_tasks);

        let edit = InvitationPermissions::for_level(PermissionLevel::Edit);
        assert!(edit.can_delete_tasks);
        assert!(!edit.can_invite_others);

        let full = InvitationPermissions::for_level(PermissionLevel::FullEdit);
        assert!(full.can_invite_others);
        assert!(full.can_manage_sprints);
    }

    proptest! {
        #[test]
        fn default_permission_is_total(value in ".{0,24}") {
            let level = PermissionLevel::default_for_role_value(value.as_str());
            if GrantRole::from_str(value.as_str()).is_err() {
                prop_assert_eq!(level, PermissionLevel::ViewOnly);
            }
        }

        #[test]
        fn valid_roles_never_empty(value in "[a-z_]{0,16}") {
            prop_assert!(!valid_roles_for_type(value.as_str()).is_empty());
        }
    }
}
