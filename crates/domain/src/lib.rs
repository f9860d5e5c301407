//! Domain entities and invariants for invitations and access grants.

#![forbid(unsafe_code)]

mod access_request;
mod activity;
mod bulk;
mod email;
mod grant;
mod ids;
mod invitation;
mod link;
mod stats;

pub use access_request::{
    AccessRequest, AccessRequestDecision, AccessRequestStatus, NewAccessRequest,
};
pub use activity::{ActivityAction, InvitationActivity};
pub use bulk::{BulkInvitationResult, BulkInvitationStatus, BulkInviteItem, BulkItemOutcome};
pub use email::{EmailAddress, email_domain};
pub use grant::{
    GrantRole, GrantType, InvitationPermissions, PermissionLevel, valid_roles_for_type,
};
pub use ids::{
    AccessRequestId, ActivityId, BulkInvitationId, InvitationId, LinkSettingsId, TargetId,
};
pub use invitation::{
    Invitation, InvitationMethod, InvitationStatus, InvitationTransition, NewInvitation,
};
pub use link::{DomainList, InvitationLinkSettings, NewLinkSettings};
pub use stats::InvitationStats;
