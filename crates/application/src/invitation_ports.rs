mod events;
mod queries;
mod repositories;

pub use events::{InvitationEvent, InvitationEventKind, InvitationNotifier};
pub use queries::{InvitationFilter, StatsScope};
pub use repositories::{
    AccessRequestRepository, BulkInvitationRepository, InvitationActivityRepository,
    InvitationLinkRepository, InvitationRepository,
};
