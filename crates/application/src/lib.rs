//! Application services and ports.

#![forbid(unsafe_code)]

mod access_request_service;
mod invitation_policy;
mod invitation_ports;
mod invitation_service;
mod link_service;
mod token;

#[cfg(test)]
mod test_support;

pub use access_request_service::AccessRequestService;
pub use invitation_policy::InvitationPolicy;
pub use invitation_ports::{
    AccessRequestRepository, BulkInvitationRepository, InvitationActivityRepository,
    InvitationEvent, InvitationEventKind, InvitationFilter, InvitationLinkRepository,
    InvitationNotifier, InvitationRepository, StatsScope,
};
pub use invitation_service::{
    BulkInviteInput, BulkInviteReport, InvitationService, InvitationServicePorts, SweepReport,
};
pub use link_service::{InvitationLinkService, JoinOutcome};
