//! In-memory invitation store for tests and single-process deployments.
//!
//! Every conditional write runs under one write guard, so status transitions
//! and use-count increments behave like the single-row conditional updates of
//! the PostgreSQL adapter.

use std::collections::HashMap;

use grantflow_domain::{
    AccessRequest, AccessRequestId, BulkInvitationId, BulkInvitationResult, Invitation,
    InvitationActivity, InvitationId, InvitationLinkSettings, InvitationPermissions,
    LinkSettingsId,
};
use tokio::sync::RwLock;

mod access_requests;
mod invitations;
mod links;
mod records;


/// In-memory implementation of every invitation repository port.
#[derive(Debug, Default)]
pub struct InMemoryInvitationStore {
    invitations: RwLock<HashMap<InvitationId, Invitation>>,
    permissions: RwLock<HashMap<InvitationId, InvitationPermissions>>,
    links: RwLock<HashMap<LinkSettingsId, InvitationLinkSettings>>,
    access_requests: RwLock<HashMap<AccessRequestId, AccessRequest>>,
    bulk_results: RwLock<HashMap<BulkInvitationId, BulkInvitationResult>>,
    activity: RwLock<Vec<InvitationActivity>>,
}

impl InMemoryInvitationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first, ties broken by identifier for a stable order.
fn newest_first(left: &Invitation, right: &Invitation) -> std::cmp::Ordering {
    right
        .created_at
        .cmp(&left.created_at)
        .then_with(|| left.id.cmp(&right.id))
}
