//! Infrastructure adapters for invitation application ports.

#![forbid(unsafe_code)]

mod console_invitation_notifier;
mod in_memory_invitation_store;
mod postgres_invitation_store;

pub use console_invitation_notifier::ConsoleInvitationNotifier;
pub use in_memory_invitation_store::InMemoryInvitationStore;
pub use postgres_invitation_store::PostgresInvitationStore;
