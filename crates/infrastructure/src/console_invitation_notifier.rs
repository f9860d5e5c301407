//! Console invitation notifier for development. Logs events to tracing output.

use async_trait::async_trait;
use grantflow_application::{InvitationEvent, InvitationNotifier};
use grantflow_core::AppResult;
use tracing::info;

/// Development notifier that logs invitation events instead of delivering them.
#[derive(Clone)]
pub struct ConsoleInvitationNotifier {
    accept_url_base: String,
}

impl ConsoleInvitationNotifier {
    /// Creates a notifier that renders accept links under `accept_url_base`.
    #[must_use]
    pub fn new(accept_url_base: impl Into<String>) -> Self {
        Self {
            accept_url_base: accept_url_base.into().trim_end_matches('/').to_owned(),
        }
    }

    fn accept_url(&self, token: &str) -> String {
        format!("{}/{token}", self.accept_url_base)
    }
}

impl Default for ConsoleInvitationNotifier {
    fn default() -> Self {
        Self::new("http://localhost:3000/invitations")
    }
}

#[async_trait]
impl InvitationNotifier for ConsoleInvitationNotifier {
    async fn publish(&self, event: InvitationEvent) -> AppResult<()> {
        info!(
            kind = event.kind.as_str(),
            invitation_id = %event.invitation_id,
            workspace_id = %event.workspace_id,
            status = event.status.as_str(),
            "--- INVITATION EVENT (console) ---\nTo: {}\nScope: {} {}\nAccept: {}\n--- END EVENT ---",
            event.email,
            event.grant_type.as_str(),
            event.target_id,
            self.accept_url(event.token.as_str())
        );

        Ok(())
    }
}
