use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use grantflow_core::{Actor, AppError, AppResult, UserId, WorkspaceId};
use grantflow_domain::{
    BulkInvitationResult, BulkInviteItem, BulkItemOutcome, EmailAddress, GrantRole, GrantType,
    InvitationPermissions, NewInvitation, PermissionLevel, TargetId,
};

use super::InvitationService;

/// Input for one bulk invitation run.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkInviteInput {
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Scope being shared.
    pub grant_type: GrantType,
    /// Target being shared.
    pub target_id: TargetId,
    /// Role granted to every invitee.
    pub role: GrantRole,
    /// Explicit permission; defaults from the role.
    pub permission: Option<PermissionLevel>,
    /// Granular flags stored with every created invitation.
    pub permissions: Option<InvitationPermissions>,
    /// Inviting user.
    pub invited_by: UserId,
    /// Raw emails in the order they should be processed.
    pub emails: Vec<String>,
    /// Optional personal note.
    pub message: Option<String>,
    /// Absolute expiry; policy default when absent.
    pub expires_at: Option<DateTime<Utc>>,
    /// Skip emails that already hold a pending invitation for the target.
    pub skip_existing_pending: bool,
}

/// Aggregate summary plus one entry per input email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkInviteReport {
    /// Finalised summary.
    pub result: BulkInvitationResult,
    /// Per-item outcomes in input order.
    pub items: Vec<BulkInviteItem>,
}

impl InvitationService {
    /// Creates one invitation per email, strictly sequentially.
    ///
    /// A failing item never aborts or rolls back the others; the report
    /// always carries the full per-item outcome list.
    pub async fn run_bulk_invite(
        &self,
        actor: &Actor,
        input: BulkInviteInput,
    ) -> AppResult<BulkInviteReport> {
        if input.emails.is_empty() {
            return Err(AppError::Validation(
                "bulk invitation requires at least one email".to_owned(),
            ));
        }

        if input.emails.len() > self.policy.max_bulk_emails {
            return Err(AppError::Validation(format!(
                "bulk invitation accepts at most {} emails",
                self.policy.max_bulk_emails
            )));
        }

        input.grant_type.ensure_role_allowed(input.role)?;

        let total_count = u32::try_from(input.emails.len()).map_err(|error| {
            AppError::Validation(format!("too many emails in bulk invitation: {error}"))
        })?;
        let mut result = BulkInvitationResult::start(
            input.workspace_id,
            input.invited_by,
            input.grant_type,
            input.target_id,
            input.role,
            total_count,
            Utc::now(),
        );
        self.bulk_results.create_bulk_result(result.clone()).await?;

        let mut seen: HashSet<EmailAddress> = HashSet::new();
        let mut items = Vec::with_capacity(input.emails.len());

        for raw_email in &input.emails {
            let outcome = self.bulk_item(actor, &input, raw_email, &mut seen).await?;
            if let BulkItemOutcome::Failed { error } = &outcome {
                warn!(
                    bulk_invitation_id = %result.id,
                    email = raw_email.as_str(),
                    error = error.as_str(),
                    "bulk invitation item failed"
                );
            }

            items.push(BulkInviteItem {
                email: raw_email.clone(),
                outcome,
            });
        }

        result.finalize(&items, Utc::now());
        self.bulk_results.complete_bulk_result(&result).await?;

        info!(
            bulk_invitation_id = %result.id,
            workspace_id = %result.workspace_id,
            status = result.status.as_str(),
            success_count = result.success_count,
            failed_count = result.failed_count,
            skipped_count = result.skipped_count,
            "bulk invitation completed"
        );

        Ok(BulkInviteReport { result, items })
    }

    /// Storage failures on the duplicate lookup abort the run; creation failures do not.
    async fn bulk_item(
        &self,
        actor: &Actor,
        input: &BulkInviteInput,
        raw_email: &str,
        seen: &mut HashSet<EmailAddress>,
    ) -> AppResult<BulkItemOutcome> {
        let email = match EmailAddress::new(raw_email) {
            Ok(email) => email,
            Err(error) => {
                return Ok(BulkItemOutcome::Failed {
                    error: error.to_string(),
                });
            }
        };

        if !seen.insert(email.clone()) {
            return Ok(BulkItemOutcome::Skipped {
                reason: "duplicate email in request".to_owned(),
            });
        }

        if input.skip_existing_pending
            && self
                .invitations
                .exists_pending_for_email(input.grant_type, input.target_id, &email)
                .await?
        {
            return Ok(BulkItemOutcome::Skipped {
                reason: "pending invitation already exists".to_owned(),
            });
        }

        let mut new_invitation = NewInvitation::new(
            input.workspace_id,
            email.as_str(),
            input.grant_type,
            input.target_id,
            input.role,
            input.invited_by,
        );
        new_invitation.permission = input.permission;
        new_invitation.message = input.message.clone();
        new_invitation.expires_at = input.expires_at;

        Ok(
            match self
                .create_invitation(actor, new_invitation, input.permissions.clone())
                .await
            {
                Ok(invitation) => BulkItemOutcome::Created {
                    invitation_id: invitation.id,
                },
                Err(error) => BulkItemOutcome::Failed {
                    error: error.to_string(),
                },
            },
        )
    }
}
