use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use grantflow_core::{Actor, AppError, AppResult};
use grantflow_domain::{ActivityAction, InvitationTransition};

use crate::invitation_ports::InvitationEventKind;

use super::InvitationService;

/// Counters for one scheduled sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Candidates returned by the selector.
    pub examined: usize,
    /// Candidates acted upon.
    pub processed: usize,
    /// Candidates resolved by someone else in the meantime; always zero for reminders.
    pub skipped: usize,
}

impl InvitationService {
    /// Marks overdue pending invitations expired.
    ///
    /// Items that leave `pending` concurrently are counted as skipped.
    pub async fn expire_overdue(&self, limit: usize) -> AppResult<SweepReport> {
        let overdue = self.invitations.find_expired(Utc::now(), limit).await?;
        let actor = Actor::system();
        let mut report = SweepReport {
            examined: overdue.len(),
            ..SweepReport::default()
        };

        for invitation in overdue {
            match self
                .apply_transition(
                    &actor,
                    invitation.id,
                    InvitationTransition::Expire,
                    Some("validity window elapsed".to_owned()),
                )
                .await
            {
                Ok(_) => report.processed += 1,
                Err(AppError::AlreadyResolved(_) | AppError::NotFound(_)) => report.skipped += 1,
                Err(error) => return Err(error),
            }
        }

        info!(
            examined = report.examined,
            expired = report.processed,
            skipped = report.skipped,
            "expiry sweep finished"
        );

        Ok(report)
    }

    /// Publishes reminders for invitations due one.
    ///
    /// The reminder timestamp update is best effort; a failure there is logged
    /// and the invitation may be selected again on the next sweep.
    pub async fn send_reminders(&self, limit: usize) -> AppResult<SweepReport> {
        let now = Utc::now();
        let due = self
            .invitations
            .find_pending_for_reminder(
                self.policy.reminder_min_age,
                self.policy.max_reminders,
                now,
                limit,
            )
            .await?;
        let actor = Actor::system();
        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };

        for invitation in due {
            self.publish(InvitationEventKind::Reminder, &invitation)
                .await;

            if let Err(error) = self
                .invitations
                .update_reminder_sent(invitation.id, Utc::now())
                .await
            {
                warn!(
                    invitation_id = %invitation.id,
                    error = %error,
                    "failed to record reminder timestamp"
                );
            }

            self.record_activity(
                &actor,
                invitation.id,
                ActivityAction::ReminderSent,
                Some(format!("reminder {}", invitation.reminder_count + 1)),
            )
            .await?;
            report.processed += 1;
        }

        info!(
            examined = report.examined,
            reminded = report.processed,
            skipped = report.skipped,
            "reminder sweep finished"
        );

        Ok(report)
    }
}
