use serde::{Deserialize, Serialize};

use crate::{Invitation, InvitationStatus};

/// Aggregate outcome figures for a population of invitations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvitationStats {
    /// Population size.
    pub total: u64,
    /// Invitations still pending.
    pub pending: u64,
    /// Accepted invitations.
    pub accepted: u64,
    /// Declined invitations.
    pub declined: u64,
    /// Expired invitations.
    pub expired: u64,
    /// Cancelled invitations.
    pub cancelled: u64,
    /// Revoked invitations.
    pub revoked: u64,
    /// `accepted / (accepted + declined) * 100`, or 0 without responses.
    pub acceptance_rate: f64,
    /// Mean hours from creation to acceptance, or 0 without acceptances.
    pub avg_time_to_accept_hrs: f64,
}

impl InvitationStats {
    /// Aggregates a population of invitations.
    #[must_use]
    pub fn from_invitations<'a>(invitations: impl IntoIterator<Item = &'a Invitation>) -> Self {
        let mut stats = Self::default();
        let mut accept_seconds_total = 0_i64;
        let mut timed_acceptances = 0_u64;

        for invitation in invitations {
            stats.total += 1;
            match invitation.status {
                InvitationStatus::Pending => stats.pending += 1,
                InvitationStatus::Accepted => {
                    stats.accepted += 1;
                    if let Some(accepted_at) = invitation.accepted_at {
                        accept_seconds_total +=
                            (accepted_at - invitation.created_at).num_seconds();
                        timed_acceptances += 1;
                    }
                }
                InvitationStatus::Declined => stats.declined += 1,
                InvitationStatus::Expired => stats.expired += 1,
                InvitationStatus::Cancelled => stats.cancelled += 1,
                InvitationStatus::Revoked => stats.revoked += 1,
            }
        }

        let responded = stats.accepted + stats.declined;
        if responded > 0 {
            stats.acceptance_rate = stats.accepted as f64 / responded as f64 * 100.0;
        }

        if timed_acceptances > 0 {
            stats.avg_time_to_accept_hrs =
                accept_seconds_total as f64 / timed_acceptances as f64 / 3600.0;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use grantflow_core::{UserId, WorkspaceId};

    use super::*;
    use crate::{GrantRole, GrantType, InvitationTransition, NewInvitation, TargetId};

    fn invitation_with(transition: Option<InvitationTransition>, age: Duration) -> Invitation {
        let now = Utc::now();
        let mut invitation = Invitation::create(
            NewInvitation::new(
                WorkspaceId::new(),
                "someone@example.com",
                GrantType::Workspace,
                TargetId::new(),
                GrantRole::Member,
                UserId::new(),
            ),
            "token".to_owned(),
            now - age,
        )
        .unwrap_or_else(|_| unreachable!());

        if let Some(transition) = transition {
            let applied = invitation.apply_transition(transition, now);
            assert!(applied.is_ok());
        }

        invitation
    }

    #[test]
    fn empty_population_has_zero_rates() {
        let stats = InvitationStats::from_invitations(&Vec::<Invitation>::new());
        assert_eq!(stats.acceptance_rate, 0.0);
        assert_eq!(stats.avg_time_to_accept_hrs, 0.0);
    }

    #[test]
    fn pending_only_population_has_zero_acceptance_rate() {
        let population = vec![invitation_with(None, Duration::hours(1))];
        let stats = InvitationStats::from_invitations(&population);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.acceptance_rate, 0.0);
    }

    #[test]
    fn acceptance_rate_and_average_time() {
        let accept = || InvitationTransition::Accept {
            user_id: UserId::new(),
        };
        let population = vec![
            invitation_with(Some(accept()), Duration::hours(2)),
            invitation_with(Some(accept()), Duration::hours(4)),
            invitation_with(Some(accept()), Duration::hours(6)),
            invitation_with(Some(InvitationTransition::Decline), Duration::hours(1)),
            invitation_with(Some(InvitationTransition::Revoke), Duration::hours(1)),
        ];

        let stats = InvitationStats::from_invitations(&population);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.declined, 1);
        assert_eq!(stats.revoked, 1);
        assert_eq!(stats.acceptance_rate, 75.0);
        assert!((stats.avg_time_to_accept_hrs - 4.0).abs() < 0.01);
    }
}
