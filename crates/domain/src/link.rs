//! Reusable invitation links and their admission policy.

use chrono::{DateTime, Utc};
use grantflow_core::{AppError, AppResult, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};

use crate::email::email_domain;
use crate::{GrantRole, GrantType, LinkSettingsId, PermissionLevel, TargetId};

/// Normalised set of email domains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainList(Vec<String>);

impl DomainList {
    /// Lowercases, trims, drops blanks and duplicates.
    #[must_use]
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalised: Vec<String> = Vec::new();
        for domain in domains {
            let value = domain.as_ref().trim().trim_start_matches('@').to_lowercase();
            if !value.is_empty() && !normalised.contains(&value) {
                normalised.push(value);
            }
        }

        Self(normalised)
    }

    /// Case-insensitive membership check.
    #[must_use]
    pub fn contains(&self, domain: &str) -> bool {
        self.0
            .iter()
            .any(|listed| listed.eq_ignore_ascii_case(domain.trim()))
    }

    /// Returns whether the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the normalised entries.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        self.0.as_slice()
    }
}

/// Input for a new link policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLinkSettings {
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Scope being shared.
    pub grant_type: GrantType,
    /// Target being shared.
    pub target_id: TargetId,
    /// Role granted to link joiners.
    pub default_role: GrantRole,
    /// Permission granted to link joiners; defaults from the role.
    pub default_permission: Option<PermissionLevel>,
    /// Joiners file an access request instead of joining directly.
    pub requires_approval: bool,
    /// Permitted email domains; empty allows any.
    pub allowed_domains: Vec<String>,
    /// Refused email domains; always wins over the allow list.
    pub blocked_domains: Vec<String>,
    /// Use ceiling.
    pub max_uses: Option<u32>,
    /// Absolute expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creating user.
    pub created_by: UserId,
}

/// A standing, reusable grant policy addressed by its link token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationLinkSettings {
    /// Stable identifier.
    pub id: LinkSettingsId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Unique shared token.
    pub link_token: String,
    /// Scope being shared.
    pub grant_type: GrantType,
    /// Target being shared.
    pub target_id: TargetId,
    /// Role granted to joiners.
    pub default_role: GrantRole,
    /// Permission granted to joiners.
    pub default_permission: PermissionLevel,
    /// Whether the link admits anyone at all.
    pub is_active: bool,
    /// Joiners file an access request instead of joining directly.
    pub requires_approval: bool,
    /// Permitted email domains.
    pub allowed_domains: DomainList,
    /// Refused email domains.
    pub blocked_domains: DomainList,
    /// Use ceiling.
    pub max_uses: Option<u32>,
    /// Uses consumed.
    pub use_count: u32,
    /// Absolute expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creating user.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl InvitationLinkSettings {
    /// Builds an active link policy from validated input.
    pub fn create(
        input: NewLinkSettings,
        link_token: String,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        input.grant_type.ensure_role_allowed(input.default_role)?;

        if link_token.trim().is_empty() {
            return Err(AppError::Validation(
                "link token must not be empty".to_owned(),
            ));
        }

        if input.max_uses == Some(0) {
            return Err(AppError::Validation(
                "max_uses must be greater than zero".to_owned(),
            ));
        }

        if input.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AppError::Validation(
                "link expiry must be in the future".to_owned(),
            ));
        }

        Ok(Self {
            id: LinkSettingsId::new(),
            workspace_id: input.workspace_id,
            link_token,
            grant_type: input.grant_type,
            target_id: input.target_id,
            default_role: input.default_role,
            default_permission: input
                .default_permission
                .unwrap_or_else(|| PermissionLevel::default_for_role(input.default_role)),
            is_active: true,
            requires_approval: input.requires_approval,
            allowed_domains: DomainList::new(input.allowed_domains),
            blocked_domains: DomainList::new(input.blocked_domains),
            max_uses: input.max_uses,
            use_count: 0,
            expires_at: input.expires_at,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns why the link cannot admit anyone, or `None` when it can.
    #[must_use]
    pub fn invalid_reason(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if !self.is_active {
            return Some("invitation link is inactive");
        }

        if self.expires_at.is_some_and(|expires_at| now > expires_at) {
            return Some("invitation link has expired");
        }

        if self
            .max_uses
            .is_some_and(|max_uses| self.use_count >= max_uses)
        {
            return Some("invitation link has reached its maximum uses");
        }

        None
    }

    /// Returns whether the link currently admits joiners.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.invalid_reason(now).is_none()
    }

    /// Applies the domain policy to a raw email.
    ///
    /// The block list is consulted first and wins over the allow list.
    #[must_use]
    pub fn check_domain(&self, email: &str) -> bool {
        let Some(domain) = email_domain(email) else {
            return false;
        };

        if self.blocked_domains.contains(domain) {
            return false;
        }

        self.allowed_domains.is_empty() || self.allowed_domains.contains(domain)
    }

    /// Runs [`Self::is_valid`] then [`Self::check_domain`], mapping failures to errors.
    pub fn admit(&self, email: &str, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(reason) = self.invalid_reason(now) {
            return Err(AppError::LinkInvalid(reason.to_owned()));
        }

        if !self.check_domain(email) {
            return Err(AppError::DomainRejected(format!(
                "email '{}' is not permitted by this invitation link",
                email.trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;

    fn settings(now: DateTime<Utc>) -> InvitationLinkSettings {
        InvitationLinkSettings::create(
            NewLinkSettings {
                workspace_id: WorkspaceId::new(),
                grant_type: GrantType::Workspace,
                target_id: TargetId::new(),
                default_role: GrantRole::Member,
                default_permission: None,
                requires_approval: false,
                allowed_domains: Vec::new(),
                blocked_domains: Vec::new(),
                max_uses: None,
                expires_at: None,
                created_by: UserId::new(),
            },
            "link-token".to_owned(),
            now,
        )
        .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn inactive_link_is_invalid_regardless_of_other_fields() {
        let now = Utc::now();
        let mut link = settings(now);
        link.is_active = false;
        link.expires_at = Some(now + Duration::days(1));
        link.max_uses = Some(10);
        assert!(!link.is_valid(now));
    }

    #[test]
    fn exhausted_link_is_invalid() {
        let now = Utc::now();
        let mut link = settings(now);
        link.max_uses = Some(5);
        link.use_count = 5;
        assert!(!link.is_valid(now));

        link.use_count = 4;
        assert!(link.is_valid(now));
    }

    #[test]
    fn expired_link_is_invalid() {
        let now = Utc::now();
        let mut link = settings(now);
        link.expires_at = Some(now - Duration::seconds(1));
        assert!(!link.is_valid(now));
    }

    #[test]
    fn clear_link_is_valid() {
        let now = Utc::now();
        assert!(settings(now).is_valid(now));
    }

    #[test]
    fn block_list_wins_over_allow_list() {
        let mut link = settings(Utc::now());
        link.blocked_domains = DomainList::new(["evil.com"]);
        link.allowed_domains = DomainList::new(["good.com"]);

        assert!(!link.check_domain("user@evil.com"));
        assert!(!link.check_domain("user@EVIL.com"));
        assert!(link.check_domain("user@good.com"));
        assert!(!link.check_domain("user@other.com"));
    }

    #[test]
    fn malformed_email_is_rejected() {
        let link = settings(Utc::now());
        assert!(!link.check_domain("user"));
        assert!(!link.check_domain("user@a@b.com"));
        assert!(link.check_domain("user@anywhere.org"));
    }

    #[test]
    fn admit_maps_failures_to_errors() {
        let now = Utc::now();
        let mut link = settings(now);
        link.blocked_domains = DomainList::new(["evil.com"]);
        assert!(matches!(
            link.admit("user@evil.com", now),
            Err(AppError::DomainRejected(_))
        ));

        link.is_active = false;
        assert!(matches!(
            link.admit("user@good.com", now),
            Err(AppError::LinkInvalid(_))
        ));
    }

    #[test]
    fn create_rejects_zero_max_uses() {
        let now = Utc::now();
        let result = InvitationLinkSettings::create(
            NewLinkSettings {
                workspace_id: WorkspaceId::new(),
                grant_type: GrantType::Team,
                target_id: TargetId::new(),
                default_role: GrantRole::Member,
                default_permission: None,
                requires_approval: false,
                allowed_domains: Vec::new(),
                blocked_domains: Vec::new(),
                max_uses: Some(0),
                expires_at: None,
                created_by: UserId::new(),
            },
            "token".to_owned(),
            now,
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn domain_list_normalises_entries() {
        let list = DomainList::new([" Good.COM ", "@good.com", "", "other.org"]);
        assert_eq!(list.as_slice(), &["good.com".to_owned(), "other.org".to_owned()]);
    }

    proptest! {
        #[test]
        fn blocked_domain_is_rejected_even_when_allowed(domain in "[a-z]{1,12}\\.(com|org|io)") {
            let mut link = settings(Utc::now());
            link.allowed_domains = DomainList::new([domain.as_str()]);
            link.blocked_domains = DomainList::new([domain.as_str()]);
            let email = format!("someone@{domain}");
            prop_assert!(!link.check_domain(email.as_str()));
        }
    }
}
