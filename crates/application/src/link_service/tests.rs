use std::sync::Arc;

use chrono::Utc;

use grantflow_core::{Actor, AppError, UserId, WorkspaceId};
use grantflow_domain::{
    ActivityAction, GrantRole, GrantType, InvitationMethod, InvitationStatus, NewLinkSettings,
    PermissionLevel, TargetId,
};

use crate::test_support::{
    FakeStore, RecordingNotifier, access_request_service, invitation_service,
};

use super::{InvitationLinkService, JoinOutcome};

fn link_service(store: &Arc<FakeStore>) -> InvitationLinkService {
    let notifier = Arc::new(RecordingNotifier::default());
    InvitationLinkService::new(
        store.clone(),
        invitation_service(store, &notifier),
        access_request_service(store),
    )
}

fn link_input(workspace_id: WorkspaceId) -> NewLinkSettings {
    NewLinkSettings {
        workspace_id,
        grant_type: GrantType::Workspace,
        target_id: TargetId::new(),
        default_role: GrantRole::Member,
        default_permission: None,
        requires_approval: false,
        allowed_domains: vec!["Acme.com".to_owned()],
        blocked_domains: Vec::new(),
        max_uses: None,
        expires_at: None,
        created_by: UserId::new(),
    }
}

#[tokio::test]
async fn create_link_normalises_domains_and_defaults_permission() {
    let store = Arc::new(FakeStore::default());
    let service = link_service(&store);

    let settings = service
        .create_link_settings(link_input(WorkspaceId::new()))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(settings.is_active);
    assert_eq!(settings.default_permission, PermissionLevel::Edit);
    assert_eq!(settings.allowed_domains.as_slice(), &["acme.com".to_owned()]);
    assert_eq!(settings.link_token.len(), 64);
}

#[tokio::test]
async fn create_link_rejects_role_outside_scope() {
    let store = Arc::new(FakeStore::default());
    let service = link_service(&store);
    let mut input = link_input(WorkspaceId::new());
    input.grant_type = GrantType::Team;
    input.default_role = GrantRole::Guest;

    let result = service.create_link_settings(input).await;
    assert!(matches!(result, Err(AppError::InvalidRoleForType { .. })));
}

#[tokio::test]
async fn validate_link_checks_activity_then_domain() {
    let store = Arc::new(FakeStore::default());
    let service = link_service(&store);
    let settings = service
        .create_link_settings(link_input(WorkspaceId::new()))
        .await
        .unwrap_or_else(|_| unreachable!());
    let token = settings.link_token.as_str();

    assert!(
        service
            .validate_link(token, "dev@acme.com", Utc::now())
            .await
            .is_ok()
    );
    assert!(matches!(
        service
            .validate_link(token, "dev@elsewhere.com", Utc::now())
            .await,
        Err(AppError::DomainRejected(_))
    ));

    let deactivated = service.set_link_active(settings.id, false).await;
    assert!(matches!(deactivated, Ok(ref value) if !value.is_active));
    assert!(matches!(
        service.validate_link(token, "dev@acme.com", Utc::now()).await,
        Err(AppError::LinkInvalid(_))
    ));
    assert!(matches!(
        service.validate_link("unknown", "dev@acme.com", Utc::now()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn join_consumes_use_and_accepts_link_invitation() {
    let store = Arc::new(FakeStore::default());
    let service = link_service(&store);
    let mut input = link_input(WorkspaceId::new());
    input.max_uses = Some(1);
    let settings = service
        .create_link_settings(input)
        .await
        .unwrap_or_else(|_| unreachable!());
    let actor = Actor::user(UserId::new());
    let user_id = UserId::new();

    let outcome = service
        .join_via_link(&actor, settings.link_token.as_str(), user_id, "dev@acme.com")
        .await
        .unwrap_or_else(|_| unreachable!());

    let JoinOutcome::Joined(invitation) = outcome else {
        unreachable!();
    };
    assert_eq!(invitation.status, InvitationStatus::Accepted);
    assert_eq!(invitation.method, InvitationMethod::Link);
    assert_eq!(invitation.invitee_user_id, Some(user_id));
    assert_eq!(
        invitation.link_token.as_deref(),
        Some(settings.link_token.as_str())
    );

    let activity = store.activity.lock().await;
    assert!(
        activity
            .iter()
            .any(|entry| entry.invitation_id == invitation.id
                && entry.action == ActivityAction::LinkUsed)
    );
    drop(activity);

    let exhausted = service
        .join_via_link(
            &actor,
            settings.link_token.as_str(),
            UserId::new(),
            "ops@acme.com",
        )
        .await;
    assert!(matches!(exhausted, Err(AppError::LinkInvalid(_))));
}

#[tokio::test]
async fn concurrent_joins_never_exceed_ceiling() {
    let store = Arc::new(FakeStore::default());
    let service = link_service(&store);
    let mut input = link_input(WorkspaceId::new());
    input.max_uses = Some(1);
    let settings = service
        .create_link_settings(input)
        .await
        .unwrap_or_else(|_| unreachable!());
    let actor = Actor::user(UserId::new());
    let token = settings.link_token.as_str();

    let (first, second) = tokio::join!(
        service.join_via_link(&actor, token, UserId::new(), "one@acme.com"),
        service.join_via_link(&actor, token, UserId::new(), "two@acme.com"),
    );

    assert_eq!(
        [first.is_ok(), second.is_ok()]
            .iter()
            .filter(|joined| **joined)
            .count(),
        1
    );
    let stored = service.find_link_settings(settings.id).await;
    assert!(matches!(stored, Ok(Some(value)) if value.use_count == 1));
}

#[tokio::test]
async fn approval_link_files_access_request() {
    let store = Arc::new(FakeStore::default());
    let service = link_service(&store);
    let mut input = link_input(WorkspaceId::new());
    input.requires_approval = true;
    let settings = service
        .create_link_settings(input)
        .await
        .unwrap_or_else(|_| unreachable!());

    let outcome = service
        .join_via_link(
            &Actor::user(UserId::new()),
            settings.link_token.as_str(),
            UserId::new(),
            "dev@acme.com",
        )
        .await;

    assert!(matches!(outcome, Ok(JoinOutcome::PendingApproval(_))));
    assert!(store.invitations.lock().await.is_empty());
    let stored = service.find_link_settings(settings.id).await;
    assert!(matches!(stored, Ok(Some(value)) if value.use_count == 0));
}

#[tokio::test]
async fn unroutable_email_is_rejected_before_consuming_a_use() {
    let store = Arc::new(FakeStore::default());
    let service = link_service(&store);
    let mut input = link_input(WorkspaceId::new());
    input.allowed_domains = Vec::new();
    input.max_uses = Some(1);
    let settings = service
        .create_link_settings(input)
        .await
        .unwrap_or_else(|_| unreachable!());
    let actor = Actor::user(UserId::new());
    let token = settings.link_token.as_str();

    let rejected = service
        .join_via_link(&actor, token, UserId::new(), "user@intranet")
        .await;
    assert!(matches!(rejected, Err(AppError::Validation(_))));
    let stored = service.find_link_settings(settings.id).await;
    assert!(matches!(stored, Ok(Some(value)) if value.use_count == 0));

    let joined = service
        .join_via_link(&actor, token, UserId::new(), "good@example.com")
        .await;
    assert!(matches!(joined, Ok(JoinOutcome::Joined(_))));
    assert!(matches!(
        service.invitations.find_by_link_token(token).await,
        Ok(ref created) if created.len() == 1
    ));
}

#[tokio::test]
async fn failed_invitation_insert_gives_the_use_back() {
    let store = Arc::new(FakeStore {
        fail_invitation_creates: true,
        ..FakeStore::default()
    });
    let service = link_service(&store);
    let mut input = link_input(WorkspaceId::new());
    input.max_uses = Some(1);
    let settings = service
        .create_link_settings(input)
        .await
        .unwrap_or_else(|_| unreachable!());

    let result = service
        .join_via_link(
            &Actor::user(UserId::new()),
            settings.link_token.as_str(),
            UserId::new(),
            "dev@acme.com",
        )
        .await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    let stored = service.find_link_settings(settings.id).await;
    assert!(matches!(stored, Ok(Some(value)) if value.use_count == 0));
}

#[tokio::test]
async fn unrecorded_join_is_withdrawn_and_gives_the_use_back() {
    let store = Arc::new(FakeStore {
        fail_activity_appends: true,
        ..FakeStore::default()
    });
    let service = link_service(&store);
    let mut input = link_input(WorkspaceId::new());
    input.max_uses = Some(1);
    let settings = service
        .create_link_settings(input)
        .await
        .unwrap_or_else(|_| unreachable!());

    let result = service
        .join_via_link(
            &Actor::user(UserId::new()),
            settings.link_token.as_str(),
            UserId::new(),
            "dev@acme.com",
        )
        .await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert!(
        store
            .invitations
            .lock()
            .await
            .values()
            .all(|invitation| invitation.status == InvitationStatus::Cancelled)
    );
    let stored = service.find_link_settings(settings.id).await;
    assert!(matches!(stored, Ok(Some(value)) if value.use_count == 0));
}
