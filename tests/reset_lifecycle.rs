// End-to-end reset lifecycle against the in-memory document store and the
// in-process auth gateway: submission, admin review, both approval methods
// and the forced-change completion.
use std::sync::Arc;
use std::sync::Mutex;

use resetvault::{
    AdminIdentity, ApprovalService, Config, Documents, LoginFlow, LoginOutcome, MemoryAuthGateway,
    NewResetRequest, ResetEvent, ResetMethod, ResetNotifier, ResetReason, ResetRequestStore,
    ResetStatus, UserRecord, UserSecurityFields,
};

#[derive(Default)]
struct CapturingNotifier {
    events: Mutex<Vec<ResetEvent>>,
}

impl CapturingNotifier {
    fn events(&self) -> Vec<ResetEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ResetNotifier for CapturingNotifier {
    fn notify(&self, event: &ResetEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct World {
    store: ResetRequestStore,
    notifier: Arc<CapturingNotifier>,
    admin: AdminIdentity,
    config: Config,
}

async fn world() -> World {
    let _ = env_logger::builder().is_test(true).try_init();

    let notifier = Arc::new(CapturingNotifier::default());
    let store = ResetRequestStore::new(
        Arc::new(Documents::in_memory()),
        notifier.clone() as Arc<dyn ResetNotifier>,
    );

    store
        .create_user(&UserRecord {
            id: "u-jdoe".into(),
            username: "jdoe".into(),
            email: "jdoe@example.com".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            security: UserSecurityFields::default(),
        })
        .await
        .unwrap();

    World {
        store,
        notifier,
        admin: AdminIdentity::new("a-1", "admin@example.com"),
        config: Config::default(),
    }
}

fn request_for(username: &str) -> NewResetRequest {
    NewResetRequest {
        username: username.into(),
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        email: Some("jdoe@example.com".into()),
        phone_number: Some("+15550100".into()),
        reason: ResetReason::Forgot,
        additional_info: Some("locked out after phone change".into()),
    }
}

#[tokio::test]
async fn manual_reset_lifecycle_ends_with_clean_security_fields() {
    let w = world().await;

    // 1. User submits a request; it lands pending and is announced.
    let request = w.store.submit(request_for("jdoe")).await.unwrap();
    assert_eq!(request.status, ResetStatus::Pending);
    assert!(matches!(
        w.notifier.events().as_slice(),
        [ResetEvent::RequestSubmitted { .. }]
    ));

    // 2. Admin approves with a generated temporary password.
    let gateway = MemoryAuthGateway::with_account("jdoe@example.com", "Forgotten-1!");
    let service = ApprovalService::new(
        w.store.clone(),
        gateway,
        w.notifier.clone() as Arc<dyn ResetNotifier>,
        &w.config,
    )
    .unwrap();
    let outcome = service
        .approve(&request.request_id, ResetMethod::Manual, None, &w.admin)
        .await
        .unwrap();
    let temporary = outcome.temporary_password.expect("manual method issues a password");
    assert_eq!(temporary.chars().count(), 12);

    let reviewed = w.store.get(&request.request_id).await.unwrap();
    assert_eq!(reviewed.status, ResetStatus::Approved);
    assert_eq!(reviewed.reviewed_by.as_deref(), Some("admin@example.com"));

    // 3. User signs in with the temporary password and is intercepted.
    let login = LoginFlow::new(
        w.store.clone(),
        MemoryAuthGateway::with_account("jdoe@example.com", "Forgotten-1!"),
        &w.config,
    )
    .unwrap();
    match login.sign_in("jdoe", &temporary).await.unwrap() {
        LoginOutcome::ForcedChange { user } => {
            assert!(user.security.must_change_password);
            assert_eq!(user.security.password_reset_method, Some(ResetMethod::Manual));
        }
        other => panic!("expected interception, got {other:?}"),
    }

    // 4. Forced change with a conforming password clears everything at once.
    login
        .complete_forced_change("jdoe", "Brand-New-Secret-4!", "Brand-New-Secret-4!")
        .await
        .unwrap();

    let user = w.store.find_user_by_username("jdoe").await.unwrap().unwrap();
    assert!(!user.security.must_change_password);
    assert!(user.security.temporary_password.is_none());
    assert!(user.security.password_reset_method.is_none());
    assert!(user.security.password_reset_request_id.is_none());

    // 5. The old temporary password no longer signs in.
    assert!(login.sign_in("jdoe", &temporary).await.is_err());
    assert!(matches!(
        login.sign_in("jdoe", "Brand-New-Secret-4!").await.unwrap(),
        LoginOutcome::Success { .. }
    ));
}

#[tokio::test]
async fn email_reset_lifecycle_sends_one_email_and_clears_on_completion() {
    let w = world().await;
    let request = w.store.submit(request_for("jdoe")).await.unwrap();

    let gateway = MemoryAuthGateway::with_account("jdoe@example.com", "Forgotten-1!");
    let service = ApprovalService::new(
        w.store.clone(),
        gateway,
        w.notifier.clone() as Arc<dyn ResetNotifier>,
        &w.config,
    )
    .unwrap();

    let outcome = service
        .approve(&request.request_id, ResetMethod::Email, None, &w.admin)
        .await
        .unwrap();
    assert!(outcome.temporary_password.is_none());

    let user = w.store.find_user_by_username("jdoe").await.unwrap().unwrap();
    assert!(user.security.must_change_password);
    assert!(user.security.password_reset_email_sent);
    assert!(user.security.temporary_password.is_none());

    // Duplicate approval attempts conflict rather than re-sending email.
    assert!(service
        .approve(&request.request_id, ResetMethod::Email, None, &w.admin)
        .await
        .is_err());
}

#[tokio::test]
async fn submission_for_unknown_username_persists_nothing() {
    let w = world().await;

    let err = w.store.submit(request_for("ghost")).await.unwrap_err();
    assert!(err.to_string().contains("ghost"));
    assert!(w.store.list().await.unwrap().is_empty());
    assert!(w.notifier.events().is_empty());
}

#[tokio::test]
async fn rejection_is_terminal_but_repeatable() {
    let w = world().await;
    let request = w.store.submit(request_for("jdoe")).await.unwrap();

    let service = ApprovalService::new(
        w.store.clone(),
        MemoryAuthGateway::with_account("jdoe@example.com", "Forgotten-1!"),
        w.notifier.clone() as Arc<dyn ResetNotifier>,
        &w.config,
    )
    .unwrap();

    service
        .reject(&request.request_id, "could not verify identity", &w.admin)
        .await
        .unwrap();
    service
        .reject(&request.request_id, "second reviewer concurs", &w.admin)
        .await
        .unwrap();

    let rejected = w.store.get(&request.request_id).await.unwrap();
    assert_eq!(rejected.status, ResetStatus::Rejected);
    assert_eq!(
        rejected.admin_notes.as_deref(),
        Some("second reviewer concurs")
    );

    // Approval after rejection conflicts; no auth side effects happened.
    assert!(service
        .approve(&request.request_id, ResetMethod::Manual, None, &w.admin)
        .await
        .is_err());
}
