//! Session lifecycle against the in-memory Tableau double.
//!
//! Covers the scoped-acquisition guarantees: one sign-out per sign-in on
//! every path, a single automatic re-sign-in on expiry, and no overlap
//! between concurrent operations.

use std::sync::Arc;
use std::time::Duration;

use tm_domain::config::{AuthMethod, Credentials};
use tm_domain::error::Error;
use tm_sessions::{SessionManager, SessionState};
use tm_tableau::{MockTableau, TableauApi};

fn credentials() -> Credentials {
    Credentials {
        server_url: "https://x.example.com".into(),
        site_id: "finance".into(),
        auth: AuthMethod::Token {
            name: "a".into(),
            value: "b".into(),
        },
    }
}

fn manager(mock: &Arc<MockTableau>) -> SessionManager {
    SessionManager::new(mock.clone(), credentials())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scoped acquisition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn with_session_signs_in_and_out_exactly_once() {
    let mock = Arc::new(MockTableau::sample());
    let sessions = manager(&mock);

    let count = sessions
        .with_session(|ctx| async move {
            let workbooks = ctx.api().list_workbooks(ctx.auth()).await?;
            Ok(workbooks.len())
        })
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(mock.sign_ins(), 1);
    assert_eq!(mock.sign_outs(), 1);
    assert_eq!(mock.live_sessions(), 0);
    assert_eq!(sessions.state().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn handler_failure_still_signs_out() {
    let mock = Arc::new(MockTableau::sample());
    let sessions = manager(&mock);

    let result: Result<(), Error> = sessions
        .with_session(|ctx| async move {
            ctx.api().get_view(ctx.auth(), "missing-id").await?;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(mock.sign_ins(), 1);
    assert_eq!(mock.sign_outs(), 1);
}

#[tokio::test]
async fn sign_out_failure_does_not_mask_the_result() {
    let mock = Arc::new(MockTableau::sample());
    mock.fail_sign_out();
    let sessions = manager(&mock);

    let site = sessions
        .with_session(|ctx| async move { ctx.api().get_site(ctx.auth()).await })
        .await
        .unwrap();

    assert_eq!(site.name, "Finance");
    assert_eq!(mock.sign_outs(), 1);
}

#[tokio::test]
async fn sign_in_failure_performs_no_sign_out_and_no_rest_call() {
    let mock = Arc::new(MockTableau::sample());
    mock.fail_sign_in();
    let sessions = manager(&mock);

    let result = sessions
        .with_session(|ctx| async move { ctx.api().list_users(ctx.auth()).await })
        .await;

    assert!(matches!(result, Err(Error::Auth(_))));
    assert_eq!(mock.sign_in_attempts(), 1);
    assert_eq!(mock.sign_outs(), 0);
    assert!(mock.rest_calls().is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Expiry recovery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn expiry_triggers_exactly_one_re_sign_in() {
    let mock = Arc::new(MockTableau::sample());
    mock.expire_next_calls(1);
    let sessions = manager(&mock);

    let users = sessions
        .with_session(|ctx| async move { ctx.api().list_users(ctx.auth()).await })
        .await
        .unwrap();

    assert_eq!(users.len(), 3);
    assert_eq!(mock.sign_in_attempts(), 2);
    assert_eq!(mock.sign_ins(), 2);
    assert_eq!(mock.sign_outs(), 2);
    assert_eq!(mock.rest_calls(), vec!["list_users", "list_users"]);
}

#[tokio::test]
async fn failed_re_sign_in_surfaces_auth_error() {
    let mock = Arc::new(MockTableau::sample());
    mock.allow_sign_ins(1);
    mock.expire_next_calls(1);
    let sessions = manager(&mock);

    let result = sessions
        .with_session(|ctx| async move { ctx.api().list_groups(ctx.auth()).await })
        .await;

    match result {
        Err(Error::Auth(msg)) => assert!(msg.contains("re-authentication failed")),
        other => panic!("expected Auth error, got {other:?}"),
    }
    assert_eq!(mock.sign_in_attempts(), 2);
    assert_eq!(mock.sign_outs(), 1);
    assert_eq!(mock.rest_calls().len(), 1);
}

#[tokio::test]
async fn second_expiry_is_not_retried_again() {
    let mock = Arc::new(MockTableau::sample());
    mock.expire_next_calls(2);
    let sessions = manager(&mock);

    let result = sessions
        .with_session(|ctx| async move { ctx.api().list_projects(ctx.auth()).await })
        .await;

    assert!(matches!(result, Err(Error::Auth(_))));
    assert_eq!(mock.sign_in_attempts(), 2);
    assert_eq!(mock.sign_outs(), 2);
    assert_eq!(mock.rest_calls().len(), 2);
    assert_eq!(sessions.state().await, SessionState::Unauthenticated);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timeouts and concurrency
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn timeout_is_reported_and_session_released() {
    let mock = Arc::new(MockTableau::sample());
    let sessions = manager(&mock).with_timeout(Duration::from_secs(5));

    let result: Result<(), Error> = sessions
        .with_session(|ctx| async move {
            ctx.api().get_site(ctx.auth()).await?;
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(Error::Timeout(_))));
    assert_eq!(mock.sign_ins(), 1);
    assert_eq!(mock.sign_outs(), 1);
    assert_eq!(mock.live_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_sign_in_is_completed_and_signed_out_before_the_timeout_error() {
    let mock = Arc::new(MockTableau::sample());
    mock.set_latency(Duration::from_secs(3));
    let sessions = manager(&mock).with_timeout(Duration::from_secs(1));

    let result = sessions
        .with_session(|ctx| async move { ctx.api().get_site(ctx.auth()).await })
        .await;

    assert!(matches!(result, Err(Error::Timeout(_))));
    assert_eq!(mock.sign_ins(), 1);
    assert_eq!(mock.sign_outs(), 1);
    assert_eq!(mock.live_sessions(), 0);
}

#[tokio::test]
async fn concurrent_operations_never_share_or_overlap_sessions() {
    let mock = Arc::new(MockTableau::sample());
    mock.set_latency(Duration::from_millis(5));
    let sessions = Arc::new(manager(&mock));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let sessions = sessions.clone();
        handles.push(tokio::spawn(async move {
            sessions
                .with_session(|ctx| async move { ctx.api().list_workbooks(ctx.auth()).await })
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(mock.sign_ins(), 8);
    assert_eq!(mock.sign_outs(), 8);
    assert_eq!(mock.max_live_sessions(), 1);
}

#[tokio::test]
async fn shutdown_releases_a_session_held_by_sign_in() {
    let mock = Arc::new(MockTableau::sample());
    let sessions = manager(&mock);

    let ctx = sessions.sign_in().await.unwrap();
    assert_eq!(sessions.state().await, SessionState::Active);
    assert!(mock.get_site(ctx.auth()).await.is_ok());

    sessions.shutdown().await;
    sessions.shutdown().await;

    assert_eq!(mock.sign_outs(), 1);
    assert_eq!(sessions.state().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn explicit_sign_out_is_idempotent() {
    let mock = Arc::new(MockTableau::sample());
    let sessions = manager(&mock);

    sessions.sign_out().await;
    sessions.sign_in().await.unwrap();
    sessions.sign_out().await;
    sessions.sign_out().await;

    assert_eq!(mock.sign_ins(), 1);
    assert_eq!(mock.sign_outs(), 1);
}
