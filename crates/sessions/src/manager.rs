//! Scoped acquisition of the shared Tableau session.
//!
//! The lock is held across "ensure active → run operation → sign out", so
//! two dispatches never race on sign-in or sign-out and every sign-in is
//! paired with exactly one sign-out.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tm_domain::config::Credentials;
use tm_domain::error::{Error, Result};
use tm_domain::trace::TraceEvent;
use tm_tableau::{AuthToken, TableauApi};
use tokio::sync::Mutex;

use crate::state::{Session, SessionState};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionContext
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What an operation running inside [`SessionManager::with_session`] gets:
/// the REST client and the token of the live session.
///
/// Owned and cheap to clone so handlers can move it into `'static`
/// futures. It is only valid until the enclosing `with_session` returns.
#[derive(Clone)]
pub struct SessionContext {
    api: Arc<dyn TableauApi>,
    auth: AuthToken,
}

impl SessionContext {
    pub fn new(api: Arc<dyn TableauApi>, auth: AuthToken) -> Self {
        Self { api, auth }
    }

    pub fn api(&self) -> &dyn TableauApi {
        self.api.as_ref()
    }

    pub fn auth(&self) -> &AuthToken {
        &self.auth
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns the single session handle to one Tableau site.
pub struct SessionManager {
    api: Arc<dyn TableauApi>,
    credentials: Credentials,
    /// Deadline for one `with_session` call, measured from its start. Only
    /// the operation itself is cut short; a sign-in in flight always
    /// completes so its token can be signed out.
    timeout: Option<Duration>,
    session: Mutex<Session>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("site", &self.credentials.site_label())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(api: Arc<dyn TableauApi>, credentials: Credentials) -> Self {
        Self {
            api,
            credentials,
            timeout: None,
            session: Mutex::new(Session::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn api(&self) -> &Arc<dyn TableauApi> {
        &self.api
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state
    }

    /// Sign in once, replacing any session still held.
    pub async fn sign_in(&self) -> Result<SessionContext> {
        let mut session = self.session.lock().await;
        self.sign_out_locked(&mut session).await;
        self.sign_in_locked(&mut session).await
    }

    /// Sign out if a session is held. Never fails: errors are logged.
    pub async fn sign_out(&self) {
        let mut session = self.session.lock().await;
        self.sign_out_locked(&mut session).await;
    }

    /// Release any session left behind, e.g. by a dispatch that was
    /// dropped when the process was interrupted.
    pub async fn shutdown(&self) {
        let mut session = self.session.lock().await;
        if session.auth.is_some() {
            tracing::info!(site = self.credentials.site_label(), "signing out on shutdown");
        }
        self.sign_out_locked(&mut session).await;
    }

    /// Run `op` against a live session.
    ///
    /// Signs in if needed. If `op` fails with `SessionExpired`, the stale
    /// token is signed out, one fresh sign-in is attempted and `op` is run
    /// once more; a failed re-sign-in or a second expiry becomes
    /// `Error::Auth`. The session is signed out before returning on every
    /// path, including the timeout.
    pub async fn with_session<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(SessionContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut session = self.session.lock().await;
        let deadline = self
            .timeout
            .map(|limit| (tokio::time::Instant::now() + limit, limit));

        let result = self.run_locked(&mut session, &op, deadline).await;

        self.sign_out_locked(&mut session).await;
        result
    }

    // ── internals (caller holds the lock) ────────────────────────────

    async fn run_locked<T, F, Fut>(
        &self,
        session: &mut Session,
        op: &F,
        deadline: Option<(tokio::time::Instant, Duration)>,
    ) -> Result<T>
    where
        F: Fn(SessionContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ctx = self.ensure_active(session).await?;

        let reason = match bounded(deadline, op(ctx)).await {
            Err(Error::SessionExpired(reason)) => reason,
            other => return other,
        };

        self.mark_expired(session, &reason);
        self.sign_out_locked(session).await;
        let ctx = self
            .sign_in_locked(session)
            .await
            .map_err(|e| Error::Auth(format!("re-authentication failed: {e}")))?;

        match bounded(deadline, op(ctx)).await {
            Err(Error::SessionExpired(reason)) => {
                self.mark_expired(session, &reason);
                Err(Error::Auth(format!(
                    "session expired again after re-authentication: {reason}"
                )))
            }
            other => other,
        }
    }

    async fn ensure_active(&self, session: &mut Session) -> Result<SessionContext> {
        if session.state == SessionState::Active {
            if let Some(ref auth) = session.auth {
                return Ok(SessionContext::new(self.api.clone(), auth.clone()));
            }
        }
        self.sign_out_locked(session).await;
        self.sign_in_locked(session).await
    }

    /// Exactly one sign-in attempt.
    async fn sign_in_locked(&self, session: &mut Session) -> Result<SessionContext> {
        let site = self.credentials.site_label().to_owned();
        let auth_mode = self.credentials.auth_mode();
        let start = Instant::now();

        let outcome = self.api.sign_in(&self.credentials).await;

        TraceEvent::SignIn {
            site: site.clone(),
            auth_mode: auth_mode.to_string(),
            success: outcome.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        match outcome {
            Ok(auth) => {
                tracing::debug!(site = %site, %auth_mode, user = %auth.user_id, "signed in");
                session.activate(auth.clone());
                Ok(SessionContext::new(self.api.clone(), auth))
            }
            Err(e) => {
                tracing::warn!(site = %site, %auth_mode, error = %e, "sign-in failed");
                session.release();
                Err(match e {
                    Error::Auth(msg) => Error::Auth(msg),
                    other => Error::Auth(other.to_string()),
                })
            }
        }
    }

    /// Idempotent. Errors never reach the caller.
    async fn sign_out_locked(&self, session: &mut Session) {
        let Some(auth) = session.release() else {
            return;
        };

        let outcome = self.api.sign_out(&auth).await;
        if let Err(ref e) = outcome {
            tracing::warn!(
                site = self.credentials.site_label(),
                error = %e,
                "sign-out failed, ignoring"
            );
        }

        TraceEvent::SignOut {
            site: self.credentials.site_label().to_owned(),
            success: outcome.is_ok(),
        }
        .emit();
    }

    fn mark_expired(&self, session: &mut Session, reason: &str) {
        session.expire();
        tracing::info!(site = self.credentials.site_label(), %reason, "session expired");
        TraceEvent::SessionExpired {
            site: self.credentials.site_label().to_owned(),
            reason: reason.to_owned(),
        }
        .emit();
    }
}

/// Run `fut` until `deadline`, if there is one.
async fn bounded<T>(
    deadline: Option<(tokio::time::Instant, Duration)>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some((at, limit)) = deadline else {
        return fut.await;
    };
    match tokio::time::timeout_at(at, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "operation did not finish within {}s",
            limit.as_secs()
        ))),
    }
}
