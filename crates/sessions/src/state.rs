use serde::Serialize;
use tm_tableau::AuthToken;

/// Where the shared session is in its sign-in lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Active,
    /// A REST call was rejected with 401. The token is still held so it
    /// can be signed out before the next sign-in.
    Expired,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("unauthenticated"),
            Self::Active => f.write_str("active"),
            Self::Expired => f.write_str("expired"),
        }
    }
}

/// The handle plus its state. Only ever touched under the manager's lock.
#[derive(Debug)]
pub(crate) struct Session {
    pub state: SessionState,
    pub auth: Option<AuthToken>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            auth: None,
        }
    }

    pub fn activate(&mut self, auth: AuthToken) {
        self.state = SessionState::Active;
        self.auth = Some(auth);
    }

    pub fn expire(&mut self) {
        self.state = SessionState::Expired;
    }

    /// Drop the handle, returning it if one was held.
    pub fn release(&mut self) -> Option<AuthToken> {
        self.state = SessionState::Unauthenticated;
        self.auth.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AuthToken {
        AuthToken {
            token: "t".into(),
            site_id: "s".into(),
            site_content_url: String::new(),
            user_id: "u".into(),
            api_version: "3.19".into(),
        }
    }

    #[test]
    fn expired_session_keeps_its_token_until_released() {
        let mut session = Session::new();
        session.activate(token());
        session.expire();
        assert_eq!(session.state, SessionState::Expired);
        assert!(session.auth.is_some());

        assert!(session.release().is_some());
        assert_eq!(session.state, SessionState::Unauthenticated);
        assert!(session.release().is_none());
    }
}
