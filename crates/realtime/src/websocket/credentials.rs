//! Session credential lookup
//!
//! The relay asks for the token every time it connects, so a login, logout or
//! token refresh takes effect on the next (re)connect.

use std::sync::{Arc, PoisonError, RwLock};

/// Source of the session token attached to the realtime endpoint
pub trait CredentialSource: Send + Sync + 'static {
    /// Current token, or `None` when there is no session
    fn token(&self) -> Option<String>;
}

impl<F> CredentialSource for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Shared, updatable session token
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    token: Arc<RwLock<Option<String>>>,
}

impl SessionToken {
    /// Session with no token yet
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set(token);
        session
    }

    /// Store a token, e.g. after login or refresh
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Forget the token, e.g. on logout
    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CredentialSource for SessionToken {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_lifecycle() {
        let session = SessionToken::new();
        assert_eq!(session.token(), None);

        let shared = session.clone();
        shared.set("abc");
        assert_eq!(session.token().as_deref(), Some("abc"));

        session.set("");
        assert_eq!(shared.token(), None);

        session.set("def");
        session.clear();
        assert_eq!(shared.token(), None);
    }

    #[test]
    fn test_closure_source() {
        let source = || Some("from-closure".to_string());
        assert_eq!(CredentialSource::token(&source).as_deref(), Some("from-closure"));
    }
}
