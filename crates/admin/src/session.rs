//! Admin-side sessions.
//!
//! The admin never trusts a token just because the API returned it: the token
//! is validated with the admin's own copy of the signing config before a
//! session is opened. A session ends at whichever comes first of the session
//! lifetime and the token's own expiry.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use eshop_auth::{ClaimSet, Hs256TokenCodec, SigningConfig, TokenError, TokenValidator};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("session store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub token: String,
    pub claims: ClaimSet,
    pub language_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct SessionStore {
    validator: Hs256TokenCodec,
    lifetime: Duration,
    sessions: RwLock<HashMap<SessionId, AdminSession>>,
}

impl SessionStore {
    pub fn new(signing: &SigningConfig, lifetime: Duration) -> Self {
        Self {
            validator: Hs256TokenCodec::new(signing),
            lifetime,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Validate `token` and open a session for it.
    pub fn login(
        &self,
        token: String,
        language_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<SessionId, SessionError> {
        let claims = self.validator.validate(&token, now).inspect_err(|e| {
            tracing::debug!(kind = e.kind(), "token from api rejected");
        })?;
        let expires_at = std::cmp::min(now + self.lifetime, claims.expires_at());

        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        let id = SessionId::new();
        tracing::info!(
            session_id = %id,
            user_id = %claims.user_id(),
            %expires_at,
            "admin session opened"
        );
        sessions.insert(
            id,
            AdminSession {
                token,
                claims,
                language_id: language_id.into(),
                expires_at,
            },
        );
        Ok(id)
    }

    /// The live session for `id`. Expired sessions are evicted and never
    /// returned.
    pub fn get(&self, id: &SessionId, now: DateTime<Utc>) -> Option<AdminSession> {
        {
            let sessions = self.sessions.read().ok()?;
            let session = sessions.get(id)?;
            if !session.is_expired(now) {
                return Some(session.clone());
            }
        }
        self.logout(id);
        tracing::debug!(session_id = %id, "admin session expired");
        None
    }

    /// Switch the content language of a live session.
    pub fn set_language(&self, id: &SessionId, language_id: impl Into<String>, now: DateTime<Utc>) -> bool {
        let Ok(mut sessions) = self.sessions.write() else {
            return false;
        };
        match sessions.get_mut(id) {
            Some(session) if !session.is_expired(now) => {
                session.language_id = language_id.into();
                true
            }
            _ => false,
        }
    }

    pub fn logout(&self, id: &SessionId) -> bool {
        self.sessions
            .write()
            .map(|mut s| s.remove(id).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use eshop_auth::Role;
    use eshop_core::UserId;

    use super::*;

    const KEY: &str = "admin-session-test-key-0123456789abcdef";

    fn signing() -> SigningConfig {
        SigningConfig::new(KEY, "https://eshop.test", "https://eshop.test").unwrap()
    }

    fn token(issued_at: DateTime<Utc>, lifetime: Duration) -> String {
        let config = signing().with_lifetime(lifetime);
        let claims = ClaimSet::new(
            UserId::new(),
            "admin",
            "Admin",
            "admin@eshop.test",
            vec![Role::parse("admin").unwrap()],
            issued_at,
            lifetime,
        );
        Hs256TokenCodec::new(&config).issue(&claims).unwrap()
    }

    #[test]
    fn session_is_capped_by_its_own_lifetime() {
        let store = SessionStore::new(&signing(), Duration::minutes(10));
        let now = Utc::now();
        let id = store.login(token(now, Duration::hours(3)), "vi-VN", now).unwrap();

        let session = store.get(&id, now + Duration::minutes(9)).unwrap();
        assert_eq!(session.expires_at, now + Duration::minutes(10));
        assert_eq!(session.claims.identifier(), "admin");
        assert!(store.get(&id, now + Duration::minutes(10)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn session_never_outlives_the_token() {
        let store = SessionStore::new(&signing(), Duration::minutes(10));
        let issued = Utc::now() - Duration::minutes(175);
        let now = Utc::now();
        let id = store.login(token(issued, Duration::hours(3)), "en-US", now).unwrap();

        let session = store.get(&id, now).unwrap();
        assert!(session.expires_at <= session.claims.expires_at());
        assert!(session.expires_at < now + Duration::minutes(10));
    }

    #[test]
    fn tokens_signed_with_another_key_are_refused() {
        let other = SigningConfig::new("some-other-admin-key-0123456789abcdef", "https://eshop.test", "https://eshop.test")
            .unwrap();
        let store = SessionStore::new(&other, Duration::minutes(10));
        let now = Utc::now();
        assert_eq!(
            store.login(token(now, Duration::hours(3)), "vi-VN", now),
            Err(SessionError::Token(TokenError::BadSignature))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn poisoned_store_refuses_to_hand_out_a_session_id() {
        let store = std::sync::Arc::new(SessionStore::new(&signing(), Duration::minutes(10)));
        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.sessions.write().unwrap();
            panic!("poison the session lock");
        })
        .join();

        let now = Utc::now();
        assert_eq!(
            store.login(token(now, Duration::hours(3)), "vi-VN", now),
            Err(SessionError::Poisoned)
        );
    }

    #[test]
    fn logout_and_language_switch() {
        let store = SessionStore::new(&signing(), Duration::minutes(10));
        let now = Utc::now();
        let id = store.login(token(now, Duration::hours(3)), "vi-VN", now).unwrap();

        assert!(store.set_language(&id, "en-US", now));
        assert_eq!(store.get(&id, now).unwrap().language_id, "en-US");
        assert!(store.logout(&id));
        assert!(!store.logout(&id));
        assert!(store.get(&id, now).is_none());
    }
}
