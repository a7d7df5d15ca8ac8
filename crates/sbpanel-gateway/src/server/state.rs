//! Gateway state management
//!
//! Gateway-level stores shared by every request:
//! - Session Store: cookie credential → authenticated user
//! - Token Cache: read-optimized snapshot of valid API tokens

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::RngCore;
use sbpanel_core::{ApiToken, TokenRepository, User, UserRepository};
use tracing::{debug, info};

/// An authenticated browser session
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Session credential → session, evicted lazily on lookup
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Open a session for `user`, returning the credential (32 hex chars)
    pub fn create(&self, mut user: User) -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let credential = hex::encode(bytes);

        user.password_hash.clear();
        let now = chrono::Utc::now().timestamp();
        let session = Session {
            user,
            created_at: now,
            expires_at: now + self.ttl.as_secs() as i64,
        };

        debug!("[Session] Opened session for '{}'", session.user.username);
        self.sessions.insert(credential.clone(), session);
        credential
    }

    /// Resolve a credential to its user, dropping it if expired
    pub fn resolve(&self, credential: &str) -> Option<User> {
        let now = chrono::Utc::now().timestamp();
        let session = self.sessions.get(credential)?;
        if !session.is_expired(now) {
            return Some(session.user.clone());
        }
        drop(session);

        self.sessions.remove(credential);
        debug!("[Session] Evicted expired session");
        None
    }

    pub fn remove(&self, credential: &str) -> bool {
        self.sessions.remove(credential).is_some()
    }

    /// Drop every session of a user (after a credential change)
    pub fn remove_user(&self, user_id: i64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user.id != user_id);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    user: User,
    expiry: i64,
}

/// Immutable snapshot of API tokens, swapped wholesale on rebuild
#[derive(Default)]
pub struct TokenCache {
    snapshot: RwLock<Arc<HashMap<String, CachedToken>>>,
    /// Held from the store read to the swap, so an older read never lands last
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records
    ///
    /// The previous snapshot stays in place when either repository fails.
    pub async fn rebuild(
        &self,
        tokens: &dyn TokenRepository,
        users: &dyn UserRepository,
    ) -> Result<usize> {
        let _guard = self.rebuild_lock.lock().await;
        let tokens = tokens.list().await?;
        let users = users.list().await?;
        Ok(self.replace(tokens, users))
    }

    /// Swap in a snapshot built from `tokens`; expired tokens and tokens of
    /// unknown users are left out
    pub fn replace(&self, tokens: Vec<ApiToken>, users: Vec<User>) -> usize {
        let users: HashMap<i64, User> = users
            .into_iter()
            .map(|mut u| {
                u.password_hash.clear();
                (u.id, u)
            })
            .collect();

        let next: HashMap<String, CachedToken> = tokens
            .into_iter()
            .filter(|t| !t.is_expired())
            .filter_map(|t| {
                let user = users.get(&t.user_id)?.clone();
                Some((
                    t.token,
                    CachedToken {
                        user,
                        expiry: t.expiry,
                    },
                ))
            })
            .collect();

        let count = next.len();
        *self.snapshot.write() = Arc::new(next);
        info!("[TokenCache] Rebuilt with {} tokens", count);
        count
    }

    /// Resolve an API token to its owner
    pub fn resolve(&self, token: &str) -> Option<User> {
        let snapshot = self.snapshot.read().clone();
        let cached = snapshot.get(token)?;
        if cached.expiry != 0 && chrono::Utc::now().timestamp() >= cached.expiry {
            return None;
        }
        Some(cached.user.clone())
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
