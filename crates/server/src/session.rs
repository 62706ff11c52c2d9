//! Session and PKCE state shared with other readers/writers of the store.
//!
//! Keys are disjoint per login attempt (an unguessable `state` value), so no
//! cross-request locking is needed.

use crate::config::{SessionBackend, SessionConfig};
use crate::error::AppError;
use base64::Engine;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

const LOGIN_STATE_PREFIX: &str = "login-state";

/// What the callback needs to finish an upstream login.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoginState {
    pub login_challenge: String,
    pub pkce_verifier: String,
}

impl LoginState {
    pub fn key(state: &str) -> String {
        format!("{LOGIN_STATE_PREFIX}:{state}")
    }
}

/// Generate a URL-safe random token from 32 bytes of OS randomness.
pub fn generate_token() -> Result<String, AppError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|e| AppError::UpstreamUnavailable(format!("system randomness: {e}")))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// RFC 7636 S256 code challenge for a verifier.
pub fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    entries: Arc<DashMap<String, (String, Instant)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = self.entries.get(key).and_then(|entry| {
            let (value, expires_at) = entry.value();
            (*expires_at > now).then(|| value.clone())
        });
        if value.is_none() {
            self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        }
        value
    }

    fn take(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .remove(key)
            .and_then(|(_, (value, expires_at))| (expires_at > now).then_some(value))
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}

/// Session store backends. Values are stored as JSON.
#[derive(Clone)]
pub enum SessionStore {
    InMemory(InMemoryStore),
    Redis(RedisStore),
}

impl SessionStore {
    pub async fn from_config(config: &SessionConfig) -> Result<Self, AppError> {
        match (&config.backend, config.url.as_deref()) {
            (SessionBackend::Memory, _) => Ok(SessionStore::InMemory(InMemoryStore::new())),
            (SessionBackend::Redis, Some(url)) => Ok(SessionStore::Redis(RedisStore::connect(url).await?)),
            (SessionBackend::Redis, None) => Err(AppError::UpstreamUnavailable(
                "redis session store configured without a url".into(),
            )),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::UpstreamUnavailable(format!("session encode: {e}")))?;
        match self {
            SessionStore::InMemory(store) => {
                store.set(key, raw, ttl);
                Ok(())
            }
            SessionStore::Redis(store) => store.set(key, raw, ttl).await,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let raw = match self {
            SessionStore::InMemory(store) => store.get(key),
            SessionStore::Redis(store) => store.get(key).await?,
        };
        decode(raw)
    }

    /// Read a value and remove it in one step.
    pub async fn take<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let raw = match self {
            SessionStore::InMemory(store) => store.take(key),
            SessionStore::Redis(store) => store.take(key).await?,
        };
        decode(raw)
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        match self {
            SessionStore::InMemory(store) => {
                store.delete(key);
                Ok(())
            }
            SessionStore::Redis(store) => store.delete(key).await,
        }
    }
}

fn decode<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>, AppError> {
    raw.map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| AppError::MalformedUpstreamResponse(format!("session decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_challenge_matches_rfc7636_appendix_b() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn take_removes_the_entry() {
        let store = SessionStore::InMemory(InMemoryStore::new());
        let state = LoginState {
            login_challenge: "chal".into(),
            pkce_verifier: "verifier".into(),
        };
        store
            .set("login-state:abc", &state, Duration::from_secs(60))
            .await
            .unwrap();

        let peeked: Option<LoginState> = store.get("login-state:abc").await.unwrap();
        assert_eq!(peeked.as_ref(), Some(&state));

        let taken: Option<LoginState> = store.take("login-state:abc").await.unwrap();
        assert_eq!(taken, Some(state));
        let again: Option<LoginState> = store.take("login-state:abc").await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_and_purged() {
        let memory = InMemoryStore::new();
        memory.set("gone", "\"x\"".into(), Duration::ZERO);
        memory.set("kept", "\"y\"".into(), Duration::from_secs(60));

        assert!(memory.get("gone").is_none());
        assert!(memory.take("gone").is_none());

        memory.set("gone-too", "\"z\"".into(), Duration::ZERO);
        assert_eq!(memory.purge_expired(), 1);
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = SessionStore::InMemory(InMemoryStore::new());
        store.set("k", &1u32, Duration::from_secs(60)).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        let value: Option<u32> = store.get("k").await.unwrap();
        assert!(value.is_none());
    }
}
