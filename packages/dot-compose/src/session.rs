//! Compose sessions
//!
//! A session keeps the signing options of a round 1 payload until the
//! matching round 2 call consumes it. Expired entries are swept lazily on
//! every `put`, which costs O(active sessions) per new session.

use crate::extrinsic::blake2_256;
use crate::types::SigningOptions;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Signing options cached between the two compose rounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub context: SigningOptions,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Process-wide map of session key to session
///
/// Every operation holds the lock only for the map access itself.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `context` under `key` for `ttl`, silently replacing any
    /// previous entry, after sweeping everything expired at `now`
    pub fn put(&self, key: String, context: SigningOptions, now: DateTime<Utc>, ttl: Duration) {
        let mut sessions = self.lock();
        sweep(&mut sessions, now);
        debug!(session = %key, "storing compose session");
        sessions.insert(
            key,
            Session {
                context,
                expires_at: now + ttl,
            },
        );
    }

    /// Look up a session without checking its expiry
    pub fn get(&self, key: &str) -> Option<Session> {
        self.lock().get(key).cloned()
    }

    pub fn delete(&self, key: &str) -> Option<Session> {
        self.lock().remove(key)
    }

    /// Remove the session for consumption; expired entries are dropped and
    /// reported as absent
    pub fn take(&self, key: &str, now: DateTime<Utc>) -> Option<Session> {
        let session = self.lock().remove(key)?;
        if session.is_expired(now) {
            debug!(session = %key, "dropping expired compose session");
            return None;
        }
        Some(session)
    }

    /// Put back a session taken by a consumer that failed
    pub fn reinstate(&self, key: String, session: Session) {
        self.lock().entry(key).or_insert(session);
    }

    /// Delete every session that expired before `now`
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        sweep(&mut self.lock(), now)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sweep(sessions: &mut HashMap<String, Session>, now: DateTime<Utc>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_expired(now));
    let swept = before - sessions.len();
    if swept > 0 {
        debug!(swept, remaining = sessions.len(), "swept expired compose sessions");
    }
    swept
}

/// Session key: Blake2-256 over the creation time and every input of the
/// payload
pub fn session_key(
    created_at: DateTime<Utc>,
    account: &str,
    target: &str,
    params: &[String],
    options: &SigningOptions,
) -> String {
    let material = json!([
        created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        account,
        target,
        params,
        options.block_hash,
        options.era,
        options.nonce,
        options.tip.to_string(),
    ]);
    format!(
        "0x{}",
        hex::encode(blake2_256(material.to_string().as_bytes()))
    )
}
