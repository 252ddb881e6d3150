//! Volatile in-memory user record store.
//!
//! Records live only for the life of the process: created by a finished
//! registration sub-dialogue, removed by a finished deletion, never
//! mutated in place. A single `RwLock` serializes id assignment and
//! existence checks, so one store may be shared across sessions.
//!
//! Passwords are stored as SHA-256 hex digests, never verbatim; reads and
//! deletes digest the caller's password and compare digests. `NotFound`
//! covers both "no such id" and "wrong credentials" so callers cannot
//! probe which ids exist.

use frontdesk_core::error::StoreError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// First id handed out by a fresh store.
const START_ID: u64 = 10001;

/// Input to `create` — the fields confirmed by a registration dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub gender: String,
    pub age: u32,
    pub password: String,
    pub email: String,
}

/// A stored record. Owned exclusively by the store; callers only ever see
/// ids and [`UserProfile`] projections.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    id: u64,
    name: String,
    gender: String,
    age: u32,
    password_digest: String,
    email: String,
}

/// The password-free projection returned by `read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub gender: String,
    pub age: u32,
    pub email: String,
}

impl std::fmt::Display for UserProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "用户ID: {}, 姓名: {}, 性别: {}, 年龄: {}, 邮箱: {}",
            self.id, self.name, self.gender, self.age, self.email
        )
    }
}

struct Inner {
    records: HashMap<u64, UserRecord>,
    next_id: u64,
}

/// The volatile record store.
pub struct RecordStore {
    inner: RwLock<Inner>,
}

impl RecordStore {
    /// Create an empty store. Ids start at 10001.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: HashMap::new(),
                next_id: START_ID,
            }),
        }
    }

    /// Store a new record and return its assigned id. Never fails.
    pub async fn create(&self, user: NewUser) -> u64 {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.records.insert(
            id,
            UserRecord {
                id,
                name: user.name,
                gender: user.gender,
                age: user.age,
                password_digest: digest(&user.password),
                email: user.email,
            },
        );
        tracing::debug!(records = inner.records.len(), id, "Record stored");
        id
    }

    /// Look up a record by id and password.
    ///
    /// Returns the password-free profile on a full match; `NotFound` for
    /// both an unknown id and a wrong password.
    pub async fn read(&self, id: u64, password: &str) -> Result<UserProfile, StoreError> {
        let inner = self.inner.read().await;
        match inner.records.get(&id) {
            Some(record) if record.password_digest == digest(password) => Ok(UserProfile {
                id: record.id,
                name: record.name.clone(),
                gender: record.gender.clone(),
                age: record.age,
                email: record.email.clone(),
            }),
            _ => Err(StoreError::NotFound),
        }
    }

    /// Remove a record, but only when id, password, and email all match.
    /// No mutation on mismatch.
    pub async fn delete(&self, id: u64, password: &str, email: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let matches = inner
            .records
            .get(&id)
            .is_some_and(|r| r.password_digest == digest(password) && r.email == email);
        if matches {
            inner.records.remove(&id);
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    /// Number of stored records.
    pub async fn count(&self) -> usize {
        self.inner.read().await.records.len()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
