//! Where pending verification codes live between issue and verify.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use realty_database::{OtpRecord, OtpRepository};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::error::CrmResult;

/// One pending code per (lowercased) email address.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Replace whatever is pending for `record.email`.
    async fn put(&self, record: OtpRecord) -> CrmResult<()>;

    async fn get(&self, email: &str) -> CrmResult<Option<OtpRecord>>;

    /// Spend one attempt while fewer than `max_attempts` have been used.
    /// Returns the new count, or `None` when nothing is pending or the budget is gone.
    async fn increment_attempts(&self, email: &str, max_attempts: i64) -> CrmResult<Option<i64>>;

    /// Delete the pending code only if it is `code` and still live at `now`.
    /// At most one caller sees `true` for a given code.
    async fn consume(&self, email: &str, code: &str, now: &str) -> CrmResult<bool>;

    async fn remove(&self, email: &str) -> CrmResult<bool>;

    /// Drop codes whose `expires_at <= now`.
    async fn purge_expired(&self, now: &str) -> CrmResult<u64>;
}

#[derive(Clone)]
pub struct SqlOtpStore {
    codes: OtpRepository,
}

impl SqlOtpStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            codes: OtpRepository::new(pool),
        }
    }
}

#[async_trait]
impl OtpStore for SqlOtpStore {
    async fn put(&self, record: OtpRecord) -> CrmResult<()> {
        Ok(self.codes.upsert(&record).await?)
    }

    async fn get(&self, email: &str) -> CrmResult<Option<OtpRecord>> {
        Ok(self.codes.get(email).await?)
    }

    async fn increment_attempts(&self, email: &str, max_attempts: i64) -> CrmResult<Option<i64>> {
        Ok(self.codes.increment_attempts(email, max_attempts).await?)
    }

    async fn consume(&self, email: &str, code: &str, now: &str) -> CrmResult<bool> {
        Ok(self.codes.consume(email, code, now).await?)
    }

    async fn remove(&self, email: &str) -> CrmResult<bool> {
        Ok(self.codes.delete(email).await?)
    }

    async fn purge_expired(&self, now: &str) -> CrmResult<u64> {
        Ok(self.codes.delete_expired(now).await?)
    }
}

/// Process-local store. Codes do not survive a restart and are not shared
/// between instances.
#[derive(Clone, Default)]
pub struct InMemoryOtpStore {
    codes: Arc<RwLock<HashMap<String, OtpRecord>>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, record: OtpRecord) -> CrmResult<()> {
        self.codes.write().await.insert(record.email.clone(), record);
        Ok(())
    }

    async fn get(&self, email: &str) -> CrmResult<Option<OtpRecord>> {
        Ok(self.codes.read().await.get(email).cloned())
    }

    async fn increment_attempts(&self, email: &str, max_attempts: i64) -> CrmResult<Option<i64>> {
        let mut codes = self.codes.write().await;
        Ok(codes
            .get_mut(email)
            .filter(|record| record.attempts < max_attempts)
            .map(|record| {
                record.attempts += 1;
                record.attempts
            }))
    }

    async fn consume(&self, email: &str, code: &str, now: &str) -> CrmResult<bool> {
        let mut codes = self.codes.write().await;
        let live = codes
            .get(email)
            .is_some_and(|record| record.code == code && record.expires_at.as_str() > now);
        if live {
            codes.remove(email);
        }
        Ok(live)
    }

    async fn remove(&self, email: &str) -> CrmResult<bool> {
        Ok(self.codes.write().await.remove(email).is_some())
    }

    async fn purge_expired(&self, now: &str) -> CrmResult<u64> {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        // Timestamps share one fixed-width UTC format, so string order is time order.
        codes.retain(|_, record| record.expires_at.as_str() > now);
        Ok((before - codes.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(email: &str, expires_at: &str) -> OtpRecord {
        OtpRecord {
            email: email.to_string(),
            code: "123456".to_string(),
            expires_at: expires_at.to_string(),
            attempts: 0,
            last_sent_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn in_memory_store_tracks_attempts_and_expiry() {
        let store = InMemoryOtpStore::new();
        store.put(record("a@example.com", "2026-01-01T00:10:00.000Z")).await.unwrap();
        store.put(record("b@example.com", "2026-01-01T00:01:00.000Z")).await.unwrap();

        assert_eq!(store.increment_attempts("a@example.com", 2).await.unwrap(), Some(1));
        assert_eq!(store.increment_attempts("a@example.com", 2).await.unwrap(), Some(2));
        assert_eq!(store.increment_attempts("a@example.com", 2).await.unwrap(), None);
        assert_eq!(store.increment_attempts("nobody@example.com", 2).await.unwrap(), None);

        let purged = store.purge_expired("2026-01-01T00:05:00.000Z").await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get("b@example.com").await.unwrap().is_none());

        // A new code resets the attempt counter.
        store.put(record("a@example.com", "2026-01-01T00:20:00.000Z")).await.unwrap();
        assert_eq!(store.get("a@example.com").await.unwrap().unwrap().attempts, 0);

        assert!(store.remove("a@example.com").await.unwrap());
        assert!(!store.remove("a@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn in_memory_consume_checks_code_and_expiry() {
        let store = InMemoryOtpStore::new();
        store.put(record("a@example.com", "2026-01-01T00:10:00.000Z")).await.unwrap();

        assert!(!store.consume("a@example.com", "654321", "2026-01-01T00:05:00.000Z").await.unwrap());
        assert!(!store.consume("a@example.com", "123456", "2026-01-01T00:10:00.000Z").await.unwrap());
        assert!(store.consume("a@example.com", "123456", "2026-01-01T00:05:00.000Z").await.unwrap());
        assert!(!store.consume("a@example.com", "123456", "2026-01-01T00:05:00.000Z").await.unwrap());
        assert!(store.get("a@example.com").await.unwrap().is_none());
    }
}
