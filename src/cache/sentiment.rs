use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::db::{CacheEntry, Database};
use crate::models::{RequestContext, SentimentAnalysisResult};
use crate::settings::CacheSettings;

/// SHA-256 of the message body, hex encoded.
pub fn hash_message(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Content-addressed store of finished analyses.
///
/// By default identical text from any sender shares one entry. With
/// `scope_by_room` the room id is folded into the key so rooms never share.
#[derive(Clone)]
pub struct SentimentCache {
    db: Database,
    ttl: Duration,
    scope_by_room: bool,
}

impl SentimentCache {
    pub fn new(db: Database, settings: &CacheSettings) -> Self {
        Self {
            db,
            ttl: settings.ttl(),
            scope_by_room: settings.scope_by_room,
        }
    }

    pub fn key_for(&self, text: &str, room_id: &str) -> String {
        if self.scope_by_room {
            let mut hasher = Sha256::new();
            hasher.update(room_id.as_bytes());
            hasher.update([0u8]);
            hasher.update(text.as_bytes());
            hex::encode(hasher.finalize())
        } else {
            hash_message(text)
        }
    }

    pub async fn lookup(
        &self,
        text: &str,
        room_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>> {
        let key = self.key_for(text, room_id);
        self.db.get_cache_entry(&key, now).await
    }

    pub async fn store(
        &self,
        text: &str,
        embedding: Vec<f32>,
        result: &SentimentAnalysisResult,
        request: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry {
            message_hash: self.key_for(text, &request.room_id),
            embedding,
            sentiment: result.score.score,
            category: result.score.category,
            confidence: result.score.confidence,
            context: result.context,
            user_id: request.user_id.clone(),
            room_id: request.room_id.clone(),
            sender_name: request.sender_name.clone(),
            created_at: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.db.upsert_cache_entry(&entry).await?;
        Ok(entry)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.db.delete_expired_cache_entries(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisContext, SentimentCategory, SentimentScore};

    fn result() -> SentimentAnalysisResult {
        SentimentAnalysisResult {
            score: SentimentScore {
                score: 0.5,
                category: SentimentCategory::StronglyBullish,
                confidence: 0.75,
            },
            context: AnalysisContext::flat(SentimentCategory::Neutral),
        }
    }

    fn cache(scope_by_room: bool) -> SentimentCache {
        let settings = CacheSettings {
            ttl_secs: 60,
            scope_by_room,
            db_path: None,
        };
        SentimentCache::new(Database::in_memory().unwrap(), &settings)
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_message("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn round_trip_then_expiry() {
        let cache = cache(false);
        let now = Utc::now();
        let stored = cache
            .store("to the moon", vec![1.0], &result(), &RequestContext::new("u1", "r1"), now)
            .await
            .unwrap();

        let hit = cache
            .lookup("to the moon", "r1", now)
            .await
            .unwrap()
            .expect("hit");
        assert_eq!(hit.to_result(), result());

        let after = stored.expires_at;
        assert!(cache.lookup("to the moon", "r1", after).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn identical_text_is_shared_across_senders_by_default() {
        let cache = cache(false);
        let now = Utc::now();
        cache
            .store("gm", vec![], &result(), &RequestContext::new("alice", "room-a"), now)
            .await
            .unwrap();

        let other = cache.lookup("gm", "room-b", now).await.unwrap().expect("shared");
        assert_eq!(other.user_id, "alice");
    }

    #[tokio::test]
    async fn room_scoped_keys_do_not_collide() {
        let cache = cache(true);
        let now = Utc::now();
        cache
            .store("gm", vec![], &result(), &RequestContext::new("alice", "room-a"), now)
            .await
            .unwrap();

        assert!(cache.lookup("gm", "room-b", now).await.unwrap().is_none());
        assert!(cache.lookup("gm", "room-a", now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unbounded_ttl_never_expires() {
        let settings = CacheSettings {
            ttl_secs: u64::MAX,
            ..CacheSettings::default()
        };
        let cache = SentimentCache::new(Database::in_memory().unwrap(), &settings);
        let now = Utc::now();

        let stored = cache
            .store("hodl", vec![], &result(), &RequestContext::new("u1", "r1"), now)
            .await
            .unwrap();

        assert_eq!(stored.expires_at, DateTime::<Utc>::MAX_UTC);
        let later = now + Duration::days(365 * 100);
        assert!(cache.lookup("hodl", "r1", later).await.unwrap().is_some());
    }
}
