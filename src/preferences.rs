//! Notification preferences service.
//!
//! `fetch` repairs a missing row with the defaults; `update` writes only the
//! supplied fields and then optimistically merges them into the cached copy.
//! Write failures leave the cache untouched. No retries.

use std::sync::Arc;

use chrono::NaiveTime;
use tokio::sync::RwLock;
use tracing::error;

use crate::notice::{Notice, NoticeSink};
use crate::traits::{NotificationPreferences, PreferencesPatch, PreferencesStore};

fn is_valid_reminder_time(t: &str) -> bool {
    NaiveTime::parse_from_str(t, "%H:%M").is_ok()
}

pub struct PreferencesService {
    store: Arc<dyn PreferencesStore>,
    user_id: String,
    notices: NoticeSink,
    current: RwLock<Option<NotificationPreferences>>,
}

impl PreferencesService {
    pub fn new(store: Arc<dyn PreferencesStore>, user_id: &str, notices: NoticeSink) -> Self {
        Self {
            store,
            user_id: user_id.to_string(),
            notices,
            current: RwLock::new(None),
        }
    }

    pub async fn fetch(&self) -> anyhow::Result<NotificationPreferences> {
        match self.store.get_or_init_preferences(&self.user_id).await {
            Ok(prefs) => {
                *self.current.write().await = Some(prefs.clone());
                Ok(prefs)
            }
            Err(e) => {
                error!("Failed to load notification preferences: {:#}", e);
                self.notices
                    .push(Notice::error("Error", "Failed to load notification settings"));
                Err(e)
            }
        }
    }

    pub async fn current(&self) -> Option<NotificationPreferences> {
        self.current.read().await.clone()
    }

    /// Returns false when the patch fails validation locally; the cached
    /// copy is only touched after the write succeeds.
    pub async fn update(&self, patch: PreferencesPatch) -> anyhow::Result<bool> {
        if let Some(t) = &patch.reminder_time {
            if !is_valid_reminder_time(t) {
                self.notices.push(Notice::error(
                    "Invalid reminder time",
                    "Use the 24-hour HH:MM format",
                ));
                return Ok(false);
            }
        }

        match self.store.update_preferences(&self.user_id, &patch).await {
            Ok(()) => {
                let mut current = self.current.write().await;
                match current.as_mut() {
                    Some(prefs) => prefs.apply(&patch),
                    None => {
                        // Nothing cached yet; build the merged view from the
                        // defaults the store just repaired with.
                        let mut prefs = NotificationPreferences::default_for(&self.user_id);
                        prefs.apply(&patch);
                        *current = Some(prefs);
                    }
                }
                self.notices
                    .push(Notice::success("Saved", "Notification settings updated"));
                Ok(true)
            }
            Err(e) => {
                error!("Failed to save notification preferences: {:#}", e);
                self.notices
                    .push(Notice::error("Error", "Failed to save notification settings"));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeLevel;
    use crate::state::SqliteStateStore;

    async fn setup() -> (
        PreferencesService,
        tokio::sync::mpsc::Receiver<Notice>,
        tempfile::NamedTempFile,
    ) {
        let db_file = tempfile::NamedTempFile::new().unwrap();
        let store = SqliteStateStore::new(db_file.path().to_str().unwrap())
            .await
            .unwrap();
        let (sink, rx) = NoticeSink::channel(16);
        (
            PreferencesService::new(Arc::new(store), "u1", sink),
            rx,
            db_file,
        )
    }

    #[tokio::test]
    async fn fetch_returns_defaults_and_caches() {
        let (service, _rx, _db) = setup().await;
        assert!(service.current().await.is_none());

        let prefs = service.fetch().await.unwrap();
        assert!(prefs.birthday_reminders);
        assert_eq!(service.current().await, Some(prefs));
    }

    #[tokio::test]
    async fn update_merges_into_the_cache_and_persists() {
        let (service, mut rx, _db) = setup().await;
        service.fetch().await.unwrap();

        let updated = service
            .update(PreferencesPatch {
                birthday_reminders: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(updated);

        let cached = service.current().await.unwrap();
        assert!(!cached.birthday_reminders);
        assert!(cached.email_reminders);

        // A fresh fetch agrees with the optimistic merge.
        let fetched = service.fetch().await.unwrap();
        assert_eq!(fetched, cached);

        assert_eq!(rx.recv().await.unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn invalid_reminder_time_is_rejected_locally() {
        let (service, mut rx, _db) = setup().await;
        service.fetch().await.unwrap();
        let before = service.current().await;

        let updated = service
            .update(PreferencesPatch {
                reminder_time: Some("9am".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!updated);
        assert_eq!(service.current().await, before);
        assert_eq!(rx.recv().await.unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn reminder_time_update_round_trips() {
        let (service, _rx, _db) = setup().await;
        let updated = service
            .update(PreferencesPatch {
                reminder_time: Some("21:30".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(updated);
        assert_eq!(service.current().await.unwrap().reminder_time, "21:30");
        assert_eq!(service.fetch().await.unwrap().reminder_time, "21:30");
    }
}
