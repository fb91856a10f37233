//! Gift idea dashboard service: store-backed list with a locally cached view.
//!
//! Mutations are single independent store calls. On success the cached list
//! is updated in place (new ideas go to the front, removals are filtered
//! out); on failure the cache is left untouched and the user gets an error
//! notice. Last write wins across concurrent sessions.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::error;

use crate::notice::{Notice, NoticeSink};
use crate::traits::{GiftIdea, GiftIdeaStore, NewGiftIdea};

pub struct GiftIdeaService {
    store: Arc<dyn GiftIdeaStore>,
    user_id: String,
    notices: NoticeSink,
    ideas: RwLock<Vec<GiftIdea>>,
}

impl GiftIdeaService {
    pub fn new(store: Arc<dyn GiftIdeaStore>, user_id: &str, notices: NoticeSink) -> Self {
        Self {
            store,
            user_id: user_id.to_string(),
            notices,
            ideas: RwLock::new(Vec::new()),
        }
    }

    /// Load all ideas for the principal, newest first.
    pub async fn refresh(&self) -> anyhow::Result<Vec<GiftIdea>> {
        match self.store.list_gift_ideas(&self.user_id).await {
            Ok(list) => {
                *self.ideas.write().await = list.clone();
                Ok(list)
            }
            Err(e) => {
                error!("Failed to load gift ideas: {:#}", e);
                self.notices
                    .push(Notice::error("Error", "Failed to load gift ideas"));
                Err(e)
            }
        }
    }

    pub async fn ideas(&self) -> Vec<GiftIdea> {
        self.ideas.read().await.clone()
    }

    /// Returns the stored idea, or None when validation fails locally.
    pub async fn add(&self, new: NewGiftIdea) -> anyhow::Result<Option<GiftIdea>> {
        if new.title.trim().is_empty() {
            self.notices
                .push(Notice::error("Missing title", "A gift idea needs a title"));
            return Ok(None);
        }

        match self.store.insert_gift_idea(&self.user_id, &new).await {
            Ok(idea) => {
                self.ideas.write().await.insert(0, idea.clone());
                self.notices
                    .push(Notice::success("Gift idea added", &idea.title));
                Ok(Some(idea))
            }
            Err(e) => {
                error!("Failed to add gift idea: {:#}", e);
                self.notices
                    .push(Notice::error("Error", "Failed to add gift idea"));
                Err(e)
            }
        }
    }

    pub async fn remove(&self, id: &str) -> anyhow::Result<()> {
        match self.store.delete_gift_idea(&self.user_id, id).await {
            Ok(()) => {
                self.ideas.write().await.retain(|idea| idea.id != id);
                self.notices
                    .push(Notice::success("Gift idea removed", "The idea was deleted"));
                Ok(())
            }
            Err(e) => {
                error!("Failed to remove gift idea: {:#}", e);
                self.notices
                    .push(Notice::error("Error", "Failed to remove gift idea"));
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
    use crate::traits::Priority;

    async fn setup() -> (GiftIdeaService, tokio::sync::mpsc::Receiver<Notice>, tempfile::NamedTempFile) {
        let db_file = tempfile::NamedTempFile::new().unwrap();
        let store = SqliteStateStore::new(db_file.path().to_str().unwrap())
            .await
            .unwrap();
        let (sink, rx) = NoticeSink::channel(16);
        (
            GiftIdeaService::new(Arc::new(store), "u1", sink),
            rx,
            db_file,
        )
    }

    fn idea(title: &str) -> NewGiftIdea {
        NewGiftIdea {
            title: title.to_string(),
            priority: Priority::Low,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn add_prepends_to_the_cached_list_and_notifies() {
        let (service, mut rx, _db) = setup().await;
        service.refresh().await.unwrap();

        service.add(idea("Book")).await.unwrap();
        let second = service.add(idea("Scarf")).await.unwrap().unwrap();

        let cached = service.ideas().await;
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].id, second.id);

        assert_eq!(rx.recv().await.unwrap().level, NoticeLevel::Success);
        assert_eq!(rx.recv().await.unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn blank_title_is_a_local_validation_failure() {
        let (service, mut rx, _db) = setup().await;
        let result = service.add(idea("  ")).await.unwrap();
        assert!(result.is_none());
        assert!(service.ideas().await.is_empty());
        assert_eq!(rx.recv().await.unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn remove_filters_the_cached_list() {
        let (service, mut rx, _db) = setup().await;
        let kept = service.add(idea("Book")).await.unwrap().unwrap();
        let gone = service.add(idea("Scarf")).await.unwrap().unwrap();

        service.remove(&gone.id).await.unwrap();

        let cached = service.ideas().await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, kept.id);

        // add, add, remove.
        for _ in 0..3 {
            assert!(rx.recv().await.is_some());
        }
    }

    #[tokio::test]
    async fn refresh_matches_the_cache_after_mutations() {
        let (service, _rx, _db) = setup().await;
        service.add(idea("Book")).await.unwrap();
        let added = service.add(idea("Scarf")).await.unwrap().unwrap();
        service.remove(&added.id).await.unwrap();

        let cached = service.ideas().await;
        let reloaded = service.refresh().await.unwrap();
        assert_eq!(cached, reloaded);
    }
}
