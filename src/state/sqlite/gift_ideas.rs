use async_trait::async_trait;
use chrono::Utc;

use super::SqliteStateStore;
use crate::traits::{GiftIdea, NewGiftIdea};

#[async_trait]
impl crate::traits::GiftIdeaStore for SqliteStateStore {
    async fn list_gift_ideas(&self, user_id: &str) -> anyhow::Result<Vec<GiftIdea>> {
        // rowid breaks ties for ideas added within the same timestamp.
        let rows = sqlx::query(
            "SELECT id, user_id, title, description, price, priority, category, \
             relationship_id, date_added \
             FROM gift_ideas WHERE user_id = ? \
             ORDER BY date_added DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_gift_idea).collect())
    }

    async fn insert_gift_idea(
        &self,
        user_id: &str,
        idea: &NewGiftIdea,
    ) -> anyhow::Result<GiftIdea> {
        if idea.title.trim().is_empty() {
            anyhow::bail!("gift idea title must not be empty");
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO gift_ideas (id, user_id, title, description, price, priority, \
             category, relationship_id, date_added) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(idea.title.trim())
        .bind(&idea.description)
        .bind(&idea.price)
        .bind(idea.priority.as_str())
        .bind(&idea.category)
        .bind(&idea.relationship_id)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(GiftIdea {
            id,
            user_id: user_id.to_string(),
            title: idea.title.trim().to_string(),
            description: idea.description.clone(),
            price: idea.price.clone(),
            priority: idea.priority,
            category: idea.category.clone(),
            relationship_id: idea.relationship_id.clone(),
            date_added: now,
        })
    }

    async fn delete_gift_idea(&self, user_id: &str, id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM gift_ideas WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
