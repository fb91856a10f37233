use async_trait::async_trait;
use chrono::Utc;

use super::SqliteStateStore;
use crate::traits::{NotificationPreferences, PreferencesPatch};

/// "HH:MM" from the caller, "HH:MM:SS" in the row.
fn to_stored_time(t: &str) -> String {
    if t.len() == 5 {
        format!("{}:00", t)
    } else {
        t.to_string()
    }
}

#[async_trait]
impl crate::traits::PreferencesStore for SqliteStateStore {
    async fn get_or_init_preferences(
        &self,
        user_id: &str,
    ) -> anyhow::Result<NotificationPreferences> {
        let row = sqlx::query(
            "SELECT user_id, email_reminders, push_notifications, birthday_reminders, \
             anniversary_reminders, nudge_reminders, date_ideas, reminder_time \
             FROM notification_preferences WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(Self::row_to_preferences(&row));
        }

        // First access: repair the missing row with the defaults. INSERT OR
        // IGNORE keeps this safe against a concurrent first access.
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR IGNORE INTO notification_preferences (user_id, created_at, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT user_id, email_reminders, push_notifications, birthday_reminders, \
             anniversary_reminders, nudge_reminders, date_ideas, reminder_time \
             FROM notification_preferences WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_preferences(&row))
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        patch: &PreferencesPatch,
    ) -> anyhow::Result<()> {
        // The row must exist before a partial update can land.
        self.get_or_init_preferences(user_id).await?;

        let now = Utc::now().to_rfc3339();
        // COALESCE keeps every column the patch leaves unset.
        sqlx::query(
            "UPDATE notification_preferences SET
                email_reminders = COALESCE(?, email_reminders),
                push_notifications = COALESCE(?, push_notifications),
                birthday_reminders = COALESCE(?, birthday_reminders),
                anniversary_reminders = COALESCE(?, anniversary_reminders),
                nudge_reminders = COALESCE(?, nudge_reminders),
                date_ideas = COALESCE(?, date_ideas),
                reminder_time = COALESCE(?, reminder_time),
                updated_at = ?
             WHERE user_id = ?",
        )
        .bind(patch.email_reminders)
        .bind(patch.push_notifications)
        .bind(patch.birthday_reminders)
        .bind(patch.anniversary_reminders)
        .bind(patch.nudge_reminders)
        .bind(patch.date_ideas)
        .bind(patch.reminder_time.as_deref().map(to_stored_time))
        .bind(&now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
