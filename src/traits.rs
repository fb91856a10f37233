use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated end-user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

/// Per-user notification toggles and reminder time. Exactly 0 or 1 row per
/// principal; absence is repaired by inserting the default row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub user_id: String,
    pub email_reminders: bool,
    pub push_notifications: bool,
    pub birthday_reminders: bool,
    pub anniversary_reminders: bool,
    pub nudge_reminders: bool,
    pub date_ideas: bool,
    /// Minute precision ("HH:MM"). Stored with seconds precision in the DB.
    pub reminder_time: String,
}

impl NotificationPreferences {
    /// Defaults for a first-time user: every reminder type on, push off.
    pub fn default_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email_reminders: true,
            push_notifications: false,
            birthday_reminders: true,
            anniversary_reminders: true,
            nudge_reminders: true,
            date_ideas: true,
            reminder_time: "09:00".to_string(),
        }
    }

    /// Merge a patch into this copy (the optimistic local-state update done
    /// after a successful partial write).
    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(v) = patch.email_reminders {
            self.email_reminders = v;
        }
        if let Some(v) = patch.push_notifications {
            self.push_notifications = v;
        }
        if let Some(v) = patch.birthday_reminders {
            self.birthday_reminders = v;
        }
        if let Some(v) = patch.anniversary_reminders {
            self.anniversary_reminders = v;
        }
        if let Some(v) = patch.nudge_reminders {
            self.nudge_reminders = v;
        }
        if let Some(v) = patch.date_ideas {
            self.date_ideas = v;
        }
        if let Some(t) = &patch.reminder_time {
            // Keep the caller-facing minute precision even if the patch
            // carried seconds.
            self.reminder_time = t.chars().take(5).collect();
        }
    }
}

/// Partial-field update for a preferences row. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    pub email_reminders: Option<bool>,
    pub push_notifications: Option<bool>,
    pub birthday_reminders: Option<bool>,
    pub anniversary_reminders: Option<bool>,
    pub nudge_reminders: Option<bool>,
    pub date_ideas: Option<bool>,
    /// "HH:MM".
    pub reminder_time: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

/// A stored gift idea. `relationship_id` is a weak reference to a person;
/// no referential integrity is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftIdea {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub priority: Priority,
    pub category: Option<String>,
    pub relationship_id: Option<String>,
    pub date_added: DateTime<Utc>,
}

/// Fields supplied when creating a gift idea.
#[derive(Debug, Clone, Default)]
pub struct NewGiftIdea {
    pub title: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub priority: Priority,
    pub category: Option<String>,
    pub relationship_id: Option<String>,
}

/// Someone in the owner's circle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub relationship: String,
    pub email: Option<String>,
    /// "YYYY-MM-DD" or "MM-DD".
    pub birthday: Option<String>,
    pub anniversary: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPerson {
    pub name: String,
    pub relationship: String,
    pub email: Option<String>,
    pub birthday: Option<String>,
    pub anniversary: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Birthday,
    Anniversary,
}

/// A birthday or anniversary coming up within the queried window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingDate {
    pub kind: DateKind,
    pub in_days: i64,
}

/// Notification preferences persistence.
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    /// Fetch the row for `user_id`, inserting the default row if absent.
    async fn get_or_init_preferences(
        &self,
        user_id: &str,
    ) -> anyhow::Result<NotificationPreferences>;

    /// Write only the fields present in `patch`, scoped to `user_id`.
    async fn update_preferences(
        &self,
        user_id: &str,
        patch: &PreferencesPatch,
    ) -> anyhow::Result<()>;
}

/// Gift idea persistence, scoped by owning principal.
#[async_trait]
pub trait GiftIdeaStore: Send + Sync {
    /// All ideas belonging to `user_id`, newest first.
    async fn list_gift_ideas(&self, user_id: &str) -> anyhow::Result<Vec<GiftIdea>>;

    async fn insert_gift_idea(
        &self,
        user_id: &str,
        idea: &NewGiftIdea,
    ) -> anyhow::Result<GiftIdea>;

    /// Delete by id. Ownership is enforced here: a foreign id is a no-op.
    async fn delete_gift_idea(&self, user_id: &str, id: &str) -> anyhow::Result<()>;
}

/// People persistence, scoped by owning principal.
#[async_trait]
pub trait PeopleStore: Send + Sync {
    async fn list_people(&self, user_id: &str) -> anyhow::Result<Vec<Person>>;

    async fn get_person(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Person>>;

    async fn insert_person(&self, user_id: &str, person: &NewPerson) -> anyhow::Result<Person>;

    async fn delete_person(&self, user_id: &str, id: &str) -> anyhow::Result<()>;

    /// People whose birthday or anniversary falls within the next
    /// `within_days` days (inclusive, today counts as 0).
    async fn people_with_upcoming_dates(
        &self,
        user_id: &str,
        within_days: i64,
    ) -> anyhow::Result<Vec<(Person, UpcomingDate)>>;
}
