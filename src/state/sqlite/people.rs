use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};

use super::SqliteStateStore;
use crate::traits::{DateKind, NewPerson, Person, UpcomingDate};

/// Days from `today` until the next occurrence of a stored date. Accepts
/// "YYYY-MM-DD" and "MM-DD"; the year, when present, is ignored.
fn days_until(value: &str, today: NaiveDate) -> Option<i64> {
    let parts: Vec<&str> = value.trim().split('-').collect();
    let (month, day) = match parts.as_slice() {
        [_, m, d] => (m.parse::<u32>().ok()?, d.parse::<u32>().ok()?),
        [m, d] => (m.parse::<u32>().ok()?, d.parse::<u32>().ok()?),
        _ => return None,
    };

    let occurrence_in = |year: i32| {
        // Feb 29 in a non-leap year observes on Mar 1.
        NaiveDate::from_ymd_opt(year, month, day)
            .or_else(|| {
                if month == 2 && day == 29 {
                    NaiveDate::from_ymd_opt(year, 3, 1)
                } else {
                    None
                }
            })
            .map(|date| (date - today).num_days())
    };

    let this_year = occurrence_in(today.year())?;
    if this_year >= 0 {
        Some(this_year)
    } else {
        occurrence_in(today.year() + 1)
    }
}

#[async_trait]
impl crate::traits::PeopleStore for SqliteStateStore {
    async fn list_people(&self, user_id: &str) -> anyhow::Result<Vec<Person>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, relationship, email, birthday, anniversary, \
             notes, tags_json, created_at \
             FROM people WHERE user_id = ? ORDER BY name ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_person).collect())
    }

    async fn get_person(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Person>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, relationship, email, birthday, anniversary, \
             notes, tags_json, created_at \
             FROM people WHERE user_id = ? AND id = ?",
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::row_to_person(&r)))
    }

    async fn insert_person(&self, user_id: &str, person: &NewPerson) -> anyhow::Result<Person> {
        if person.name.trim().is_empty() {
            anyhow::bail!("person name must not be empty");
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let tags_json = serde_json::to_string(&person.tags)?;
        sqlx::query(
            "INSERT INTO people (id, user_id, name, relationship, email, birthday, \
             anniversary, notes, tags_json, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(person.name.trim())
        .bind(&person.relationship)
        .bind(&person.email)
        .bind(&person.birthday)
        .bind(&person.anniversary)
        .bind(&person.notes)
        .bind(&tags_json)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Person {
            id,
            user_id: user_id.to_string(),
            name: person.name.trim().to_string(),
            relationship: person.relationship.clone(),
            email: person.email.clone(),
            birthday: person.birthday.clone(),
            anniversary: person.anniversary.clone(),
            notes: person.notes.clone(),
            tags: person.tags.clone(),
            created_at: now,
        })
    }

    async fn delete_person(&self, user_id: &str, id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM people WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn people_with_upcoming_dates(
        &self,
        user_id: &str,
        within_days: i64,
    ) -> anyhow::Result<Vec<(Person, UpcomingDate)>> {
        // Date strings come in mixed formats, so the window filter runs here
        // rather than in SQL.
        let people = self.list_people(user_id).await?;
        let today = Utc::now().date_naive();

        let mut results = Vec::new();
        for person in people {
            let candidates = [
                (DateKind::Birthday, person.birthday.clone()),
                (DateKind::Anniversary, person.anniversary.clone()),
            ];
            for (kind, value) in candidates {
                let Some(value) = value else { continue };
                if let Some(in_days) = days_until(&value, today) {
                    if (0..=within_days).contains(&in_days) {
                        results.push((person.clone(), UpcomingDate { kind, in_days }));
                    }
                }
            }
        }

        results.sort_by_key(|(_, upcoming)| upcoming.in_days);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_until_accepts_both_formats() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(days_until("03-15", today), Some(5));
        assert_eq!(days_until("2000-03-15", today), Some(5));
        assert_eq!(days_until("03-10", today), Some(0));
    }

    #[test]
    fn days_until_wraps_to_next_year() {
        let today = NaiveDate::from_ymd_opt(2026, 12, 30).unwrap();
        assert_eq!(days_until("01-02", today), Some(3));
    }

    #[test]
    fn days_until_observes_leap_day_on_march_first() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();
        // 2026 is not a leap year, so Feb 29 observes on Mar 1.
        assert_eq!(days_until("02-29", today), Some(2));
    }

    #[test]
    fn days_until_rejects_garbage() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(days_until("soon", today), None);
        assert_eq!(days_until("13-40", today), None);
        assert_eq!(days_until("", today), None);
    }
}
