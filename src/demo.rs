//! Demo mode: an unauthenticated, non-persisted trial dataset.
//!
//! Entering demo mode resets the dataset to a fixed sample of three
//! relationships; exiting clears it. All mutations are synchronous and
//! in-memory; nothing here touches the store.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoRelationship {
    pub id: String,
    pub name: String,
    pub relationship: String,
    pub email: Option<String>,
    pub birthday: Option<String>,
    pub anniversary: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDemoRelationship {
    pub name: String,
    pub relationship: String,
    pub email: Option<String>,
    pub birthday: Option<String>,
    pub anniversary: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DemoSession {
    active: bool,
    relationships: Vec<DemoRelationship>,
}

impl DemoSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate demo mode and reset the dataset to the fixed sample.
    pub fn enter(&mut self) {
        self.active = true;
        self.relationships = sample_relationships();
    }

    /// Deactivate demo mode and clear the dataset.
    pub fn exit(&mut self) {
        self.active = false;
        self.relationships.clear();
    }

    pub fn relationships(&self) -> &[DemoRelationship] {
        &self.relationships
    }

    /// Append a record with a timestamp-derived id. Returns the generated
    /// id, or None when demo mode is inactive.
    pub fn add_relationship(&mut self, new: NewDemoRelationship) -> Option<String> {
        if !self.active {
            return None;
        }
        let now = Utc::now();
        let mut id = format!("demo-{}", now.timestamp_millis());
        // Two adds can land on the same millisecond.
        while self.relationships.iter().any(|r| r.id == id) {
            id.push('0');
        }
        self.relationships.push(DemoRelationship {
            id: id.clone(),
            name: new.name,
            relationship: new.relationship,
            email: new.email,
            birthday: new.birthday,
            anniversary: new.anniversary,
            notes: new.notes,
            tags: new.tags,
            created_at: now,
        });
        Some(id)
    }

    /// Drop the record with `id`. Returns whether anything was removed.
    pub fn remove_relationship(&mut self, id: &str) -> bool {
        let before = self.relationships.len();
        self.relationships.retain(|r| r.id != id);
        self.relationships.len() != before
    }
}

fn sample_relationships() -> Vec<DemoRelationship> {
    let now = Utc::now();
    vec![
        DemoRelationship {
            id: "demo-sample-1".to_string(),
            name: "Emma".to_string(),
            relationship: "partner".to_string(),
            email: Some("emma@example.com".to_string()),
            birthday: Some("06-14".to_string()),
            anniversary: Some("09-02".to_string()),
            notes: Some("Loves hiking and oat-milk lattes".to_string()),
            tags: vec!["partner".to_string(), "outdoors".to_string()],
            created_at: now,
        },
        DemoRelationship {
            id: "demo-sample-2".to_string(),
            name: "Mom".to_string(),
            relationship: "family".to_string(),
            email: None,
            birthday: Some("11-28".to_string()),
            anniversary: None,
            notes: Some("Call every Sunday".to_string()),
            tags: vec!["family".to_string()],
            created_at: now,
        },
        DemoRelationship {
            id: "demo-sample-3".to_string(),
            name: "Alex".to_string(),
            relationship: "friend".to_string(),
            email: Some("alex@example.com".to_string()),
            birthday: Some("02-09".to_string()),
            anniversary: None,
            notes: None,
            tags: vec!["friend".to_string(), "college".to_string()],
            created_at: now,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_yields_exactly_three_sample_records() {
        let mut demo = DemoSession::new();
        assert!(!demo.is_active());
        demo.enter();
        assert!(demo.is_active());
        assert_eq!(demo.relationships().len(), 3);
        let names: Vec<&str> = demo.relationships().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Emma", "Mom", "Alex"]);
    }

    #[test]
    fn exit_clears_the_dataset() {
        let mut demo = DemoSession::new();
        demo.enter();
        demo.exit();
        assert!(!demo.is_active());
        assert!(demo.relationships().is_empty());
    }

    #[test]
    fn reenter_resets_to_the_fixed_sample() {
        let mut demo = DemoSession::new();
        demo.enter();
        demo.add_relationship(NewDemoRelationship {
            name: "Sam".to_string(),
            relationship: "friend".to_string(),
            ..Default::default()
        });
        assert_eq!(demo.relationships().len(), 4);
        demo.enter();
        assert_eq!(demo.relationships().len(), 3);
    }

    #[test]
    fn add_then_remove_restores_the_prior_list() {
        let mut demo = DemoSession::new();
        demo.enter();
        let before = demo.relationships().to_vec();
        let id = demo
            .add_relationship(NewDemoRelationship {
                name: "Sam".to_string(),
                relationship: "coworker".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(demo.relationships().len(), 4);
        assert!(demo.remove_relationship(&id));
        assert_eq!(demo.relationships(), before.as_slice());
    }

    #[test]
    fn add_is_refused_while_inactive() {
        let mut demo = DemoSession::new();
        assert!(demo
            .add_relationship(NewDemoRelationship {
                name: "Sam".to_string(),
                ..Default::default()
            })
            .is_none());
        assert!(demo.relationships().is_empty());
    }

    #[test]
    fn rapid_adds_get_distinct_ids() {
        let mut demo = DemoSession::new();
        demo.enter();
        let a = demo
            .add_relationship(NewDemoRelationship {
                name: "A".to_string(),
                ..Default::default()
            })
            .unwrap();
        let b = demo
            .add_relationship(NewDemoRelationship {
                name: "B".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn remove_unknown_id_is_a_noop() {
        let mut demo = DemoSession::new();
        demo.enter();
        assert!(!demo.remove_relationship("demo-nope"));
        assert_eq!(demo.relationships().len(), 3);
    }
}
