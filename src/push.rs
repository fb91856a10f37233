//! Browser notification permission surface.
//!
//! The dashboard mirrors the browser's three-valued notification permission
//! and offers a fixed test notification so users can check their setup.

/// Permission state reported by the browser Notification API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionState {
    /// The user has not been asked yet.
    #[default]
    Default,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "granted" => Self::Granted,
            "denied" => Self::Denied,
            _ => Self::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }

    /// True when a notification may actually be shown.
    pub fn can_notify(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// What a desktop notification displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: &'static str,
    pub body: &'static str,
    pub icon: &'static str,
}

/// The fixed payload used for the "send me a test notification" button.
pub fn test_notification() -> NotificationPayload {
    NotificationPayload {
        title: "Kindred test notification",
        body: "Notifications are working! You'll hear from us at your reminder time.",
        icon: "/favicon.ico",
    }
}
