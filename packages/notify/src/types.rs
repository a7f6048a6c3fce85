// ABOUTME: Notification entities and the in-process mention event
// ABOUTME: Kinds are coded as kebab-case strings in SQLite

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    StatusChange,
    Mention,
    Comment,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::StatusChange => "status-change",
            NotificationKind::Mention => "mention",
            NotificationKind::Comment => "comment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "status-change" => Some(NotificationKind::StatusChange),
            "mention" => Some(NotificationKind::Mention),
            "comment" => Some(NotificationKind::Comment),
            _ => None,
        }
    }
}

/// A durable notification row addressed to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub entity_type: String,
    pub entity_id: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A user mentioned other users in free text (estimate content,
/// rejection reason). Produced by callers, consumed by the dispatcher.
/// Mentioned users get a mention; the remaining participants get a
/// comment notification.
#[derive(Debug, Clone)]
pub struct MentionEvent {
    pub mentioned: Vec<String>,
    pub participants: Vec<String>,
    pub actor_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            NotificationKind::StatusChange,
            NotificationKind::Mention,
            NotificationKind::Comment,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("broadcast"), None);
    }
}
