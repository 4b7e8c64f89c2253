//! Conversation message record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payload::Payload;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Bot,
    User,
}

/// One turn in an app's (or the session's) conversation.
///
/// Append-only; the single supported in-place mutation is the
/// loading→results content replacement done through
/// [`Conversation::replace_last_bot_turn`](super::Conversation::replace_last_bot_turn).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: Vec<Payload>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn bot(content: Vec<Payload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Bot,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: Vec<Payload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_and_user_constructors_set_role() {
        let bot = Message::bot(vec![Payload::Welcome]);
        assert_eq!(bot.role, Role::Bot);
        assert_eq!(bot.content.len(), 1);

        let user = Message::user(vec![Payload::SkipNotice]);
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn messages_get_distinct_ids() {
        let a = Message::bot(vec![]);
        let b = Message::bot(vec![]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn role_serde() {
        assert_eq!(serde_json::to_string(&Role::Bot).unwrap(), "\"bot\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
