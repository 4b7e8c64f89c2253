//! Conversation: the ordered message history of one app or session.
//!
//! Insertion order is the sole timeline of truth. Deferred bot turns
//! (composed during simulated typing latency, or completing a simulated
//! provider round-trip) carry the epoch they were scheduled under; a stale
//! epoch means the conversation was torn down or switched away from in the
//! meantime, and the deferred effect is discarded rather than applied.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::message::{Message, Role};
use super::payload::Payload;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
    epoch: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Current liveness epoch. Deferred completions must capture this at
    /// scheduling time and present it back in `apply_bot_turn`.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Invalidate every pending deferred completion for this conversation.
    /// Called when the wizard switches away from the owning app/session.
    pub fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    /// Append a user turn. No latency, no epoch check: user actions are
    /// always live.
    pub fn append_user_turn(&mut self, content: Vec<Payload>) -> &Message {
        self.messages.push(Message::user(content));
        self.messages.last().expect("just pushed")
    }

    /// Apply a bot turn scheduled under `scheduled_epoch`. Returns whether
    /// the turn was actually appended; a stale epoch is discarded.
    pub fn apply_bot_turn(&mut self, scheduled_epoch: u64, content: Vec<Payload>) -> bool {
        if scheduled_epoch != self.epoch {
            debug!(
                scheduled_epoch,
                current_epoch = self.epoch,
                "Discarding stale bot turn"
            );
            return false;
        }
        self.messages.push(Message::bot(content));
        true
    }

    /// Replace the content of the most recent bot message in place.
    ///
    /// Only used to transition a `*-loading` payload into its results.
    /// Silent no-op when no bot message exists yet; calling twice with the
    /// same content is indistinguishable from calling once.
    pub fn replace_last_bot_turn(&mut self, content: Vec<Payload>) {
        match self.messages.iter_mut().rev().find(|m| m.role == Role::Bot) {
            Some(msg) => msg.content = content,
            None => debug!("replace_last_bot_turn with no bot message; ignoring"),
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::payload::Payload;

    #[test]
    fn user_turns_append_immediately() {
        let mut convo = Conversation::new();
        convo.append_user_turn(vec![Payload::SkipNotice]);
        assert_eq!(convo.len(), 1);
        assert_eq!(convo.last_message().unwrap().role, Role::User);
    }

    #[test]
    fn live_bot_turn_applies() {
        let mut convo = Conversation::new();
        let epoch = convo.epoch();
        assert!(convo.apply_bot_turn(epoch, vec![Payload::Welcome]));
        assert_eq!(convo.len(), 1);
    }

    #[test]
    fn stale_bot_turn_is_discarded() {
        let mut convo = Conversation::new();
        let epoch = convo.epoch();
        convo.bump_epoch();
        assert!(!convo.apply_bot_turn(epoch, vec![Payload::Welcome]));
        assert!(convo.is_empty());
    }

    #[test]
    fn replace_targets_most_recent_bot_message() {
        let mut convo = Conversation::new();
        let epoch = convo.epoch();
        convo.apply_bot_turn(
            epoch,
            vec![Payload::AppSearchLoading {
                query: "candy".to_string(),
                platform: crate::steps::Platform::Ios,
            }],
        );
        convo.append_user_turn(vec![Payload::UserText {
            body: "hurry up".to_string(),
        }]);

        convo.replace_last_bot_turn(vec![Payload::DetectionResult { detected: true }]);

        let bot = &convo.messages()[0];
        assert_eq!(bot.role, Role::Bot);
        assert_eq!(
            bot.content,
            vec![Payload::DetectionResult { detected: true }]
        );
        // User message untouched
        assert_eq!(convo.messages()[1].role, Role::User);
    }

    #[test]
    fn replace_with_no_bot_message_is_noop() {
        let mut convo = Conversation::new();
        convo.append_user_turn(vec![Payload::SkipNotice]);
        convo.replace_last_bot_turn(vec![Payload::Welcome]);
        assert_eq!(convo.len(), 1);
        assert_eq!(convo.last_message().unwrap().role, Role::User);
    }

    #[test]
    fn replace_twice_is_idempotent() {
        let mut convo = Conversation::new();
        let epoch = convo.epoch();
        convo.apply_bot_turn(epoch, vec![Payload::Welcome]);

        let replacement = vec![Payload::DetectionResult { detected: false }];
        convo.replace_last_bot_turn(replacement.clone());
        let after_once: Vec<_> = convo.messages().to_vec();

        convo.replace_last_bot_turn(replacement);
        assert_eq!(convo.len(), after_once.len());
        assert_eq!(
            convo.messages()[0].content,
            after_once[0].content
        );
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut convo = Conversation::new();
        let epoch = convo.epoch();
        convo.apply_bot_turn(epoch, vec![Payload::Welcome]);
        convo.append_user_turn(vec![Payload::Confirmation { accepted: true }]);
        convo.apply_bot_turn(epoch, vec![Payload::EnvironmentSelect]);

        let roles: Vec<Role> = convo.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Bot, Role::User, Role::Bot]);
    }
}
