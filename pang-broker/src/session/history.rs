//! Per-connection chat histories.
//!
//! A connection holds any number of chats, keyed by a client-chosen id. Each
//! chat is an ordered message sequence that is replayed verbatim to the
//! backend. Sequences only grow, except through the explicit operations
//! below (reset, delete, replace, import).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::message::Message;

/// How a bulk import combines with the chats already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Drop every existing chat, then install the imported ones.
    Replace,
    /// Keep existing chats; imported ids overwrite colliding ones.
    Merge,
}

impl ImportMode {
    /// Label used by older clients for replace mode.
    pub const LEGACY_REPLACE_LABEL: &'static str = "Remove all chatbots and import";

    /// Parse a client-supplied mode. Anything unrecognized merges.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("replace") || label == Self::LEGACY_REPLACE_LABEL {
            Self::Replace
        } else {
            Self::Merge
        }
    }
}

/// Mapping from chat id to message sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistories(BTreeMap<String, Vec<Message>>);

impl ChatHistories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an empty sequence for `chat_id` unless one exists.
    pub fn ensure(&mut self, chat_id: &str) -> &mut Vec<Message> {
        self.0.entry(chat_id.to_string()).or_default()
    }

    /// Append to a chat, creating it first if needed.
    pub fn append(&mut self, chat_id: &str, message: Message) {
        self.ensure(chat_id).push(message);
    }

    /// Truncate a chat to empty. The id stays active.
    pub fn reset(&mut self, chat_id: &str) {
        self.0.insert(chat_id.to_string(), Vec::new());
    }

    /// Remove a chat entirely. Returns whether it existed.
    pub fn delete(&mut self, chat_id: &str) -> bool {
        self.0.remove(chat_id).is_some()
    }

    /// Replace one chat's sequence wholesale.
    pub fn replace(&mut self, chat_id: &str, messages: Vec<Message>) {
        self.0.insert(chat_id.to_string(), messages);
    }

    /// Install a set of imported chats.
    pub fn import(&mut self, chats: ChatHistories, mode: ImportMode) {
        match mode {
            ImportMode::Replace => *self = chats,
            ImportMode::Merge => self.0.extend(chats.0),
        }
    }

    /// Remove the last message of a chat if it equals `expected`.
    pub fn remove_last_if(&mut self, chat_id: &str, expected: &Message) -> bool {
        match self.0.get_mut(chat_id) {
            Some(messages) if messages.last() == Some(expected) => {
                messages.pop();
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, chat_id: &str) -> Option<&[Message]> {
        self.0.get(chat_id).map(Vec::as_slice)
    }

    /// Copy of a chat's sequence; empty when the chat is absent.
    pub fn history(&self, chat_id: &str) -> Vec<Message> {
        self.0.get(chat_id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, chat_id: &str) -> bool {
        self.0.contains_key(chat_id)
    }

    /// Ids of every chat present, including empty ones.
    pub fn active_ids(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Message>)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Vec<Message>)> for ChatHistories {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Message>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chats(entries: &[(&str, Vec<Message>)]) -> ChatHistories {
        entries
            .iter()
            .map(|(id, messages)| (id.to_string(), messages.clone()))
            .collect()
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut histories = ChatHistories::new();
        histories.append("c1", Message::user("hi"));

        histories.ensure("c1");
        histories.ensure("c1");

        assert_eq!(histories.history("c1"), vec![Message::user("hi")]);
    }

    #[test]
    fn test_reset_keeps_id_active() {
        let mut histories = ChatHistories::new();
        histories.append("c1", Message::user("hi"));
        histories.reset("c1");

        assert!(histories.history("c1").is_empty());
        assert_eq!(histories.active_ids(), vec!["c1".to_string()]);
    }

    #[test]
    fn test_delete_removes_id() {
        let mut histories = ChatHistories::new();
        histories.append("c1", Message::user("hi"));

        assert!(histories.delete("c1"));
        assert!(!histories.delete("c1"));
        assert!(histories.active_ids().is_empty());
    }

    #[test]
    fn test_reset_then_append_reactivates() {
        let mut histories = ChatHistories::new();
        histories.reset("c1");
        histories.append("c1", Message::system("note"));
        assert_eq!(histories.get("c1").map(<[Message]>::len), Some(1));
    }

    #[test]
    fn test_import_replace_discards_existing() {
        let mut histories = chats(&[("old", vec![Message::user("a")])]);
        histories.import(
            chats(&[("new", vec![Message::user("b")])]),
            ImportMode::Replace,
        );

        assert_eq!(histories.active_ids(), vec!["new".to_string()]);
    }

    #[test]
    fn test_import_merge_overwrites_collisions_and_keeps_others() {
        let mut histories = chats(&[
            ("keep", vec![Message::user("kept")]),
            ("shared", vec![Message::user("old"), Message::assistant("old reply")]),
        ]);
        histories.import(
            chats(&[("shared", vec![Message::system("new")])]),
            ImportMode::Merge,
        );

        assert_eq!(histories.history("keep"), vec![Message::user("kept")]);
        assert_eq!(histories.history("shared"), vec![Message::system("new")]);
    }

    #[test]
    fn test_import_mode_labels() {
        assert_eq!(ImportMode::from_label("replace"), ImportMode::Replace);
        assert_eq!(
            ImportMode::from_label("Remove all chatbots and import"),
            ImportMode::Replace
        );
        assert_eq!(
            ImportMode::from_label("Merge/Update existing chats"),
            ImportMode::Merge
        );
        assert_eq!(ImportMode::from_label(""), ImportMode::Merge);
    }

    #[test]
    fn test_remove_last_if_only_matching() {
        let mut histories = ChatHistories::new();
        histories.append("c1", Message::user("one"));
        histories.append("c1", Message::user("two"));

        assert!(!histories.remove_last_if("c1", &Message::user("one")));
        assert!(histories.remove_last_if("c1", &Message::user("two")));
        assert_eq!(histories.history("c1"), vec![Message::user("one")]);
        assert!(!histories.remove_last_if("missing", &Message::user("one")));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let histories = chats(&[("c1", vec![Message::user("hi")])]);
        let value = serde_json::to_value(&histories).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"c1": [{"role": "user", "content": "hi"}]})
        );

        let parsed: ChatHistories = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, histories);
    }
}
