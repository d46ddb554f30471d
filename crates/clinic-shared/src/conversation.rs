//! Conversation model and history windowing.
//!
//! Every stage that accepts history sees the same rendering: the trailing
//! `HISTORY_WINDOW` messages, one speaker-labelled line each. Older messages
//! are skipped, never mutated.

use serde::{Deserialize, Serialize};

/// Number of trailing messages any stage may consult
pub const HISTORY_WINDOW: usize = 6;

/// Marker sent instead of an empty history block
pub const NO_PREVIOUS_CONVERSATION: &str = "No previous conversation.";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when rendering history lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered conversation history, oldest first.
///
/// Supplied fresh by the caller on every turn; the core never stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
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

    /// Trailing window of at most `HISTORY_WINDOW` messages.
    ///
    /// Messages with blank content are skipped before windowing, matching
    /// what a caller would have displayed.
    pub fn window(&self) -> Vec<&Message> {
        let visible: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .collect();
        let skip = visible.len().saturating_sub(HISTORY_WINDOW);
        visible.into_iter().skip(skip).collect()
    }

    /// Render the window as speaker-labelled lines.
    ///
    /// An empty window renders as `NO_PREVIOUS_CONVERSATION` so classifier
    /// and generator prompts never receive an empty block.
    pub fn render_window(&self) -> String {
        let window = self.window();
        if window.is_empty() {
            return NO_PREVIOUS_CONVERSATION.to_string();
        }

        let mut out = String::new();
        for msg in window {
            out.push_str(msg.role.label());
            out.push_str(": ");
            out.push_str(&msg.content);
            out.push('\n');
        }
        out
    }
}

impl From<Vec<Message>> for ConversationHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self::from_messages(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_renders_marker() {
        let history = ConversationHistory::new();
        assert_eq!(history.render_window(), NO_PREVIOUS_CONVERSATION);
    }

    #[test]
    fn test_render_labels_roles() {
        let history = ConversationHistory::from_messages(vec![
            Message::user("Which clinics are open on Friday?"),
            Message::assistant("Cardiology and dermatology."),
        ]);
        assert_eq!(
            history.render_window(),
            "User: Which clinics are open on Friday?\nAssistant: Cardiology and dermatology.\n"
        );
    }

    #[test]
    fn test_window_keeps_last_six() {
        let mut history = ConversationHistory::new();
        for i in 0..10 {
            history.push(Message::user(format!("question {}", i)));
        }

        let window = history.window();
        assert_eq!(window.len(), HISTORY_WINDOW);
        assert_eq!(window[0].content, "question 4");
        assert_eq!(window[5].content, "question 9");

        // Original history untouched
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn test_blank_messages_skipped() {
        let history = ConversationHistory::from_messages(vec![
            Message::user("hello"),
            Message::assistant("   "),
        ]);
        assert_eq!(history.window().len(), 1);
        assert_eq!(history.render_window(), "User: hello\n");
    }

    #[test]
    fn test_serde_roundtrip_is_plain_array() {
        let history = ConversationHistory::from_messages(vec![Message::user("hi")]);
        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(json, r#"[{"role":"user","content":"hi"}]"#);
    }
}
