use serde::{Deserialize, Serialize};

/// One entry in a [`Session`](crate::session::Session)'s conversation
/// history, or one message of an LLM request. Plain text only — the
/// dialogue pipeline has no tool-calling turn, so there is no `Parts`/
/// `ContentPart` split here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// A committed history entry. Distinct from [`Message`] because history
/// only ever holds `user`/`assistant` speakers (invariant 5, spec §3) —
/// the system prompt is never part of `history` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl HistoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self.speaker, Speaker::Assistant)
    }
}

/// Render a `(system, history, user)` triple as the ordered message list
/// the LLM contract expects (spec §4.5: history passed as `(role, content)`).
pub fn to_llm_messages(system_prompt: &str, history: &[HistoryEntry], user_message: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt));
    for entry in history {
        messages.push(match entry.speaker {
            Speaker::User => Message::user(entry.text.clone()),
            Speaker::Assistant => Message::assistant(entry.text.clone()),
        });
    }
    if !user_message.is_empty() {
        messages.push(Message::user(user_message));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_llm_messages_prepends_system_prompt() {
        let history = vec![HistoryEntry::user("hi")];
        let messages = to_llm_messages("be nice", &history, "how are you");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].content, "how are you");
    }

    #[test]
    fn empty_user_message_is_not_appended() {
        // The initial greeting turn sends userMessage = "" (spec §4.7).
        let history: Vec<HistoryEntry> = vec![];
        let messages = to_llm_messages("greet the caller", &history, "");
        assert_eq!(messages.len(), 1);
    }
}
