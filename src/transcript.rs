//! Conversation transcript and chat message types.
//!
//! Messages serialize to the OpenAI chat-completions wire format: a plain
//! string for text-only content, an array of typed parts for multimodal
//! content (text + inline base64 image).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

/// One session's conversation history.
///
/// Append-only: message order reflects conversation chronology. Nothing is
/// pruned or persisted, so a long session grows without bound.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: Role::System,
                content: MessageContent::Text(system_prompt.to_string()),
            }],
        }
    }

    pub fn push_user_text(&mut self, text: &str) {
        self.messages.push(ChatMessage {
            role: Role::User,
            content: MessageContent::Text(text.to_string()),
        });
    }

    /// Append a multimodal user message: the text plus one inline image.
    pub fn push_user_with_image(&mut self, text: &str, image_data_url: &str) {
        self.messages.push(ChatMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: text.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_data_url.to_string(),
                    },
                },
            ]),
        });
    }

    pub fn push_assistant(&mut self, text: &str) {
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: MessageContent::Text(text.to_string()),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn starts_with_system_message() {
        let transcript = Transcript::new("You are a health assistant.");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].role, Role::System);
    }

    #[test]
    fn appends_in_order() {
        let mut transcript = Transcript::new("system");
        transcript.push_user_text("first");
        transcript.push_assistant("second");
        transcript.push_user_text("third");

        let roles: Vec<Role> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn text_message_serializes_as_plain_string() {
        let mut transcript = Transcript::new("system");
        transcript.push_user_text("hello");

        let value = serde_json::to_value(&transcript.messages()[1]).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn multimodal_message_matches_wire_shape() {
        let mut transcript = Transcript::new("system");
        transcript.push_user_with_image("what is this?", "data:image/jpeg;base64,QUJD");

        let value = serde_json::to_value(&transcript.messages()[1]).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,QUJD"}},
                ],
            })
        );
    }
}
