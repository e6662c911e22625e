use crate::error::ApiError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const CONNECTION_ERROR_REPLY: &str = "Could not reach the assistant.";

const TEACHER_GREETING: &str = "Hello teacher! I'm here to support your teaching work.";
const STUDENT_GREETING: &str = "Hello student! I'm your virtual assistant, how can I help you today?";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

/// Anything that can answer a chat message on behalf of a role.
#[allow(async_fn_in_trait)]
pub trait Assistant {
    async fn reply(&self, message: &str, role: &str) -> Result<ChatMessage, ApiError>;
}

/// Conversation state behind the chat widget.
pub struct ChatSession<A> {
    assistant: A,
    role: String,
    messages: Vec<ChatMessage>,
    open: bool,
}

impl<A: Assistant> ChatSession<A> {
    pub fn new(assistant: A, role: &str) -> Self {
        Self {
            assistant,
            role: role.to_string(),
            messages: Vec::new(),
            open: false,
        }
    }

    /// Admins and experts do not get the widget.
    pub fn is_available(&self) -> bool {
        !matches!(self.role.as_str(), "admin" | "expert")
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Open the widget, resetting the conversation to the role greeting.
    pub fn open(&mut self) -> bool {
        if !self.is_available() {
            return false;
        }
        let greeting = if self.role == "teacher" {
            TEACHER_GREETING
        } else {
            STUDENT_GREETING
        };
        self.messages = vec![ChatMessage::assistant(greeting)];
        self.open = true;
        true
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Send `input` and append the reply. Failures become an assistant
    /// message instead of an error. Blank input is ignored.
    pub async fn send(&mut self, input: &str) -> Option<&ChatMessage> {
        if input.trim().is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::user(input));

        let reply = match self.assistant.reply(input, &self.role).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Assistant unavailable: {}", e);
                ChatMessage::assistant(CONNECTION_ERROR_REPLY)
            }
        };
        debug!("Assistant replied with {} chars", reply.content.len());
        self.messages.push(reply);
        self.messages.last()
    }
}
