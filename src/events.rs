use serde::{Deserialize, Serialize};

use crate::attachment::PendingAttachment;
use crate::llm::ChatError;

/// Author of a turn, serialised the way the generative API expects it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Model => "Gemini",
        }
    }
}

/// Base64 payload sent inline with a user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One piece of a turn: plain text or an inline file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }
}

/// A single message in the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// User turn, with the staged attachment appended after the text
    pub fn user(text: impl Into<String>, attachment: Option<&PendingAttachment>) -> Self {
        let mut parts = vec![Part::text(text)];
        if let Some(attachment) = attachment {
            parts.push(attachment.to_part());
        }
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// First text part of the turn
    pub fn text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }
}

/// Events produced by background request and reveal tasks.
///
/// They are applied by the session owner, one at a time, so history and
/// transcript are only mutated between suspension points.
#[derive(Debug)]
pub enum SessionEvent {
    /// The reply delay elapsed; show the loading bubble
    Placeholder { request_id: u64 },
    /// The network call finished
    Reply {
        request_id: u64,
        result: Result<String, ChatError>,
    },
    /// Reveal one more word of the reply
    RevealTick { request_id: u64 },
}

impl SessionEvent {
    pub fn request_id(&self) -> u64 {
        match self {
            SessionEvent::Placeholder { request_id }
            | SessionEvent::Reply { request_id, .. }
            | SessionEvent::RevealTick { request_id } => *request_id,
        }
    }
}
