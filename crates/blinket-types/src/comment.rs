use serde::{Deserialize, Serialize};

use crate::id;
use crate::user::SenderRef;

/// Comment ("message") attached to a photo.
///
/// Comments appended locally before the server confirms them have no `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "CommentWire")]
pub struct Comment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message_content: String,
    pub photo_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<SenderRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
    message_content: String,
    photo_id: String,
    #[serde(default)]
    sender_id: Option<SenderRef>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<CommentWire> for Comment {
    fn from(wire: CommentWire) -> Self {
        Self {
            id: id::resolve(wire.id, wire.mongo_id),
            message_content: wire.message_content,
            photo_id: wire.photo_id,
            sender_id: wire.sender_id,
            created_at: wire.created_at,
        }
    }
}

impl Comment {
    /// Builds the local, unconfirmed version of a comment.
    pub fn pending(photo_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            message_content: content.into(),
            photo_id: photo_id.into(),
            sender_id: None,
            created_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }
}

/// Body of `POST /message/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment<'a> {
    pub message_content: &'a str,
    pub photo_id: &'a str,
}
