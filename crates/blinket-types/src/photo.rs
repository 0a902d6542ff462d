use serde::{Deserialize, Serialize};

use crate::id;
use crate::user::SenderRef;

/// Suffix that marks a media URL as a video clip.
const VIDEO_SUFFIX: &str = ".mp4";

/// Kind of media behind a photo-feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Sniffs the media kind from the URL suffix: `.mp4` is video, anything
    /// else is an image.
    pub fn from_url(url: &str) -> Self {
        if url.ends_with(VIDEO_SUFFIX) {
            MediaType::Video
        } else {
            MediaType::Image
        }
    }
}

/// Photo as returned by `/photo/findByCoupleId` and `/photo/findByLover`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPhotoWire")]
pub struct RawPhoto {
    pub photo_id: String,
    pub photo_url: String,
    pub sender_id: Option<SenderRef>,
    pub couple_id: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPhotoWire {
    #[serde(default)]
    photo_id: Option<String>,
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
    photo_url: String,
    #[serde(default)]
    sender_id: Option<SenderRef>,
    #[serde(default)]
    couple_id: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl TryFrom<RawPhotoWire> for RawPhoto {
    type Error = String;

    fn try_from(wire: RawPhotoWire) -> Result<Self, Self::Error> {
        let photo_id = id::resolve(wire.photo_id, wire.mongo_id)
            .ok_or_else(|| "missing field `photoId`".to_string())?;
        Ok(Self {
            photo_id,
            photo_url: wire.photo_url,
            sender_id: wire.sender_id,
            couple_id: wire.couple_id,
            created_at: wire.created_at,
        })
    }
}

/// Feed entry with its display fields resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub photo_id: String,
    pub photo_url: String,
    pub sender_id: Option<String>,
    pub sender_full_name: Option<String>,
    pub sender_avatar_url: Option<String>,
    pub media_type: MediaType,
    pub couple_id: Option<String>,
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_suffix() {
        assert_eq!(MediaType::from_url("https://cdn/x/clip.mp4"), MediaType::Video);
        assert_eq!(MediaType::from_url("https://cdn/x/pic.jpg"), MediaType::Image);
        assert_eq!(MediaType::from_url("https://cdn/x/mp4"), MediaType::Image);
    }

    #[test]
    fn test_raw_photo_with_populated_sender() {
        let json = r#"{
            "_id": "p1",
            "photoUrl": "https://cdn/p1.jpg",
            "senderId": {"_id": "u1", "fullName": "Alice", "avatarUrl": "https://cdn/a.png"},
            "createdAt": "2024-06-01T10:00:00Z"
        }"#;
        let raw: RawPhoto = serde_json::from_str(json).unwrap();
        assert_eq!(raw.photo_id, "p1");
        assert_eq!(raw.sender_id.as_ref().map(SenderRef::id), Some("u1"));
        assert_eq!(raw.couple_id, None);
    }

    #[test]
    fn test_raw_photo_with_both_id_keys() {
        let json = r#"{"_id":"abc","photoId":"p1","photoUrl":"https://cdn/p1.jpg"}"#;
        let raw: RawPhoto = serde_json::from_str(json).unwrap();
        assert_eq!(raw.photo_id, "p1");

        let err = serde_json::from_str::<RawPhoto>(r#"{"photoUrl":"x.jpg"}"#).unwrap_err();
        assert!(err.to_string().contains("photoId"));
    }
}
