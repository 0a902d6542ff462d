//! Photo feed: the couple's shared photos or the partner's photos.

use std::fmt;

use blinket_types::{MediaType, Photo, RawPhoto, SenderRef};

use super::{CollectionSource, InsertAt, RemoteCollection};
use crate::api;
use crate::error::SyncResult;
use crate::http::{Auth, HttpClient};

/// Which photos the feed shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhotoFilter {
    /// Photos shared by both partners
    #[default]
    Couple,
    /// Photos sent by the partner
    Lover,
}

impl PhotoFilter {
    pub fn path(self) -> &'static str {
        match self {
            PhotoFilter::Couple => api::PHOTOS_BY_COUPLE,
            PhotoFilter::Lover => api::PHOTOS_BY_LOVER,
        }
    }
}

impl fmt::Display for PhotoFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoFilter::Couple => f.write_str("Couple"),
            PhotoFilter::Lover => f.write_str("Lover"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhotoFeed {
    http: HttpClient,
}

impl PhotoFeed {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

impl CollectionSource for PhotoFeed {
    type Item = Photo;
    type Filter = PhotoFilter;

    async fn fetch(&self, filter: &PhotoFilter) -> SyncResult<Vec<Photo>> {
        let raw: Vec<RawPhoto> = self.http.get_data(filter.path(), Auth::Bearer).await?;
        Ok(raw.into_iter().map(derive_photo).collect())
    }

    /// Newly posted photos show first.
    fn insert_at(&self) -> InsertAt {
        InsertAt::Head
    }
}

pub type PhotoCollection = RemoteCollection<PhotoFeed>;

/// Resolves sender display fields and the media kind once, at fetch time.
pub fn derive_photo(raw: RawPhoto) -> Photo {
    let media_type = MediaType::from_url(&raw.photo_url);
    let (sender_id, sender_full_name, sender_avatar_url) = match raw.sender_id {
        Some(SenderRef::Profile(profile)) => (
            Some(profile.id),
            Some(profile.full_name),
            Some(profile.avatar_url),
        ),
        Some(SenderRef::Id(id)) => (Some(id), None, None),
        None => (None, None, None),
    };

    Photo {
        photo_id: raw.photo_id,
        photo_url: raw.photo_url,
        sender_id,
        sender_full_name,
        sender_avatar_url,
        media_type,
        couple_id: raw.couple_id,
        created_at: raw.created_at,
    }
}

#[cfg(test)]
mod tests {
    use blinket_types::UserProfile;

    use super::*;

    #[test]
    fn test_derive_photo_from_populated_sender() {
        let raw = RawPhoto {
            photo_id: "p1".to_string(),
            photo_url: "https://cdn/p1.mp4".to_string(),
            sender_id: Some(SenderRef::Profile(UserProfile {
                id: "u1".to_string(),
                full_name: "Alice".to_string(),
                avatar_url: "https://cdn/a.png".to_string(),
                ..Default::default()
            })),
            couple_id: Some("c1".to_string()),
            created_at: None,
        };

        let photo = derive_photo(raw);
        assert_eq!(photo.sender_full_name.as_deref(), Some("Alice"));
        assert_eq!(photo.sender_avatar_url.as_deref(), Some("https://cdn/a.png"));
        assert_eq!(photo.media_type, MediaType::Video);
        assert_eq!(photo.couple_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_derive_photo_with_bare_sender_id() {
        let raw = RawPhoto {
            photo_id: "p2".to_string(),
            photo_url: "https://cdn/p2.jpg".to_string(),
            sender_id: Some(SenderRef::Id("u2".to_string())),
            couple_id: None,
            created_at: None,
        };

        let photo = derive_photo(raw);
        assert_eq!(photo.sender_id.as_deref(), Some("u2"));
        assert_eq!(photo.sender_full_name, None);
        assert_eq!(photo.media_type, MediaType::Image);
    }

    #[test]
    fn test_filter_paths() {
        assert_eq!(PhotoFilter::default(), PhotoFilter::Couple);
        assert_eq!(PhotoFilter::Couple.path(), "/photo/findByCoupleId");
        assert_eq!(PhotoFilter::Lover.path(), "/photo/findByLover");
        assert_eq!(PhotoFilter::Lover.to_string(), "Lover");
    }
}
