//! Comment thread for one photo.

use blinket_types::{Comment, NewComment, SenderRef};
use reqwest::Method;

use super::{CollectionSource, InsertAt, RemoteCollection};
use crate::api;
use crate::config::CommentFiltering;
use crate::error::{SyncError, SyncResult};
use crate::http::{Auth, HttpClient, decode_data};
use crate::session::SessionHandle;

/// Comments keyed by photo id.
///
/// With [`CommentFiltering::Client`] the whole message list is fetched and
/// narrowed locally; with [`CommentFiltering::Server`] the backend is asked
/// for the one thread.
#[derive(Debug, Clone)]
pub struct CommentThread {
    http: HttpClient,
    filtering: CommentFiltering,
    session: Option<SessionHandle>,
}

impl CommentThread {
    pub fn new(http: HttpClient, filtering: CommentFiltering) -> Self {
        Self {
            http,
            filtering,
            session: None,
        }
    }

    /// Lets optimistic comments carry the signed-in user as sender.
    #[must_use]
    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn filtering(&self) -> CommentFiltering {
        self.filtering
    }
}

impl CollectionSource for CommentThread {
    type Item = Comment;
    type Filter = String;

    async fn fetch(&self, photo_id: &String) -> SyncResult<Vec<Comment>> {
        match self.filtering {
            CommentFiltering::Client => {
                let all: Vec<Comment> = self.http.get_data(api::ALL_MESSAGES, Auth::Bearer).await?;
                Ok(all
                    .into_iter()
                    .filter(|comment| comment.photo_id == *photo_id)
                    .collect())
            }
            CommentFiltering::Server => {
                self.http
                    .get_data(&api::messages_for_photo(photo_id), Auth::Bearer)
                    .await
            }
        }
    }

    fn insert_at(&self) -> InsertAt {
        InsertAt::Tail
    }
}

pub type CommentCollection = RemoteCollection<CommentThread>;

impl RemoteCollection<CommentThread> {
    /// Posts a comment on the current photo.
    ///
    /// The comment is appended before the request goes out. On success it is
    /// replaced by the server's copy when one is returned; on failure it is
    /// rolled back and the error returned.
    ///
    /// # Errors
    /// `ValidationError` for blank text, `InvalidState` when no photo is
    /// selected, otherwise the request error.
    pub async fn post_comment(&self, text: &str) -> SyncResult<Comment> {
        let content = text.trim();
        if content.is_empty() {
            return Err(SyncError::validation("Comment cannot be empty"));
        }
        let photo_id = self.filter();
        if photo_id.is_empty() {
            return Err(SyncError::invalid_state("No photo selected"));
        }

        let body = serde_json::to_value(NewComment {
            message_content: content,
            photo_id: &photo_id,
        })
        .map_err(|err| SyncError::decode(format!("Failed to encode comment: {err}")))?;

        let mut pending = Comment::pending(&photo_id, content);
        pending.sender_id = self
            .source()
            .session
            .as_ref()
            .and_then(SessionHandle::user)
            .map(SenderRef::Profile);
        self.append(pending.clone());

        let result = self
            .source()
            .http
            .request(Method::POST, api::CREATE_MESSAGE, Some(&body), Auth::Bearer)
            .await;

        match result {
            // The backend may acknowledge without echoing the comment back.
            Ok(value) => match decode_data::<Comment>(value, api::CREATE_MESSAGE) {
                Ok(saved) => {
                    self.confirm(&pending, saved.clone());
                    Ok(saved)
                }
                Err(err) => {
                    tracing::debug!(
                        error = %err,
                        "comment saved without echo; keeping pending copy"
                    );
                    Ok(pending)
                }
            },
            Err(err) => {
                tracing::debug!(error = %err, "comment rejected; rolling back");
                self.rollback(&pending);
                Err(err)
            }
        }
    }
}
