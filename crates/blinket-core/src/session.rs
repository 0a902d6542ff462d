//! Login, signup, logout and the observable session.
//!
//! [`SessionController`] is the only writer of [`Session`]. Components that
//! need the signed-in user get a [`SessionHandle`], a read/subscribe view.

use std::sync::Arc;

use blinket_types::{AuthPayload, LoginRequest, ProfileUpdate, SignupRequest, UserProfile};
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::api;
use crate::collection::{
    CommentCollection, CommentThread, PhotoCollection, PhotoFeed, PhotoFilter, RemoteCollection,
};
use crate::config::{CommentFiltering, Config};
use crate::credentials::{CachedCredentialStore, Credential, CredentialStore, FileCredentialStore};
use crate::error::{SyncError, SyncErrorKind, SyncResult};
use crate::http::{Auth, HttpClient};
use crate::relationship::RelationshipWorkflow;

/// Multipart field carrying the new avatar image.
const AVATAR_FIELD: &str = "avatar";

/// Current authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Cached profile; `None` until it has been fetched.
    pub user: Option<UserProfile>,
    pub is_logged: bool,
}

/// Read-only view of the session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Session>,
}

impl SessionHandle {
    pub fn current(&self) -> Session {
        self.rx.borrow().clone()
    }

    pub fn is_logged(&self) -> bool {
        self.rx.borrow().is_logged
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.rx.borrow().user.clone()
    }

    /// Waits for the next session transition. Returns `None` once the
    /// controller is gone.
    pub async fn changed(&mut self) -> Option<Session> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Result of a successful login or signup.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    /// Non-fatal problems, e.g. the token could not be persisted (the
    /// session will not survive a restart) or the profile fetch failed.
    pub warnings: Vec<SyncError>,
}

pub struct SessionController {
    http: HttpClient,
    credentials: Arc<dyn CredentialStore>,
    session: Arc<watch::Sender<Session>>,
    comment_filtering: CommentFiltering,
}

impl SessionController {
    /// Wraps `http` so that a 401 on any authenticated call flips the
    /// session to logged-out.
    pub fn new(http: HttpClient) -> Self {
        let (tx, _) = watch::channel(Session::default());
        let session = Arc::new(tx);

        let expired = Arc::clone(&session);
        let http = http.with_expiry_hook(move || {
            let changed = expired.send_if_modified(|session| {
                if !session.is_logged {
                    return false;
                }
                *session = Session::default();
                true
            });
            if changed {
                tracing::info!("session expired; signed out");
            }
        });

        Self {
            credentials: Arc::clone(http.credentials()),
            http,
            session,
            comment_filtering: CommentFiltering::default(),
        }
    }

    /// Builds the controller from config: file-backed credentials under
    /// `${BLINKET_HOME}`, base URL and timeout, comment filtering mode.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let durable = FileCredentialStore::new(
            config.credentials.effective_path(),
            config.credentials.key.clone(),
        );
        let credentials: Arc<dyn CredentialStore> = Arc::new(CachedCredentialStore::new(durable));
        let http = HttpClient::from_config(config, credentials)?;
        Ok(Self::new(http).with_comment_filtering(config.comments.filtering))
    }

    #[must_use]
    pub fn with_comment_filtering(mut self, filtering: CommentFiltering) -> Self {
        self.comment_filtering = filtering;
        self
    }

    /// Client for dependents; shares the credential store and expiry hook.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.session.subscribe(),
        }
    }

    pub fn current(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Receiver notified on every session transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub fn photo_feed(&self) -> PhotoCollection {
        RemoteCollection::new(PhotoFeed::new(self.http.clone()), PhotoFilter::Couple)
    }

    pub fn comment_thread(&self, photo_id: impl Into<String>) -> CommentCollection {
        let source = CommentThread::new(self.http.clone(), self.comment_filtering)
            .with_session(self.handle());
        RemoteCollection::new(source, photo_id.into())
    }

    pub fn relationship(&self) -> RelationshipWorkflow {
        RelationshipWorkflow::new(self.http.clone(), self.handle())
    }

    /// Signs in and caches the profile.
    ///
    /// # Errors
    /// `ValidationError` for blank fields (no request is sent), otherwise the
    /// login request error.
    pub async fn login(&self, user_name: &str, password: &str) -> SyncResult<LoginOutcome> {
        let user_name = user_name.trim();
        if user_name.is_empty() || password.is_empty() {
            return Err(SyncError::validation("Username and password are required"));
        }

        let request = LoginRequest {
            user_name,
            password,
        };
        let payload: AuthPayload = self
            .http
            .send_data(Method::POST, api::LOGIN, &request, Auth::Anonymous)
            .await?;
        let token = require_token(payload, api::LOGIN)?;
        tracing::info!(user_name, "signed in");
        Ok(self.establish(token).await)
    }

    /// Creates an account and signs in.
    ///
    /// If the signup response carries no token, a regular login with the same
    /// credentials follows.
    ///
    /// # Errors
    /// `ValidationError` for missing fields, otherwise the request error.
    pub async fn signup(&self, request: &SignupRequest) -> SyncResult<LoginOutcome> {
        let required = [
            ("full name", &request.full_name),
            ("username", &request.user_name),
            ("email", &request.email),
            ("password", &request.password),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(SyncError::validation(format!("Missing {field}")));
        }

        let payload: AuthPayload = self
            .http
            .send_data(Method::POST, api::SIGNUP, request, Auth::Anonymous)
            .await?;

        match payload.token.filter(|token| !token.is_empty()) {
            Some(token) => {
                tracing::info!(user_name = %request.user_name, "account created");
                Ok(self.establish(token).await)
            }
            None => self.login(&request.user_name, &request.password).await,
        }
    }

    /// Restores a persisted session on start-up.
    ///
    /// A rejected token is a normal outcome: the credential is cleared and a
    /// logged-out session returned.
    ///
    /// # Errors
    /// `StorageFailure` if the store is unreadable; network or server errors
    /// while fetching the profile (the session stays logged in, without a
    /// cached user).
    pub async fn restore(&self) -> SyncResult<Session> {
        if self.credentials.load()?.is_none() {
            self.set(Session::default());
            return Ok(self.current());
        }

        self.set(Session {
            user: None,
            is_logged: true,
        });
        match self.refresh_profile().await {
            Ok(_) => Ok(self.current()),
            Err(err) if err.kind == SyncErrorKind::Unauthenticated => Ok(self.current()),
            Err(err) => Err(err),
        }
    }

    /// Fetches `/auth/my-profile` and caches it in the session.
    ///
    /// # Errors
    /// Any request error; `Unauthenticated` also signs out.
    pub async fn refresh_profile(&self) -> SyncResult<UserProfile> {
        let profile: UserProfile = self.http.get_data(api::MY_PROFILE, Auth::Bearer).await?;
        self.session.send_if_modified(|session| {
            if !session.is_logged {
                return false;
            }
            session.user = Some(profile.clone());
            true
        });
        Ok(profile)
    }

    /// Edits the profile, then refreshes the cached copy.
    ///
    /// # Errors
    /// `ValidationError` for an empty update, otherwise the request error.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> SyncResult<UserProfile> {
        if update.is_empty() {
            return Err(SyncError::validation("Nothing to update"));
        }
        let body = serde_json::to_value(update)
            .map_err(|err| SyncError::decode(format!("Failed to encode profile: {err}")))?;
        self.http
            .request(Method::PUT, api::UPDATE_PROFILE, Some(&body), Auth::Bearer)
            .await?;
        self.refresh_profile().await
    }

    /// Uploads a new avatar, then refreshes the cached profile.
    ///
    /// # Errors
    /// `ValidationError` for an empty image or bad MIME type, otherwise the
    /// request error.
    pub async fn change_avatar(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime: &str,
    ) -> SyncResult<UserProfile> {
        if bytes.is_empty() {
            return Err(SyncError::validation("Avatar image is empty"));
        }
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|err| SyncError::validation(format!("Invalid image type {mime}: {err}")))?;
        let form = Form::new().part(AVATAR_FIELD, part);

        let _: Value = self.http.post_multipart(api::CHANGE_AVATAR, form).await?;
        self.refresh_profile().await
    }

    /// Signs out locally. The session is reset even if clearing the store fails.
    ///
    /// # Errors
    /// `StorageFailure` when the credential could not be removed.
    pub fn logout(&self) -> SyncResult<()> {
        let cleared = self.credentials.clear();
        self.set(Session::default());
        tracing::info!("signed out");
        cleared
    }

    async fn establish(&self, token: String) -> LoginOutcome {
        let mut warnings = Vec::new();

        if let Err(err) = self.credentials.save(&Credential::new(token)) {
            tracing::warn!(error = %err, "token not persisted; session will not survive restart");
            warnings.push(err);
        }

        self.set(Session {
            user: None,
            is_logged: true,
        });

        if let Err(err) = self.refresh_profile().await {
            tracing::warn!(error = %err, "signed in but profile fetch failed");
            warnings.push(err);
        }

        LoginOutcome {
            session: self.current(),
            warnings,
        }
    }

    fn set(&self, session: Session) {
        self.session.send_if_modified(|current| {
            if *current == session {
                return false;
            }
            *current = session;
            true
        });
    }
}

fn require_token(payload: AuthPayload, path: &str) -> SyncResult<String> {
    payload
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| SyncError::decode(format!("No token in response from {path}")))
}
