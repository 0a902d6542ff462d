//! Authenticated session and remote-collection sync for the Blinket client.

pub mod api;
pub mod collection;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod logging;
pub mod relationship;
pub mod session;

pub use collection::{
    CollectionSource, CollectionState, CommentCollection, FetchOutcome, PhotoCollection,
    PhotoFilter, RemoteCollection,
};
pub use config::Config;
pub use credentials::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{SyncError, SyncErrorKind, SyncResult};
pub use http::{Auth, HttpClient};
pub use relationship::{FailureReason, LinkState, RelationshipRequest, RelationshipWorkflow};
pub use session::{LoginOutcome, Session, SessionController, SessionHandle};
