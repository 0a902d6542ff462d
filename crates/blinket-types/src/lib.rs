//! Wire and domain types shared by the Blinket client crates.

pub mod auth;
pub mod comment;
pub mod couple;
pub mod envelope;
mod id;
pub mod photo;
pub mod user;

pub use auth::{AuthPayload, LoginRequest, SignupRequest};
pub use comment::{Comment, NewComment};
pub use couple::LoverInvite;
pub use envelope::ApiEnvelope;
pub use photo::{MediaType, Photo, RawPhoto};
pub use user::{ProfileUpdate, SenderRef, UserProfile};
