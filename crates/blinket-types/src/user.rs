use serde::{Deserialize, Serialize};

use crate::id;

/// Profile of a Blinket account as returned by `/auth/my-profile` and
/// `/auth/find-by-user`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "UserProfileWire")]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    pub user_name: String,
    pub email: String,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserProfileWire {
    id: Option<String>,
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    full_name: String,
    user_name: String,
    email: String,
    avatar_url: String,
    address: Option<String>,
    dob: Option<String>,
}

impl From<UserProfileWire> for UserProfile {
    fn from(wire: UserProfileWire) -> Self {
        Self {
            id: id::resolve(wire.id, wire.mongo_id).unwrap_or_default(),
            full_name: wire.full_name,
            user_name: wire.user_name,
            email: wire.email,
            avatar_url: wire.avatar_url,
            address: wire.address,
            dob: wire.dob,
        }
    }
}

/// Partial profile edit sent to `PUT /auth/update`. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
}

impl ProfileUpdate {
    /// Returns true when no field would be sent.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.address.is_none()
            && self.dob.is_none()
    }
}

/// Reference to the author of a photo, comment or invite.
///
/// The backend populates the sender on some endpoints and returns a bare id
/// on others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SenderRef {
    Profile(UserProfile),
    Id(String),
}

impl SenderRef {
    pub fn id(&self) -> &str {
        match self {
            SenderRef::Profile(profile) => &profile.id,
            SenderRef::Id(id) => id,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SenderRef::Profile(profile) => Some(profile),
            SenderRef::Id(_) => None,
        }
    }
}
