use serde::{Deserialize, Serialize};

use crate::id;
use crate::user::SenderRef;

/// Pending lover invite returned by `GET /couple/LoverInvite`.
///
/// `couple_id` is the relationship identifier needed to accept the invite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "LoverInviteWire")]
pub struct LoverInvite {
    pub couple_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<SenderRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LoverInviteWire {
    couple_id: Option<String>,
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    sender_id: Option<SenderRef>,
    status: Option<String>,
}

impl From<LoverInviteWire> for LoverInvite {
    fn from(wire: LoverInviteWire) -> Self {
        Self {
            couple_id: id::resolve(wire.couple_id, wire.mongo_id),
            sender_id: wire.sender_id,
            status: wire.status,
        }
    }
}
