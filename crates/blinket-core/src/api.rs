//! Backend REST paths.

use url::form_urlencoded;

pub const LOGIN: &str = "/auth/login";
pub const SIGNUP: &str = "/auth/signup";
pub const MY_PROFILE: &str = "/auth/my-profile";
pub const UPDATE_PROFILE: &str = "/auth/update";
pub const CHANGE_AVATAR: &str = "/auth/change-avt";

pub const PHOTOS_BY_COUPLE: &str = "/photo/findByCoupleId";
pub const PHOTOS_BY_LOVER: &str = "/photo/findByLover";

pub const ALL_MESSAGES: &str = "/message/all";
pub const CREATE_MESSAGE: &str = "/message/create";

pub const LOVER_INVITE: &str = "/couple/LoverInvite";

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// `GET /auth/find-by-user?username=<name>`
pub fn find_by_user(username: &str) -> String {
    format!("/auth/find-by-user?username={}", encode(username))
}

/// `POST /couple/sendRequest/<userId>`
pub fn send_request(user_id: &str) -> String {
    format!("/couple/sendRequest/{}", encode(user_id))
}

/// `POST /couple/acceptRequest/<coupleId>`
pub fn accept_request(couple_id: &str) -> String {
    format!("/couple/acceptRequest/{}", encode(couple_id))
}

/// `GET /message/all?photoId=<id>` for backends that filter server-side.
pub fn messages_for_photo(photo_id: &str) -> String {
    format!("{ALL_MESSAGES}?photoId={}", encode(photo_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_encode_user_input() {
        assert_eq!(find_by_user("alice"), "/auth/find-by-user?username=alice");
        assert_eq!(
            find_by_user("a&b=c"),
            "/auth/find-by-user?username=a%26b%3Dc"
        );
        assert_eq!(send_request("u1"), "/couple/sendRequest/u1");
        assert_eq!(accept_request("c/1"), "/couple/acceptRequest/c%2F1");
        assert_eq!(messages_for_photo("p1"), "/message/all?photoId=p1");
    }
}
