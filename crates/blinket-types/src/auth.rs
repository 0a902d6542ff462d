use serde::{Deserialize, Serialize};

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub user_name: &'a str,
    pub password: &'a str,
}

/// Body of `POST /auth/signup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub full_name: String,
    pub user_name: String,
    pub password: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
}

/// `data` payload of the login and signup responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthPayload {
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_request_shape() {
        let request = SignupRequest {
            full_name: "Alice A".to_string(),
            user_name: "alice".to_string(),
            password: "pw".to_string(),
            email: "alice@example.com".to_string(),
            sex: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["fullName"], "Alice A");
        assert_eq!(json["userName"], "alice");
        assert!(json.get("sex").is_none());
    }

    #[test]
    fn test_auth_payload_token_optional() {
        let payload: AuthPayload = serde_json::from_str(r#"{"token":"abc","id":"u1"}"#).unwrap();
        assert_eq!(payload.token.as_deref(), Some("abc"));
        let empty: AuthPayload = serde_json::from_str(r#"{"id":"u1"}"#).unwrap();
        assert_eq!(empty.token, None);
    }
}
