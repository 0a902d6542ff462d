use serde::{Deserialize, Serialize};

/// Standard response wrapper returned by the backend: `{code, message?, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_without_message() {
        let env: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"code":200,"data":[1,2,3]}"#).unwrap();
        assert_eq!(env.code, Some(200));
        assert_eq!(env.message, None);
        assert_eq!(env.data, vec![1, 2, 3]);
    }

    #[test]
    fn test_envelope_requires_data() {
        let result = serde_json::from_str::<ApiEnvelope<Vec<u32>>>(r#"{"code":200}"#);
        assert!(result.is_err());
    }
}
