//! The result envelope shared by the store, service and HTTP layers.

use serde::{Deserialize, Serialize};

/// Message used when a failure is reported without any detail.
const UNSPECIFIED_FAILURE: &str = "Operation failed.";

/// Uniform `{data, success, message}` envelope.
///
/// A failed envelope never carries data and always carries a non-empty
/// message. The constructors enforce both, the fields stay private, and
/// deserialization rejects envelopes that break the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawApiResponse<T>")]
pub struct ApiResponse<T> {
    data: Option<T>,
    success: bool,
    message: String,
}

/// Wire shape of [`ApiResponse`] before validation.
#[derive(Deserialize)]
struct RawApiResponse<T> {
    data: Option<T>,
    success: bool,
    message: String,
}

impl<T> TryFrom<RawApiResponse<T>> for ApiResponse<T> {
    type Error = String;

    fn try_from(raw: RawApiResponse<T>) -> Result<Self, Self::Error> {
        if !raw.success {
            if raw.data.is_some() {
                return Err("failed envelope must not carry data".to_string());
            }
            if raw.message.trim().is_empty() {
                return Err("failed envelope must carry a message".to_string());
            }
        }
        Ok(Self {
            data: raw.data,
            success: raw.success,
            message: raw.message,
        })
    }
}

impl<T> ApiResponse<T> {
    /// Creates a successful envelope carrying `data`.
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data: Some(data),
            success: true,
            message: message.into(),
        }
    }

    /// Creates a failed envelope. An empty message is replaced by a generic one.
    pub fn fail(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = UNSPECIFIED_FAILURE.to_string();
        }
        Self {
            data: None,
            success: false,
            message,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Consumes the envelope, returning its data.
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Transforms the data type, keeping success flag and message.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: self.data.map(f),
            success: self.success,
            message: self.message,
        }
    }

    /// Re-types a failed envelope. Successful envelopes lose their data, so
    /// this is only meant for forwarding failures between layers.
    pub fn forward_failure<U>(self) -> ApiResponse<U> {
        ApiResponse::fail(self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_carries_data() {
        let r = ApiResponse::ok(7, "done");
        assert!(r.is_success());
        assert_eq!(r.data(), Some(&7));
        assert_eq!(r.message(), "done");
    }

    #[test]
    fn fail_never_has_data_or_empty_message() {
        let r: ApiResponse<i32> = ApiResponse::fail("");
        assert!(!r.is_success());
        assert!(r.data().is_none());
        assert!(!r.message().is_empty());

        let r: ApiResponse<i32> = ApiResponse::fail("boom");
        assert_eq!(r.message(), "boom");
    }

    #[test]
    fn map_changes_only_data_type() {
        let r = ApiResponse::ok(2, "x").map(|n| n.to_string());
        assert_eq!(r.data().map(String::as_str), Some("2"));
        assert_eq!(r.message(), "x");

        let failed: ApiResponse<String> = ApiResponse::<i32>::fail("nope").map(|n| n.to_string());
        assert!(!failed.is_success());
        assert_eq!(failed.message(), "nope");
    }

    #[test]
    fn serializes_with_expected_field_names() {
        let r = ApiResponse::ok("a", "m");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["data"], "a");
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "m");

        let f: ApiResponse<String> = ApiResponse::fail("bad");
        let json = serde_json::to_value(&f).unwrap();
        assert!(json["data"].is_null());
        assert_eq!(json["success"], false);
    }

    #[test]
    fn deserializing_checks_failed_envelopes() {
        let ok: ApiResponse<i32> =
            serde_json::from_str(r#"{"data":1,"success":true,"message":""}"#).unwrap();
        assert_eq!(ok.data(), Some(&1));

        let failed: ApiResponse<i32> =
            serde_json::from_str(r#"{"data":null,"success":false,"message":"boom"}"#).unwrap();
        assert_eq!(failed, ApiResponse::fail("boom"));

        let blank = serde_json::from_str::<ApiResponse<i32>>(
            r#"{"data":null,"success":false,"message":"  "}"#,
        );
        assert!(blank.is_err());

        let with_data = serde_json::from_str::<ApiResponse<i32>>(
            r#"{"data":3,"success":false,"message":"boom"}"#,
        );
        assert!(with_data.unwrap_err().to_string().contains("must not carry data"));
    }
}
