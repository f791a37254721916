//! Response envelope shared by every API endpoint.

use serde::Serialize;

/// `{success, message?, data?, code?}` with absent fields omitted.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response carrying only data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            code: None,
        }
    }

    /// Successful response carrying a message and data.
    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            code: None,
        }
    }
}

impl ApiResponse<()> {
    /// Successful response carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            code: None,
        }
    }

    /// Failed response with an optional machine-readable code.
    pub fn failure(message: impl Into<String>, code: Option<&'static str>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_are_omitted() {
        let body = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert_eq!(body, json!({"success": true, "message": "done"}));

        let body = serde_json::to_value(ApiResponse::failure("nope", Some("INVALID_TOKEN"))).unwrap();
        assert_eq!(
            body,
            json!({"success": false, "message": "nope", "code": "INVALID_TOKEN"})
        );
    }
}
