//! Interpretation of the snapshot endpoint's response.
//!
//! The service signals success two ways: a bare `204 No Content`, or a
//! `200 OK` whose JSON body embeds `"status_code": 204`. Everything else
//! is a rejection.

use serde_json::Value;

/// HTTP status the service uses to acknowledge a snapshot.
const NO_CONTENT: u16 = 204;
const OK: u16 = 200;

/// Longest response body kept for diagnostics.
const MAX_BODY_CHARS: usize = 512;

/// Interpreted result of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The service accepted the snapshot.
    Delivered,
    /// The service answered, but not with an acknowledgement.
    Rejected {
        /// Response body, truncated for logging.
        body: String,
    },
    /// No usable response: connection, DNS, TLS or timeout failure.
    TransportError(String),
}

/// Result of one upload as seen by the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// HTTP status, if a response arrived at all.
    pub transport_status: Option<u16>,
    /// What the response means.
    pub outcome: UploadOutcome,
}

impl UploadResult {
    /// True if the snapshot was acknowledged.
    pub fn is_delivered(&self) -> bool {
        self.outcome == UploadOutcome::Delivered
    }

    pub(crate) fn transport_error(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            transport_status: status,
            outcome: UploadOutcome::TransportError(detail.into()),
        }
    }
}

/// The two ways a response can acknowledge a snapshot.
#[derive(Debug, Clone, Copy)]
enum SuccessRule {
    /// `204` with any body.
    NoContent,
    /// `200` with a JSON object whose `status_code` is `204`.
    EmbeddedNoContent,
}

const SUCCESS_RULES: [SuccessRule; 2] = [SuccessRule::NoContent, SuccessRule::EmbeddedNoContent];

impl SuccessRule {
    fn matches(self, status: u16, body: &[u8]) -> bool {
        match self {
            SuccessRule::NoContent => status == NO_CONTENT,
            SuccessRule::EmbeddedNoContent => {
                status == OK
                    && serde_json::from_slice::<Value>(body)
                        .ok()
                        .and_then(|v| v.get("status_code").and_then(Value::as_u64))
                        == Some(u64::from(NO_CONTENT))
            }
        }
    }
}

/// Applies the success rules to a received response.
pub fn interpret_response(status: u16, body: &[u8]) -> UploadResult {
    let outcome = if SUCCESS_RULES.iter().any(|rule| rule.matches(status, body)) {
        UploadOutcome::Delivered
    } else {
        UploadOutcome::Rejected {
            body: body_excerpt(body),
        }
    };
    UploadResult {
        transport_status: Some(status),
        outcome,
    }
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut excerpt: String = text.chars().take(MAX_BODY_CHARS).collect();
    if text.chars().count() > MAX_BODY_CHARS {
        excerpt.push_str("...");
    }
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_content_delivered() {
        assert!(interpret_response(204, b"").is_delivered());
    }

    #[test]
    fn test_embedded_status_delivered() {
        let result = interpret_response(200, br#"{"status_code":204,"message":"ok"}"#);
        assert_eq!(result.outcome, UploadOutcome::Delivered);
        assert_eq!(result.transport_status, Some(200));
    }

    #[test]
    fn test_embedded_error_rejected() {
        let result = interpret_response(200, br#"{"status_code":400}"#);
        assert_eq!(
            result.outcome,
            UploadOutcome::Rejected {
                body: r#"{"status_code":400}"#.to_string()
            }
        );
    }

    #[test]
    fn test_other_shapes_rejected() {
        assert!(!interpret_response(200, b"").is_delivered());
        assert!(!interpret_response(200, b"204").is_delivered());
        assert!(!interpret_response(200, br#"{"status_code":"204"}"#).is_delivered());
        assert!(!interpret_response(200, br#"[{"status_code":204}]"#).is_delivered());
        assert!(!interpret_response(201, br#"{"status_code":204}"#).is_delivered());
        assert!(!interpret_response(401, br#"{"message":"Unauthorized"}"#).is_delivered());
    }

    #[test]
    fn test_long_body_truncated() {
        let body = "x".repeat(2000);
        match interpret_response(500, body.as_bytes()).outcome {
            UploadOutcome::Rejected { body } => assert_eq!(body.len(), MAX_BODY_CHARS + 3),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
