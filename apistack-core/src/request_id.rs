//! Request ID generation for the local gate

use base64::{engine::general_purpose::STANDARD, Engine};
use uuid::Uuid;

/// Gateway-style request ID
#[derive(Debug, Clone)]
pub struct RequestId {
    /// Request ID (x-amzn-RequestId), hyphenated UUID
    pub id: String,
    /// Extended ID (x-amz-apigw-id), base64 encoded
    pub extended_id: String,
}

impl RequestId {
    /// Generate a new request ID pair
    pub fn new() -> Self {
        let id = Uuid::new_v4().to_string();
        let extended_id = STANDARD.encode(&Uuid::new_v4().as_bytes()[..8]);
        Self { id, extended_id }
    }

    /// Create a request ID with a specific value (for testing)
    pub fn with_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let extended_id = STANDARD.encode(id.as_bytes());
        Self { id, extended_id }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_generation() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();

        // IDs should be unique
        assert_ne!(id1.id, id2.id);
        assert_ne!(id1.extended_id, id2.extended_id);

        assert_eq!(id1.id.len(), 36);
        assert!(id1.id.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }

    #[test]
    fn test_request_id_with_id() {
        let id = RequestId::with_id("test-id-123");
        assert_eq!(id.id, "test-id-123");
        assert_eq!(id.extended_id, "dGVzdC1pZC0xMjM=");
    }
}
