//! Storage key layout.

/// Last explicitly chosen interaction mode (durable).
pub const MODE: &str = "mira:mode";

/// Set once the operator picks a mode by hand (session).
pub const MODE_OVERRIDE: &str = "mira:mode-override";

/// JSON array of lowercased tool names trusted for the session (session).
pub const TRUSTED_SKILLS: &str = "mira:trusted-skills";

/// Namespace of broadcast read confirmations.
pub const BROADCAST_READ_NAMESPACE: &str = "advisorhub:broadcast-read";

/// Read-confirmation key, `namespace:id`.
pub fn read_receipt(namespace: &str, id: &str) -> String {
    format!("{}:{}", namespace, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_receipt_key() {
        assert_eq!(
            read_receipt(BROADCAST_READ_NAMESPACE, "42"),
            "advisorhub:broadcast-read:42"
        );
    }
}
