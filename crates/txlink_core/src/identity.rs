//! Caller identity attached to every command.

use uuid::Uuid;

/// Identifies the user on whose behalf commands run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerIdentity {
    user_id: Uuid,
}

impl CallerIdentity {
    /// The anonymous caller (nil user id).
    pub const ANONYMOUS: CallerIdentity = CallerIdentity {
        user_id: Uuid::nil(),
    };

    /// Creates an identity for `user_id`.
    #[must_use]
    pub const fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    /// Returns the user id.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns true for the anonymous caller.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_nil()
    }

    /// Returns the identity as sent to the server: empty for the
    /// anonymous caller, the 16 uuid bytes otherwise.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.is_anonymous() {
            Vec::new()
        } else {
            self.user_id.as_bytes().to_vec()
        }
    }
}

impl Default for CallerIdentity {
    fn default() -> Self {
        Self::ANONYMOUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_bytes() {
        assert!(CallerIdentity::ANONYMOUS.is_anonymous());
        assert!(CallerIdentity::default().to_bytes().is_empty());
    }

    #[test]
    fn named_identity_has_uuid_bytes() {
        let id = Uuid::new_v4();
        let caller = CallerIdentity::new(id);
        assert!(!caller.is_anonymous());
        assert_eq!(caller.to_bytes(), id.as_bytes().to_vec());
    }
}
