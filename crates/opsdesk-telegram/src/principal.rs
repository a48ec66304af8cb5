// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram user to [`Principal`] extraction.

use opsdesk_core::Principal;
use teloxide::types::User;

/// Converts a Telegram user into the channel-agnostic principal the policy
/// and flow engine operate on.
pub fn from_user(user: &User) -> Principal {
    Principal {
        id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user(id: u64, username: Option<&str>) -> User {
        let json = match username {
            Some(uname) => serde_json::json!({
                "id": id,
                "is_bot": false,
                "first_name": "Test",
                "username": uname,
            }),
            None => serde_json::json!({
                "id": id,
                "is_bot": false,
                "first_name": "Test",
            }),
        };
        serde_json::from_value(json).expect("failed to deserialize mock user")
    }

    #[test]
    fn maps_id_username_and_first_name() {
        let principal = from_user(&make_user(12345, Some("alice")));
        assert_eq!(principal.id, 12345);
        assert_eq!(principal.username.as_deref(), Some("alice"));
        assert_eq!(principal.first_name, "Test");
    }

    #[test]
    fn missing_username_stays_none() {
        let principal = from_user(&make_user(12345, None));
        assert!(principal.username.is_none());
        assert_eq!(principal.display_handle(), "Test");
    }
}
