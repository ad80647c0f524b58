//! Ready-made principals for tests.

use rr_service::models::Principal;

/// Build a principal with the given id, name and email.
pub fn principal(id: &str, name: &str, email: &str) -> Principal {
    Principal {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        avatar: None,
    }
}

pub fn alice() -> Principal {
    principal("user-alice", "Alice", "alice@example.com")
}

pub fn bob() -> Principal {
    principal("user-bob", "Bob", "bob@example.com")
}

pub fn carol() -> Principal {
    principal("user-carol", "Carol", "carol@example.com")
}

/// `n` distinct principals, `user-0` through `user-{n-1}`.
pub fn numbered(n: usize) -> Vec<Principal> {
    (0..n)
        .map(|i| principal(&format!("user-{i}"), &format!("User {i}"), &format!("user{i}@example.com")))
        .collect()
}
