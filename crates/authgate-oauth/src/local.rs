//! In-memory username/password store.
//!
//! Meant for bootstrapping and tests, not as a credential database.

use std::collections::HashMap;

use subtle::ConstantTimeEq;

use crate::provider::User;

#[derive(Clone)]
pub struct LocalUser {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LocalUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUser")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl LocalUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Local users have no provider-assigned id; the username stands in for it.
impl User for LocalUser {
    fn id(&self) -> &str {
        &self.username
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn name(&self) -> &str {
        ""
    }

    fn email(&self) -> &str {
        ""
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalAuth {
    users: HashMap<String, LocalUser>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, user: LocalUser) {
        self.users.insert(user.username.clone(), user);
    }

    pub fn remove_user(&mut self, username: &str) {
        self.users.remove(username);
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Check a username/password pair. Empty credentials never match.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&LocalUser> {
        if username.is_empty() || password.is_empty() {
            return None;
        }
        let user = self.users.get(username)?;
        bool::from(user.password.as_bytes().ct_eq(password.as_bytes())).then_some(user)
    }
}

impl FromIterator<LocalUser> for LocalAuth {
    fn from_iter<I: IntoIterator<Item = LocalUser>>(iter: I) -> Self {
        let mut auth = Self::new();
        for user in iter {
            auth.add_user(user);
        }
        auth
    }
}
