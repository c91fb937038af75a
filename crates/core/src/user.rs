//! Platform users and the directory used to resolve them.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::id::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_active: bool,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("No user {0} found.")]
    NotFound(String),
    #[error("user directory unavailable: {0}")]
    Storage(String),
}

/// Read-only user lookup.
pub trait UserDirectory: Send + Sync {
    fn get_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError>;

    fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
}

impl<D: UserDirectory + ?Sized> UserDirectory for std::sync::Arc<D> {
    fn get_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        (**self).get_by_id(id)
    }

    fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        (**self).get_by_email(email)
    }
}

/// Resolve a command-line user identifier.
///
/// An integer is a primary key; anything else is an email address.
pub fn user_from_str<D>(directory: &D, identifier: &str) -> Result<User, DirectoryError>
where
    D: UserDirectory + ?Sized,
{
    let identifier = identifier.trim();
    let found = match identifier.parse::<i64>() {
        Ok(id) => directory.get_by_id(UserId::new(id))?,
        Err(_) => directory.get_by_email(identifier)?,
    };
    found.ok_or_else(|| DirectoryError::NotFound(identifier.to_string()))
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<BTreeMap<UserId, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user.id, user);
        }
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| DirectoryError::Storage("lock poisoned".to_string()))?;
        Ok(users.get(&id).cloned())
    }

    fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| DirectoryError::Storage("lock poisoned".to_string()))?;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryUserDirectory {
        let dir = InMemoryUserDirectory::new();
        dir.insert(User::new(UserId::new(3), "staff", "staff@example.com"));
        dir
    }

    #[test]
    fn resolves_numeric_identifier_by_id() {
        let user = user_from_str(&directory(), "3").unwrap();
        assert_eq!(user.username, "staff");
    }

    #[test]
    fn resolves_other_identifiers_by_email() {
        let user = user_from_str(&directory(), "Staff@Example.com").unwrap();
        assert_eq!(user.id, UserId::new(3));
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let err = user_from_str(&directory(), "nobody@example.com").unwrap_err();
        assert_eq!(err.to_string(), "No user nobody@example.com found.");
    }
}
