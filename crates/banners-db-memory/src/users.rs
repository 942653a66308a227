use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use banners_auth::{AuthError, AuthResult, NewUser, User, UserStorage};

/// In-memory user accounts keyed by username.
#[derive(Debug)]
pub struct InMemoryUserStorage {
    users: DashMap<String, User>,
    next_id: AtomicI64,
}

impl Default for InMemoryUserStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl UserStorage for InMemoryUserStorage {
    async fn create(&self, user: &NewUser) -> AuthResult<i64> {
        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(AuthError::user_exists(&user.username)),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                slot.insert(user.clone().into_user(id));
                Ok(id)
            }
        }
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self.users.get(username).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banners_auth::UserRole;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            password_hash: "hash".into(),
            role: UserRole::User,
            feature_id: Some(1),
            tag_ids: vec![2],
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let users = InMemoryUserStorage::new();
        let id = users.create(&new_user("alice")).await.unwrap();
        let found = users.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.feature_id, Some(1));
        assert!(users.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let users = InMemoryUserStorage::new();
        users.create(&new_user("alice")).await.unwrap();
        assert!(matches!(
            users.create(&new_user("alice")).await,
            Err(AuthError::UserExists { .. })
        ));
    }
}
