use std::sync::RwLock;

use serde::Serialize;
use serde_json::Value;

use super::{read, write};
use crate::clock;
use crate::error::StoreError;

/// A registered account. The password is stored as given and never
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Accounts known to the auth routes.
pub struct UserDirectory {
    users: RwLock<Vec<User>>,
}

impl UserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    /// Only the `admin` account.
    pub fn seeded() -> Self {
        Self::new(vec![User {
            id: 1,
            username: "admin".to_string(),
            email: "admin@computerstore.com".to_string(),
            password: "hashedpassword123".to_string(),
            role: "admin".to_string(),
            created_at: clock::now_iso(),
            updated_at: None,
        }])
    }

    /// Add a `user`-role account from a registration body.
    ///
    /// # Errors
    ///
    /// Missing fields, or a username or email already taken.
    pub fn register(&self, body: &Value) -> Result<User, StoreError> {
        let (Some(username), Some(email), Some(password)) = (
            field(body, "username"),
            field(body, "email"),
            field(body, "password"),
        ) else {
            return Err(StoreError::MissingRegistrationFields);
        };

        let mut users = write(&self.users);
        if users
            .iter()
            .any(|u| u.username == username || u.email == email)
        {
            return Err(StoreError::DuplicateUser);
        }
        let user = User {
            id: users.iter().map(|u| u.id).max().map_or(1, |max| max + 1),
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: "user".to_string(),
            created_at: clock::now_iso(),
            updated_at: None,
        };
        users.push(user.clone());
        Ok(user)
    }

    /// `username` may also be the account's e-mail address.
    pub fn login(&self, body: &Value) -> Result<User, StoreError> {
        let (Some(login), Some(password)) = (field(body, "username"), field(body, "password"))
        else {
            return Err(StoreError::MissingCredentials);
        };
        read(&self.users)
            .iter()
            .find(|u| (u.username == login || u.email == login) && u.password == password)
            .cloned()
            .ok_or(StoreError::InvalidCredentials)
    }

    /// Look a user up by id.
    pub fn get(&self, id: u64) -> Result<User, StoreError> {
        read(&self.users)
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(StoreError::UserNotFound)
    }

    /// Apply a non-empty `username` and `email` from `body`.
    pub fn update_profile(&self, id: u64, body: &Value) -> Result<User, StoreError> {
        let mut users = write(&self.users);
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::UserNotFound)?;
        if let Some(username) = field(body, "username") {
            user.username = username.to_string();
        }
        if let Some(email) = field(body, "email") {
            user.email = email.to_string();
        }
        user.updated_at = Some(clock::now_iso());
        Ok(user.clone())
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::seeded()
    }
}
