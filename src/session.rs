#[cfg(test)]
use std::{cell::RefCell, collections::HashMap};

use actix_session::Session;

use crate::{errors::AppError, structs::SessionUser};

pub const USER_KEY: &str = "user";
pub const PENDING_FILE_KEY: &str = "pending_file";

/// Source of the signed-in user, read once when a controller is built.
pub trait SessionProvider {
    fn current_user(&self) -> Result<Option<SessionUser>, AppError>;
}

impl SessionProvider for Session {
    fn current_user(&self) -> Result<Option<SessionUser>, AppError> {
        self.get::<SessionUser>(USER_KEY)
            .map_err(|e| AppError::SessionError(e.to_string()))
    }
}

/// Key/value storage holding JSON strings, the shape a browser's local storage has.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySession {
    items: RefCell<HashMap<String, String>>,
}

#[cfg(test)]
impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: &SessionUser) -> Result<Self, AppError> {
        let session = Self::new();
        let value = serde_json::to_string(user).map_err(|e| AppError::SessionError(e.to_string()))?;
        session.set_item(USER_KEY, value);
        Ok(session)
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: impl Into<String>) {
        self.items.borrow_mut().insert(key.to_owned(), value.into());
    }

    pub fn remove_item(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }

    pub fn clear(&self) {
        self.items.borrow_mut().clear();
    }
}

#[cfg(test)]
impl SessionProvider for MemorySession {
    fn current_user(&self) -> Result<Option<SessionUser>, AppError> {
        match self.get_item(USER_KEY) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AppError::SessionError(e.to_string())),
        }
    }
}
