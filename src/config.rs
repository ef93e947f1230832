use std::{env, path::PathBuf};

use actix_web::cookie::Key;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub session_key: Vec<u8>,
}

impl Config {
    /// Reads settings from the environment, `.env` included when loaded first.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::Config(format!("PORT is not a port number: {raw}")))?,
            None => 8080,
        };

        let session_key = lookup("SESSION_KEY")
            .ok_or_else(|| AppError::Config("SESSION_KEY environment variable not set".into()))?
            .into_bytes();
        // cookie::Key::from panics below 64 bytes
        if session_key.len() < 64 {
            return Err(AppError::Config("SESSION_KEY must be at least 64 bytes".into()));
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://billed.db".into()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            upload_dir: lookup("UPLOAD_DIR").unwrap_or_else(|| "uploads".into()).into(),
            session_key,
        })
    }

    pub fn key(&self) -> Key {
        Key::from(self.session_key.as_slice())
    }
}
