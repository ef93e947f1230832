use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use sqlx::Error as SqlxError;
use thiserror::Error;

use crate::views::{self, Page};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Erreur 404: page introuvable")]
    NotFound,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] SqlxError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shows the error panel inside the layout. Plain text when the templates fail too.
    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        let page = views::error_ui(&self.to_string()).and_then(|body| {
            Page {
                title: "Billed".into(),
                body,
                ..Default::default()
            }
            .html()
        });
        match page {
            Ok(html) => response.content_type("text/html; charset=utf-8").body(html),
            Err(e) => {
                log::error!("Could not render the error page for {}: {}", self, e);
                response.body(self.to_string())
            }
        }
    }
}

impl From<AppError> for std::io::Error {
    fn from(err: AppError) -> Self {
        std::io::Error::other(err.to_string())
    }
}

/// Failures reported by a bill store. The message is what the list view shows.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Erreur 404: {0}")]
    NotFound(String),

    #[error("Erreur 500: {0}")]
    Internal(String),

    #[error("Erreur 500: {0}")]
    Database(#[from] SqlxError),

    #[error("Erreur 500: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Le champ {0} est obligatoire")]
    Missing(&'static str),

    #[error("Valeur invalide pour {0}: {1}")]
    Invalid(&'static str, String),
}
