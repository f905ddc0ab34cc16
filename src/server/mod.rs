//! The user-facing web front end: one page plus the JSON routes it drives.

use crate::error::Error;
use crate::session::{SessionStore, SharedSessions};
use crate::workflow::Classifier;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

mod page;
pub mod protocol;
pub mod routes;

/// State shared by every worker of the HTTP server
#[derive(Debug)]
pub struct AppState {
    pub sessions: SharedSessions,
    pub classifier: Classifier,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(classifier: Classifier, max_upload_bytes: usize) -> Self {
        AppState {
            sessions: Arc::new(RwLock::new(SessionStore::new())),
            classifier,
            max_upload_bytes,
        }
    }
}

#[derive(Debug)]
pub struct WebError {
    err: Error,
    message: String,
}

impl WebError {
    /// Report `err` with a custom user-facing message
    pub fn with_message(err: Error, message: String) -> Self {
        WebError { err, message }
    }
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let err = HashMap::from([("errors", vec![self.to_string()])]);

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(err)
    }

    fn status_code(&self) -> StatusCode {
        match self.err {
            Error::Upload(_) | Error::Decode(_) | Error::NoImage => StatusCode::BAD_REQUEST,
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::Busy => StatusCode::CONFLICT,
            Error::Network(_) | Error::Service { .. } | Error::ResponseParse(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::Config(_) | Error::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for WebError {
    fn from(err: Error) -> WebError {
        let message = err.to_string();
        WebError { err, message }
    }
}

impl From<tokio::task::JoinError> for WebError {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::from(err).into()
    }
}
