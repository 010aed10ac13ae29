use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// BoardError
///
/// Failures raised by the data-acquisition and write paths. Read-side failures
/// are normally swallowed by the layer that produced them (the pipeline falls
/// through to the next source); only write paths surface these to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Remote descriptor missing or carrying a placeholder value. Never retried with the same config.
    #[error("Store configuration invalid: {0}")]
    ConfigInvalid(String),

    /// Transient network or store failure. The scheduler retries on its own cadence.
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// A write was attempted before the structured client produced a live handle.
    #[error("Structured store is not initialized")]
    NotInitialized,

    #[error("Malformed record: {0}")]
    DecodeFailure(String),
}

/// AuthError
///
/// Outcomes of the admin gate that are reported back to the admin panel.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unknown admin id")]
    UnknownId,

    #[error("Wrong password")]
    WrongPassword,

    /// Admin features need a live structured handle even though the credential check is local.
    #[error("Admin features are unavailable until the store is reachable")]
    StoreUnavailable,

    #[error("Sign in required")]
    NotSignedIn,
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = match self {
            BoardError::ConfigInvalid(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BoardError::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
            BoardError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            BoardError::DecodeFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };

        (status, self.to_string()).into_response()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::UnknownId | AuthError::WrongPassword => StatusCode::UNAUTHORIZED,
            AuthError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::NotSignedIn => StatusCode::FORBIDDEN,
        };

        (status, self.to_string()).into_response()
    }
}

/// AdminActionError
///
/// Union of the two failure families a create-item request can hit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminActionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Board(#[from] BoardError),
}

impl IntoResponse for AdminActionError {
    fn into_response(self) -> Response {
        match self {
            AdminActionError::Auth(e) => e.into_response(),
            AdminActionError::Board(e) => e.into_response(),
        }
    }
}
