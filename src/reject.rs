//! Rejection plumbing: every handler error becomes an [`ApiRejection`],
//! and `recover` renders them as `{"error": ...}` JSON bodies.

use processor::EvaluateError;
use serde_json::json;
use std::convert::Infallible;
use store::StoreError;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::auth::AuthError;

#[derive(Debug)]
pub(crate) struct ApiRejection {
    pub status: StatusCode,
    pub message: String,
}

impl warp::reject::Reject for ApiRejection {}

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Rejection {
    warp::reject::custom(ApiRejection {
        status,
        message: message.into(),
    })
}

pub(crate) fn from_auth(err: AuthError) -> Rejection {
    let status = match err {
        AuthError::Store(ref inner) => {
            tracing::error!(error = %inner, "session lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::UNAUTHORIZED,
    };
    let message = match status {
        StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
        _ => err.to_string(),
    };
    api_error(status, message)
}

pub(crate) fn from_store(err: StoreError) -> Rejection {
    let status = match err {
        StoreError::ProblemNotFound
        | StoreError::TestCasesNotFound
        | StoreError::TestcaseNotFound => StatusCode::NOT_FOUND,
        StoreError::UserExists => StatusCode::BAD_REQUEST,
        StoreError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        StoreError::Database(ref inner) => {
            tracing::error!(error = %inner, "database error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        StoreError::Password(ref inner) => {
            tracing::error!(error = %inner, "password verification error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let message = match status {
        StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
        _ => err.to_string(),
    };
    api_error(status, message)
}

pub(crate) fn from_evaluate(err: EvaluateError) -> Rejection {
    match err {
        EvaluateError::ProblemNotFound | EvaluateError::TestCasesNotFound => {
            api_error(StatusCode::NOT_FOUND, err.to_string())
        }
        EvaluateError::UnsupportedLanguage(_) => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        EvaluateError::ServerBusy => api_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        EvaluateError::Internal(inner) => {
            tracing::error!(error = %format_args!("{:#}", inner), "evaluation failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

pub(crate) async fn recover(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api) = rejection.find::<ApiRejection>() {
        (api.status, api.message.clone())
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if rejection
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (StatusCode::BAD_REQUEST, "invalid request body".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
        )
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        )
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}
