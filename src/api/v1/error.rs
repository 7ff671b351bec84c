use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        *code
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
        || err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
        || err.find::<reject::InvalidHeader>().is_some()
        || err.find::<warp::filters::cors::CorsForbidden>().is_some()
    {
        // Checked before 405: a sibling route on the same path may also
        // have rejected the method.
        ApiErrorCode::InvalidRequest
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::MethodNotAllowed
    } else {
        ApiErrorCode::internal(format!("unhandled rejection: {:?}", err))
    };

    let json = warp::reply::json(&ErrorBody { error: code });
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ApiErrorCode,
}

/// Wire error codes. Every refresh failure collapses into `InvalidGrant`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    #[error("Grant type is not supported")]
    UnsupportedGrantType,
    #[error("Request is missing a required parameter")]
    InvalidRequest,
    #[error("Client authentication failed")]
    InvalidClient,
    #[error("Grant is invalid, expired or revoked")]
    InvalidGrant,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    ServerError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::ServerError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::UnsupportedGrantType
            | ApiErrorCode::InvalidRequest
            | ApiErrorCode::InvalidClient
            | ApiErrorCode::InvalidGrant => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<TokenError> for ApiErrorCode {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::UnsupportedGrantType(_) => ApiErrorCode::UnsupportedGrantType,
            TokenError::InvalidRequest(_) => ApiErrorCode::InvalidRequest,
            TokenError::InvalidClient => ApiErrorCode::InvalidClient,
            TokenError::InvalidCredentials
            | TokenError::UnknownToken
            | TokenError::AlreadyConsumed
            | TokenError::Expired
            | TokenError::Tampered => ApiErrorCode::InvalidGrant,
            TokenError::Store(e) => ApiErrorCode::internal(e),
            TokenError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<VerifyError> for ApiErrorCode {
    fn from(_: VerifyError) -> Self {
        ApiErrorCode::InvalidToken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_failures_are_indistinguishable() {
        for error in [
            TokenError::UnknownToken,
            TokenError::AlreadyConsumed,
            TokenError::Expired,
            TokenError::Tampered,
            TokenError::InvalidCredentials,
        ] {
            assert_eq!(ApiErrorCode::from(error), ApiErrorCode::InvalidGrant);
        }
    }

    #[test]
    fn codes_serialize_in_snake_case() {
        let body = serde_json::to_value(ErrorBody {
            error: ApiErrorCode::UnsupportedGrantType,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "error": "unsupported_grant_type" }));
        assert_eq!(
            serde_json::to_value(ApiErrorCode::ServerError).unwrap(),
            serde_json::json!("server_error")
        );
    }

    #[test]
    fn internal_faults_map_to_500() {
        let code = ApiErrorCode::from(TokenError::Store("lock poisoned".to_string()));
        assert_eq!(code, ApiErrorCode::ServerError);
        assert_eq!(code.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiErrorCode::InvalidToken.status(), StatusCode::UNAUTHORIZED);
    }
}
