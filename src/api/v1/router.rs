use super::credentials::AuthorizationHeader;
use super::error::*;
use super::handler;
use crate::application_port::TokenCodec;
use crate::domain_model::Principal;
use crate::domain_port::Clock;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::HeaderMap;
use warp::{Filter, reject};

const AUTHORIZATION: &str = "authorization";

/// Request bodies beyond this are refused before parsing.
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let token = warp::path!("connect" / "token")
        .and(warp::post())
        .and(authorization(ApiErrorCode::InvalidClient))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::form::<handler::TokenForm>())
        .and(with(server.grant_service.clone()))
        .and_then(handler::issue_token);

    let verified = with_verification(server.token_codec.clone(), server.clock.clone());

    let list_users = warp::path!("api" / "users")
        .and(warp::get())
        .and(verified.clone())
        .and_then(handler::list_users);

    let create_user = warp::path!("api" / "users")
        .and(warp::post())
        .and(verified.clone())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<handler::UserModel>())
        .and_then(handler::create_user);

    let update_user = warp::path!("api" / "users" / String)
        .and(warp::put())
        .and(verified.clone())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<handler::UserModel>())
        .and_then(handler::update_user);

    let delete_user = warp::path!("api" / "users" / String)
        .and(warp::delete())
        .and(verified)
        .and_then(handler::delete_user);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec![AUTHORIZATION, "content-type"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    token
        .or(list_users)
        .or(create_user)
        .or(update_user)
        .or(delete_user)
        .with(cors)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// The raw `Authorization` value, if any. A value that is not visible ASCII
/// is rejected with `on_invalid` instead of warp's generic header error.
fn authorization(
    on_invalid: ApiErrorCode,
) -> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone {
    warp::header::headers_cloned().and_then(move |headers: HeaderMap| async move {
        match headers.get(AUTHORIZATION) {
            None => Ok(None),
            Some(value) => value
                .to_str()
                .map(|value| Some(value.to_string()))
                .map_err(|_| reject::custom(on_invalid)),
        }
    })
}

fn with_verification(
    token_codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn Clock>,
) -> impl Filter<Extract = (Principal,), Error = warp::Rejection> + Clone {
    authorization(ApiErrorCode::InvalidToken).and_then(move |header: Option<String>| {
        let token_codec = token_codec.clone();
        let clock = clock.clone();
        async move {
            match header.as_deref().map(AuthorizationHeader::parse) {
                Some(Ok(AuthorizationHeader::Bearer(token))) => {
                    let verified = token_codec
                        .verify_access_token(&token, clock.now())
                        .map_err(ApiErrorCode::from)
                        .map_err(reject::custom)?;
                    Ok(verified.principal)
                }
                _ => Err(reject::custom(ApiErrorCode::InvalidToken)),
            }
        }
    })
}
