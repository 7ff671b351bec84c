use super::credentials::AuthorizationHeader;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::{Grant, GrantType, Principal};
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{self, reject};

/// Body of `POST /connect/token`. Which fields are required depends on
/// `grant_type`.
#[derive(Default, Deserialize)]
pub struct TokenForm {
    pub grant_type: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl TokenForm {
    /// Client credentials in a Basic header win over form fields.
    pub fn into_grant(self, authorization: Option<&str>) -> Result<Grant, TokenError> {
        let grant_type: GrantType = self.grant_type.as_deref().unwrap_or_default().parse()?;

        match grant_type {
            GrantType::Password => Ok(Grant::Password {
                username: self.username.ok_or(TokenError::InvalidRequest("username"))?,
                password: self.password.unwrap_or_default(),
            }),
            GrantType::RefreshToken => Ok(Grant::RefreshToken {
                refresh_token: self
                    .refresh_token
                    .ok_or(TokenError::InvalidRequest("refresh_token"))?,
            }),
            GrantType::ClientCredentials => {
                let basic = match authorization.map(AuthorizationHeader::parse).transpose() {
                    Ok(Some(AuthorizationHeader::Basic {
                        client_id,
                        client_secret,
                    })) => Some((client_id, client_secret)),
                    Ok(_) => None,
                    Err(e) => {
                        debug!("rejecting Basic credentials: {}", e);
                        return Err(TokenError::InvalidClient);
                    }
                };
                let (client_id, client_secret) = match basic {
                    Some(pair) => pair,
                    None => (
                        self.client_id.ok_or(TokenError::InvalidRequest("client_id"))?,
                        self.client_secret.unwrap_or_default(),
                    ),
                };
                Ok(Grant::ClientCredentials {
                    client_id,
                    client_secret,
                })
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: AccessToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<RefreshToken>,
    pub expires: DateTime<Utc>,
}

impl From<TokenGrant> for TokenResponse {
    fn from(grant: TokenGrant) -> Self {
        TokenResponse {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires: grant.access_token_expires_at,
        }
    }
}

pub async fn issue_token(
    authorization: Option<String>,
    form: TokenForm,
    grant_service: Arc<dyn GrantService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let grant = form
        .into_grant(authorization.as_deref())
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let token_grant = grant_service
        .grant(grant)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&TokenResponse::from(token_grant)))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserModel {
    #[serde(default)]
    pub id: String,
}

pub async fn list_users(principal: Principal) -> Result<impl warp::Reply, warp::Rejection> {
    debug!(%principal, "listing users");
    let users = vec![
        UserModel {
            id: "1".to_string(),
        },
        UserModel {
            id: "2".to_string(),
        },
    ];
    Ok(warp::reply::json(&users))
}

pub async fn create_user(
    principal: Principal,
    user: UserModel,
) -> Result<impl warp::Reply, warp::Rejection> {
    debug!(%principal, id = %user.id, "creating user");
    Ok(warp::reply::json(&user))
}

/// The path id overrides whatever the body carries.
pub async fn update_user(
    id: String,
    principal: Principal,
    mut user: UserModel,
) -> Result<impl warp::Reply, warp::Rejection> {
    debug!(%principal, %id, "updating user");
    user.id = id;
    Ok(warp::reply::json(&user))
}

pub async fn delete_user(
    id: String,
    principal: Principal,
) -> Result<impl warp::Reply, warp::Rejection> {
    debug!(%principal, %id, "deleting user");
    Ok(warp::reply::with_status(
        warp::reply(),
        warp::http::StatusCode::NO_CONTENT,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::STANDARD};

    fn form(grant_type: &str) -> TokenForm {
        TokenForm {
            grant_type: Some(grant_type.to_string()),
            ..TokenForm::default()
        }
    }

    #[test]
    fn missing_or_unknown_grant_type_is_unsupported() {
        let err = TokenForm::default().into_grant(None).unwrap_err();
        assert!(matches!(err, TokenError::UnsupportedGrantType(_)));

        let err = form("authorization_code").into_grant(None).unwrap_err();
        assert!(matches!(err, TokenError::UnsupportedGrantType(t) if t == "authorization_code"));
    }

    #[test]
    fn password_grant_needs_username_only() {
        let err = form("password").into_grant(None).unwrap_err();
        assert!(matches!(err, TokenError::InvalidRequest("username")));

        let grant = TokenForm {
            username: Some("test@abc.com".to_string()),
            ..form("password")
        }
        .into_grant(None)
        .unwrap();
        assert!(matches!(grant, Grant::Password { ref username, ref password }
            if username == "test@abc.com" && password.is_empty()));
    }

    #[test]
    fn refresh_grant_needs_token() {
        let err = form("refresh_token").into_grant(None).unwrap_err();
        assert!(matches!(err, TokenError::InvalidRequest("refresh_token")));
    }

    #[test]
    fn basic_header_wins_over_form_fields() {
        let header = format!("Basic {}", STANDARD.encode("from-header:hs"));
        let grant = TokenForm {
            client_id: Some("from-form".to_string()),
            client_secret: Some("fs".to_string()),
            ..form("client_credentials")
        }
        .into_grant(Some(&header))
        .unwrap();

        assert!(matches!(grant, Grant::ClientCredentials { ref client_id, ref client_secret }
            if client_id == "from-header" && client_secret == "hs"));
    }

    #[test]
    fn client_credentials_fall_back_to_form() {
        let grant = TokenForm {
            client_id: Some("svc".to_string()),
            client_secret: Some("s3cret".to_string()),
            ..form("client_credentials")
        }
        .into_grant(Some("Bearer unrelated"))
        .unwrap();
        assert!(matches!(grant, Grant::ClientCredentials { ref client_id, .. } if client_id == "svc"));

        let err = form("client_credentials").into_grant(None).unwrap_err();
        assert!(matches!(err, TokenError::InvalidRequest("client_id")));
    }

    #[test]
    fn malformed_basic_header_is_invalid_client() {
        let err = form("client_credentials")
            .into_grant(Some("Basic not-base64!"))
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidClient));
    }
}
