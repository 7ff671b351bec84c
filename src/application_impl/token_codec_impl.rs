use crate::application_port::*;
use crate::domain_model::{ClientId, GrantType, Principal, Subject};
use crate::settings;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the signing key comes from. Exactly one mode per deployment.
#[derive(Clone)]
pub enum SigningMaterial {
    Symmetric(Vec<u8>),
    /// PEM-encoded RSA private key (PKCS#1, PKCS#8, or encrypted PKCS#8).
    Certificate {
        path: PathBuf,
        password: Option<String>,
    },
}

impl SigningMaterial {
    /// A non-blank symmetric key wins; otherwise a non-blank certificate path;
    /// otherwise there is nothing to sign with.
    pub fn from_settings(jwt: &settings::Jwt) -> Result<Self, SigningError> {
        if let Some(key) = jwt
            .signing_symmetric_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
        {
            return Ok(SigningMaterial::Symmetric(key.as_bytes().to_vec()));
        }

        if let Some(cert) = jwt
            .signing_certificate
            .as_ref()
            .filter(|c| !c.path.trim().is_empty())
        {
            return Ok(SigningMaterial::Certificate {
                path: PathBuf::from(&cert.path),
                password: cert.password.clone().filter(|p| !p.is_empty()),
            });
        }

        Err(SigningError::SigningConfigurationMissing)
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub clock_skew: Duration,
}

impl From<&settings::Jwt> for JwtConfig {
    fn from(jwt: &settings::Jwt) -> Self {
        JwtConfig {
            issuer: jwt.issuer.clone(),
            audience: jwt.audience.clone(),
            clock_skew: Duration::from_secs(jwt.clock_skew_secs),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    iss: String,
    aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    grant_type: Option<String>,
    iat: i64,
    exp: i64,
    jti: String,
}

impl AccessClaims {
    fn principal(&self) -> Result<Principal, VerifyError> {
        match (&self.sub, &self.client_id) {
            (Some(sub), None) => Ok(Principal::User(Subject(sub.clone()))),
            (None, Some(client_id)) => Ok(Principal::Client(ClientId(client_id.clone()))),
            _ => Err(VerifyError::Invalid(
                "token must name exactly one of sub or client_id".to_string(),
            )),
        }
    }
}

pub struct JwtCodec {
    cfg: JwtConfig,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtCodec {
    pub fn new(cfg: JwtConfig, material: &SigningMaterial) -> Result<Self, SigningError> {
        let (algorithm, encoding_key, decoding_key) = match material {
            SigningMaterial::Symmetric(secret) => (
                Algorithm::HS256,
                EncodingKey::from_secret(secret),
                DecodingKey::from_secret(secret),
            ),
            SigningMaterial::Certificate { path, password } => {
                let (encoding_key, decoding_key) = load_rsa_keys(path, password.as_deref())?;
                (Algorithm::RS256, encoding_key, decoding_key)
            }
        };
        tracing::info!(?algorithm, issuer = %cfg.issuer, "access token signing key loaded");
        Ok(JwtCodec {
            cfg,
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn validation(&self) -> Validation {
        let mut v = Validation::new(self.algorithm);
        // Expiry is checked against the injected clock in verify_access_token.
        v.validate_exp = false;
        v.required_spec_claims =
            HashSet::from(["exp".to_string(), "iss".to_string(), "aud".to_string()]);
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v
    }
}

fn load_rsa_keys(
    path: &Path,
    password: Option<&str>,
) -> Result<(EncodingKey, DecodingKey), SigningError> {
    let pem = std::fs::read_to_string(path).map_err(|e| SigningError::CertificateUnreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let private_key = match password {
        Some(password) => RsaPrivateKey::from_pkcs8_encrypted_pem(&pem, password.as_bytes())
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?,
        None => match RsaPrivateKey::from_pkcs8_pem(&pem) {
            Ok(key) => key,
            Err(_) => RsaPrivateKey::from_pkcs1_pem(&pem)
                .map_err(|e| SigningError::InvalidKey(e.to_string()))?,
        },
    };

    let private_der = private_key
        .to_pkcs1_der()
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    let public_der = RsaPublicKey::from(&private_key)
        .to_pkcs1_der()
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;

    Ok((
        EncodingKey::from_rsa_der(private_der.as_bytes()),
        DecodingKey::from_rsa_der(public_der.as_bytes()),
    ))
}

impl TokenCodec for JwtCodec {
    fn issue_access_token(
        &self,
        principal: &Principal,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(AccessToken, DateTime<Utc>), SigningError> {
        let exp_dt = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| SigningError::Encoding("access token lifetime out of range".to_string()))?;
        let (sub, client_id, grant_type) = match principal {
            Principal::User(subject) => (Some(subject.0.clone()), None, None),
            Principal::Client(client_id) => (
                None,
                Some(client_id.0.clone()),
                Some(GrantType::ClientCredentials.to_string()),
            ),
        };
        let claims = AccessClaims {
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            sub,
            client_id,
            grant_type,
            iat: now.timestamp(),
            exp: exp_dt.timestamp(),
            jti: Self::gen_jti(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| SigningError::Encoding(e.to_string()))?;
        Ok((AccessToken(token), exp_dt))
    }

    fn verify_access_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedAccessToken, VerifyError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Invalid(e.to_string()),
            })?;
        let claims = data.claims;

        let leeway = i64::try_from(self.cfg.clock_skew.as_secs()).unwrap_or(i64::MAX);
        if claims.exp.saturating_add(leeway) < now.timestamp() {
            return Err(VerifyError::Expired);
        }

        let principal = claims.principal()?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| VerifyError::Invalid("exp out of range".to_string()))?;
        Ok(VerifiedAccessToken {
            principal,
            jti: claims.jti,
            expires_at,
        })
    }
}
