use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GrantType {
    Password,
    RefreshToken,
    ClientCredentials,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
            GrantType::ClientCredentials => "client_credentials",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unsupported grant type: {0:?}")]
pub struct UnsupportedGrantType(pub String);

impl FromStr for GrantType {
    type Err = UnsupportedGrantType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(GrantType::Password),
            "refresh_token" => Ok(GrantType::RefreshToken),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            other => Err(UnsupportedGrantType(other.to_owned())),
        }
    }
}

/// A token request after grant-type dispatch, with every field the grant
/// needs already present.
#[derive(Clone)]
pub enum Grant {
    Password {
        username: String,
        password: String,
    },
    RefreshToken {
        refresh_token: String,
    },
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

impl Grant {
    pub fn grant_type(&self) -> GrantType {
        match self {
            Grant::Password { .. } => GrantType::Password,
            Grant::RefreshToken { .. } => GrantType::RefreshToken,
            Grant::ClientCredentials { .. } => GrantType::ClientCredentials,
        }
    }
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Grant::RefreshToken { .. } => f.debug_struct("RefreshToken").finish_non_exhaustive(),
            Grant::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_grant_types() {
        for grant_type in [
            GrantType::Password,
            GrantType::RefreshToken,
            GrantType::ClientCredentials,
        ] {
            assert_eq!(grant_type.as_str().parse::<GrantType>().unwrap(), grant_type);
        }
    }

    #[test]
    fn rejects_unknown_grant_types() {
        let err = "authorization_code".parse::<GrantType>().unwrap_err();
        assert_eq!(err.0, "authorization_code");
        assert!("PASSWORD".parse::<GrantType>().is_err());
    }

    #[test]
    fn debug_hides_secrets() {
        let grant = Grant::Password {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let printed = format!("{:?}", grant);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }
}
