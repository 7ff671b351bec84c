use base64::{Engine, engine::general_purpose::STANDARD};

/// Credentials carried by an `Authorization` header. Scheme names are matched
/// case-insensitively.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthorizationHeader {
    Basic { client_id: String, client_secret: String },
    Bearer(String),
    Other,
}

impl std::fmt::Debug for AuthorizationHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationHeader::Basic { client_id, .. } => f
                .debug_struct("Basic")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            AuthorizationHeader::Bearer(_) => f.write_str("Bearer(..)"),
            AuthorizationHeader::Other => f.write_str("Other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedBasic {
    #[error("invalid base64 in Basic credentials")]
    Base64,
    #[error("invalid UTF-8 in Basic credentials")]
    Utf8,
    #[error("Basic credentials must be 'id:secret'")]
    MissingColon,
}

impl AuthorizationHeader {
    pub fn parse(header: &str) -> Result<Self, MalformedBasic> {
        let header = header.trim();
        let (scheme, value) = header.split_once(' ').unwrap_or((header, ""));
        let value = value.trim();

        if scheme.eq_ignore_ascii_case("basic") {
            let (client_id, client_secret) = parse_basic(value)?;
            Ok(AuthorizationHeader::Basic {
                client_id,
                client_secret,
            })
        } else if scheme.eq_ignore_ascii_case("bearer") && !value.is_empty() {
            Ok(AuthorizationHeader::Bearer(value.to_string()))
        } else {
            Ok(AuthorizationHeader::Other)
        }
    }
}

fn parse_basic(encoded: &str) -> Result<(String, String), MalformedBasic> {
    let decoded = STANDARD.decode(encoded).map_err(|_| MalformedBasic::Base64)?;
    let decoded = String::from_utf8(decoded).map_err(|_| MalformedBasic::Utf8)?;
    let (client_id, client_secret) = decoded.split_once(':').ok_or(MalformedBasic::MissingColon)?;
    Ok((client_id.to_string(), client_secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn parses_basic_credentials() {
        assert_eq!(
            AuthorizationHeader::parse(&basic("svc:s3cret")).unwrap(),
            AuthorizationHeader::Basic {
                client_id: "svc".to_string(),
                client_secret: "s3cret".to_string(),
            }
        );
    }

    #[test]
    fn secret_may_contain_colons() {
        match AuthorizationHeader::parse(&basic("svc:a:b:c")).unwrap() {
            AuthorizationHeader::Basic { client_secret, .. } => assert_eq!(client_secret, "a:b:c"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let lower = format!("basic {}", STANDARD.encode("svc:x"));
        assert!(matches!(
            AuthorizationHeader::parse(&lower).unwrap(),
            AuthorizationHeader::Basic { .. }
        ));
        assert_eq!(
            AuthorizationHeader::parse("BEARER abc.def.ghi").unwrap(),
            AuthorizationHeader::Bearer("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn malformed_basic_is_an_error() {
        assert_eq!(
            AuthorizationHeader::parse("Basic !!!"),
            Err(MalformedBasic::Base64)
        );
        assert_eq!(
            AuthorizationHeader::parse(&basic("no-colon")),
            Err(MalformedBasic::MissingColon)
        );
    }

    #[test]
    fn other_schemes_are_ignored() {
        assert_eq!(
            AuthorizationHeader::parse("Digest realm=x").unwrap(),
            AuthorizationHeader::Other
        );
        assert_eq!(AuthorizationHeader::parse("Bearer").unwrap(), AuthorizationHeader::Other);
    }

    #[test]
    fn debug_hides_secrets() {
        let printed = format!("{:?}", AuthorizationHeader::parse(&basic("svc:s3cret")).unwrap());
        assert!(printed.contains("svc"));
        assert!(!printed.contains("s3cret"));
    }
}
