use anyhow::{Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub identity: Identity,
    pub log: Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    pub jwt: Jwt,
    pub access_token_lifetime: AccessTokenLifetime,
    pub refresh_token_lifetime: RefreshTokenLifetime,
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Clone, Deserialize)]
pub struct Jwt {
    pub issuer: String,
    pub audience: String,
    #[serde(default)]
    pub signing_symmetric_key: Option<String>,
    #[serde(default)]
    pub signing_certificate: Option<SigningCertificate>,
    #[serde(default = "default_clock_skew_secs")]
    pub clock_skew_secs: u64,
}

// Key material stays out of the startup log.
impl std::fmt::Debug for Jwt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwt")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field(
                "signing_symmetric_key",
                &self.signing_symmetric_key.as_ref().map(|_| "<redacted>"),
            )
            .field("signing_certificate", &self.signing_certificate)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct SigningCertificate {
    pub path: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for SigningCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCertificate")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Minutes.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenLifetime {
    pub resource_owner_credentials: u64,
    pub client_credentials: u64,
}

/// Minutes.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenLifetime {
    pub resource_owner_credentials: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rotation {
    /// Revoke the whole rotation chain when a consumed token is replayed.
    pub strict: bool,
    pub sweep_interval_secs: u64,
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation {
            strict: true,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub backend: String, // "fake" or "static"
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub clients: Vec<ClientEntry>,
}

#[derive(Clone, Deserialize)]
pub struct UserEntry {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserEntry")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Deserialize)]
pub struct ClientEntry {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEntry")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_clock_skew_secs() -> u64 {
    120
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Overrides look like `TOKEN_AUTHORITY__AUTH__JWT__ISSUER=...`.
const ENV_PREFIX: &str = "TOKEN_AUTHORITY";

impl Settings {
    fn validate(self) -> Result<Self> {
        let lifetimes = [
            (
                "auth.access_token_lifetime.resource_owner_credentials",
                self.auth.access_token_lifetime.resource_owner_credentials,
            ),
            (
                "auth.access_token_lifetime.client_credentials",
                self.auth.access_token_lifetime.client_credentials,
            ),
            (
                "auth.refresh_token_lifetime.resource_owner_credentials",
                self.auth.refresh_token_lifetime.resource_owner_credentials,
            ),
        ];
        for (name, minutes) in lifetimes {
            check_range(name, minutes, MAX_LIFETIME_MINUTES)?;
        }
        check_range(
            "auth.rotation.sweep_interval_secs",
            self.auth.rotation.sweep_interval_secs,
            MAX_SWEEP_INTERVAL_SECS,
        )?;
        if self.auth.jwt.clock_skew_secs > MAX_CLOCK_SKEW_SECS {
            return Err(anyhow!(
                "auth.jwt.clock_skew_secs must be at most {}",
                MAX_CLOCK_SKEW_SECS
            ));
        }
        Ok(self)
    }
}

/// Ten years.
const MAX_LIFETIME_MINUTES: u64 = 10 * 365 * 24 * 60;
const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MAX_CLOCK_SKEW_SECS: u64 = 60 * 60;

fn check_range(name: &str, value: u64, max: u64) -> Result<()> {
    if value == 0 {
        return Err(anyhow!("{} must be greater than zero", name));
    }
    if value > max {
        return Err(anyhow!("{} must be at most {}", name, max));
    }
    Ok(())
}

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()
}

/// Parse settings from inline TOML, without environment overrides.
pub fn parse_settings_str(toml: &str) -> Result<Settings> {
    let settings: Settings = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()
}

#[cfg(test)]
pub(crate) const TEST_SETTINGS: &str = r#"
[http]
address = "127.0.0.1:0"

[log]
filter = "debug"

[auth.jwt]
issuer = "https://localhost:44352"
audience = "practical.jwt"
signing_symmetric_key = "0123456789abcdef0123456789abcdef0123456789abcdef"

[auth.access_token_lifetime]
resource_owner_credentials = 5
client_credentials = 60

[auth.refresh_token_lifetime]
resource_owner_credentials = 1440

[identity]
backend = "fake"
"#;
