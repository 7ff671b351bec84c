use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "token-authority", about = "OAuth2-style token endpoint with refresh-token rotation")]
pub struct Cli {
    /// Settings file (TOML). Defaults to settings/dev.toml in debug builds.
    #[arg(long)]
    pub settings: Option<String>,

    /// Listen address, overriding `http.address`.
    #[arg(long)]
    pub address: Option<String>,
}
