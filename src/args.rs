use clap::Parser;
use std::{fs, io, path::Path};

/// Interactive client for the webhooks journal API.
///
/// Every flag can also be supplied through its environment variable or a
/// `.env` file in the working directory or `<config dir>/journal-cli/`.
#[derive(Parser, Debug, Default)]
#[command(name = "journal-cli", version)]
pub struct Args {
    /// OAuth client id of the app
    #[arg(long, env = "JOURNAL_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret, or a path to a file containing it
    #[arg(long, env = "JOURNAL_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Base URL of the API, e.g. https://api.example.com
    #[arg(long, env = "JOURNAL_API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// OAuth token endpoint
    #[arg(long, env = "JOURNAL_TOKEN_URL")]
    pub token_url: Option<String>,

    /// Portal used as the default answer in prompts
    #[arg(long, env = "JOURNAL_PORTAL_ID")]
    pub portal_id: Option<String>,

    /// Space separated OAuth scopes, overriding the built-in list
    #[arg(long, env = "JOURNAL_SCOPES")]
    pub scopes: Option<String>,

    /// Verbose logging and raw JSON output. The variable accepts 1/0,
    /// true/false, yes/no, on/off.
    #[arg(
        long,
        env = "JOURNAL_DEBUG",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub debug: bool,
}

impl Args {
    /// Secrets may be given inline or as a path to a file holding them.
    pub fn parse_secret(input: &str) -> io::Result<String> {
        if Path::new(input).is_file() {
            Ok(fs::read_to_string(input)?.trim().to_string())
        } else {
            Ok(input.to_string())
        }
    }
}

/// Load `.env` files before clap reads the environment. Values already set
/// in the process environment win over both files.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
    if let Some(dir) = dirs::config_dir() {
        dotenvy::from_path(dir.join("journal-cli").join(".env")).ok();
    }
}
