// Validated runtime configuration built from `Args`.

use crate::args::Args;
use crate::error::{Error, Result};
use std::time::Duration;
use url::Url;

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: &[&str] = &[
    "developer.webhooks_journal.read",
    "developer.webhooks_journal.subscriptions.read",
    "developer.webhooks_journal.subscriptions.write",
    "developer.webhooks_journal.snapshots.read",
    "developer.webhooks_journal.snapshots.write",
];

/// Timeout for API calls, token exchanges and signed-URL downloads.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub api_base_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub default_portal_id: Option<u64>,
    pub debug: bool,
}

impl Config {
    /// Validate the parsed arguments. All problems are collected into a
    /// single `Error::Config` so the operator can fix them in one go.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut problems = Vec::new();

        let client_id = required(&args.client_id, "--client-id", "JOURNAL_CLIENT_ID", &mut problems);
        let client_secret = required(
            &args.client_secret,
            "--client-secret",
            "JOURNAL_CLIENT_SECRET",
            &mut problems,
        )
        .and_then(|raw| match Args::parse_secret(&raw) {
            Ok(secret) => Some(secret),
            Err(e) => {
                problems.push(format!("could not read client secret file {}: {}", raw, e));
                None
            }
        });
        let api_base_url = required(
            &args.api_base_url,
            "--api-base-url",
            "JOURNAL_API_BASE_URL",
            &mut problems,
        )
        .and_then(|raw| valid_url(&raw, "JOURNAL_API_BASE_URL", &mut problems))
        .map(|u| u.trim_end_matches('/').to_string());
        let token_url = required(&args.token_url, "--token-url", "JOURNAL_TOKEN_URL", &mut problems)
            .and_then(|raw| valid_url(&raw, "JOURNAL_TOKEN_URL", &mut problems));

        let default_portal_id = match args.portal_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    problems.push(format!("JOURNAL_PORTAL_ID must be a numeric portal id, got {:?}", raw));
                    None
                }
            },
        };

        let scopes = match args.scopes.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                raw.split_whitespace().map(str::to_string).collect()
            }
            _ => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        match (client_id, client_secret, api_base_url, token_url) {
            (Some(client_id), Some(client_secret), Some(api_base_url), Some(token_url))
                if problems.is_empty() =>
            {
                Ok(Config {
                    client_id,
                    client_secret,
                    api_base_url,
                    token_url,
                    scopes,
                    default_portal_id,
                    debug: args.debug,
                })
            }
            _ => Err(Error::Config(problems.join("\n"))),
        }
    }

    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

fn required(
    value: &Option<String>,
    flag: &str,
    env: &str,
    problems: &mut Vec<String>,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            problems.push(format!("missing {} (set {} or pass {})", env, env, flag));
            None
        }
    }
}

fn valid_url(raw: &str, env: &str, problems: &mut Vec<String>) -> Option<String> {
    match Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Some(raw.to_string()),
        Ok(u) => {
            problems.push(format!("{} must be an http(s) URL, got scheme {:?}", env, u.scheme()));
            None
        }
        Err(e) => {
            problems.push(format!("{} is not a valid URL ({}): {}", env, e, raw));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_args() -> Args {
        Args {
            client_id: Some("client".into()),
            client_secret: Some("secret".into()),
            api_base_url: Some("https://api.example.com/".into()),
            token_url: Some("https://api.example.com/oauth/v1/token".into()),
            portal_id: Some("12345".into()),
            scopes: None,
            debug: false,
        }
    }

    #[test]
    fn valid_arguments_build_a_config() {
        let config = Config::from_args(&full_args()).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.default_portal_id, Some(12345));
        assert_eq!(config.scopes.len(), DEFAULT_SCOPES.len());
    }

    #[test]
    fn missing_values_are_all_reported() {
        let args = Args::default();
        let err = Config::from_args(&args).unwrap_err();
        let msg = err.to_string();
        for env in ["JOURNAL_CLIENT_ID", "JOURNAL_CLIENT_SECRET", "JOURNAL_API_BASE_URL", "JOURNAL_TOKEN_URL"] {
            assert!(msg.contains(env), "{env} missing from {msg}");
        }
    }

    #[test]
    fn malformed_values_are_rejected() {
        let args = Args {
            token_url: Some("not a url".into()),
            portal_id: Some("abc".into()),
            ..full_args()
        };
        let msg = Config::from_args(&args).unwrap_err().to_string();
        assert!(msg.contains("JOURNAL_TOKEN_URL"));
        assert!(msg.contains("JOURNAL_PORTAL_ID"));
    }

    #[test]
    fn custom_scopes_override_defaults() {
        let args = Args {
            scopes: Some("a b  c".into()),
            ..full_args()
        };
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.scope_param(), "a b c");
    }
}
