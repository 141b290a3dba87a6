// Entrypoint for the journal CLI.
// - Reads flags, environment and `.env` files into a validated `Config`.
// - Builds the shared token cache and API client, then hands over to the
//   interactive menus until the user exits.

use clap::Parser;
use journal_cli::api::ApiClient;
use journal_cli::args::{self, Args};
use journal_cli::auth::TokenCache;
use journal_cli::config::Config;
use journal_cli::ui::{main_menu, Session};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    args::load_dotenv();
    let args = Args::parse();
    init_logging(args.debug);

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!();
            eprintln!("Set the values above as environment variables, in a .env file");
            eprintln!("or pass them as flags. Run with --help for the full list.");
            std::process::exit(1);
        }
    };

    let tokens = Arc::new(TokenCache::new(&config)?);
    let api = ApiClient::new(&config, tokens)?;
    let mut session = Session::new(api, &config)?;

    main_menu(&mut session)?;
    Ok(())
}

/// Logs go to stderr. `RUST_LOG` wins over `--debug`.
fn init_logging(debug: bool) {
    let default = if debug { "journal_cli=debug,warn" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
