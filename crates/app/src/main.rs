mod config;
mod logging;
mod terminal;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use services::{AppServices, Clock, source_for};

use crate::config::{Config, Invocation, prepare_sqlite_file, print_usage};
use crate::logging::init_logging;
use crate::terminal::Terminal;

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Config::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;
    let config = match parsed {
        Invocation::Help => {
            print_usage();
            return Ok(());
        }
        Invocation::Run(config) => config,
    };

    init_logging(config.verbosity);
    info!(
        data = config.data.as_str(),
        db = config.db_url.as_str(),
        offline_cache = config.offline_cache,
        "starting cmdcards"
    );

    // Open + migrate SQLite here so the library crates never touch the filesystem layout.
    prepare_sqlite_file(&config.db_url)?;
    let services = AppServices::new_sqlite(
        &config.db_url,
        source_for(&config.data),
        Clock::system(),
        config.offline_cache,
    )
    .await?;

    let input = BufReader::new(tokio::io::stdin()).lines();
    let mut terminal = Terminal::new(input, std::io::stdout(), services, config.advance_delay);
    terminal.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(2);
    }
}
