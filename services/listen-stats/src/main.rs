//!
//! src/main.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Entry point of the listening statistics service. Takes Spotify
//! credentials and one or more streaming history exports, prints the
//! report
//!
//!

mod config;
mod errors;
mod logging;

mod catalog;
mod fetch;
mod history;
mod report;
mod sink;
mod stats;
mod types;

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info, warn};

use crate::catalog::CatalogLookup;
use crate::config::{AppConfig, Credentials};
use crate::errors::StatsError;
use crate::fetch::{SpotifyClient, SpotifySession};
use crate::history::DedupPolicy;
use crate::report::{OutputFormat, Report};
use crate::sink::ReportSink;
use crate::stats::Stats;

#[derive(Parser, Debug)]
#[command(name = "listen-stats", version)]
#[command(about = "Top tracks, artists, genres and daily listening from a streaming history export")]
struct Cli {
    /// History export files (StreamingHistory_music_N.json), `-` reads stdin
    files: Vec<PathBuf>,

    /// Spotify client id, overrides SPOTIFY_CLIENT_ID
    #[arg(long)]
    client_id: Option<String>,

    /// Spotify client secret, overrides SPOTIFY_CLIENT_SECRET
    #[arg(long)]
    client_secret: Option<String>,

    /// Market the artist search is scoped to
    #[arg(long)]
    market: Option<String>,

    /// Entries per ranking
    #[arg(long)]
    top: Option<usize>,

    /// Genres listed in the report
    #[arg(long)]
    genres: Option<usize>,

    /// How overlapping duplicate records are removed
    #[arg(long, value_enum)]
    dedup: Option<DedupPolicy>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>
}

impl Cli {
    fn apply(&self, cfgs: &mut AppConfig) {
        cfgs.set_credentials(self.client_id.clone(), self.client_secret.clone());
        if let Some(market) = &self.market {
            cfgs.spotify.market = market.clone();
        }
        if let Some(top) = self.top {
            cfgs.stats.top_n = top;
        }
        if let Some(genres) = self.genres {
            cfgs.stats.genre_limit = genres;
        }
        if let Some(dedup) = self.dedup {
            cfgs.stats.dedup = dedup;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StatsError> {
    let cli = Cli::parse();
    let mut cfgs = config::load_config()?;
    cli.apply(&mut cfgs);

    let _logger = logging::init_logging(&cfgs.logging)?;

    info!(
        service = "listen-stats",
        version = %env!("CARGO_PKG_VERSION"),
        "starting"
    );
    debug!(config = ?cfgs, "configuration");

    run(&cli, &cfgs).await
}

///
/// Credentials, then token, then history. Each missing piece stops the
/// run with a message for the user rather than an error.
///
async fn run(cli: &Cli, cfgs: &AppConfig) -> Result<(), StatsError> {
    let Some(creds) = &cfgs.spotify.credentials else {
        eprintln!(
            "Enter your Spotify API credentials (--client-id and --client-secret, \
             or SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET)"
        );
        return Ok(());
    };

    let client = SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
    run_with(client, creds, cli, cfgs).await
}

/// Token, history, report, for an already built client
async fn run_with(
    client: SpotifyClient,
    creds: &Credentials,
    cli: &Cli,
    cfgs: &AppConfig
) -> Result<(), StatsError> {
    let session = match SpotifySession::connect(client, creds).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            warn!("spotify.token.missing");
            eprintln!("Invalid credentials: Spotify granted no access token");
            return Ok(());
        },
        Err(e) => {
            warn!(error = %e, "spotify.token.failed");
            eprintln!("Could not obtain a Spotify access token: {e}");
            return Ok(());
        }
    };

    if cli.files.is_empty() {
        eprintln!("Provide your streaming history file (StreamingHistory_music_0.json)");
        return Ok(());
    }

    let history = history::load_history_files(&cli.files, cfgs.stats.dedup)?;
    let stats = Stats::compute(&history, cfgs.stats.top_n);

    let mut catalog = CatalogLookup::new(session);
    let report = Report::assemble(stats, &mut catalog, cfgs.stats.genre_limit).await;
    info!(artists = catalog.cached(), "catalog.done");

    let rendered = report.render(cli.format.unwrap_or_default())?;
    if let Some(path) = ReportSink::new(cli.output.as_deref()).write(&rendered)? {
        info!(path = %path.display(), "report.written");
    }

    Ok(())
}
