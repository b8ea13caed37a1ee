mod aggregate;
mod api_types;
mod chara;
mod diagnostics;
mod fetch;
mod matcher;
mod models;
mod orchestrator;
mod out_models;
mod reconcile;
mod render;
mod rules;
mod text_table;

use anyhow::Result;
use clap::Parser;
use orchestrator::{run, RunConfig, UpstreamSource};
use std::path::PathBuf;
use tracing::{debug, info};

/// cjedb-gen - builds the event choice database from the upstream feed and master.mdb
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the game's master.mdb (SQLite)
    #[arg(long, default_value = "master.mdb")]
    db_path: PathBuf,

    /// Output JSON file
    #[arg(short, long, default_value = "cjedb.json")]
    output: PathBuf,

    /// Also emit the upstream event name for each story
    #[arg(long)]
    include_name: bool,

    /// Upstream feed URL
    #[arg(long, default_value = fetch::UPSTREAM_DATA_URL)]
    upstream_url: String,

    /// Read the upstream feed from a local file instead of fetching it
    #[arg(long)]
    upstream_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Warnings are the actionable part; info adds every confident fuzzy match.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    let args = Args::parse();
    info!("Starting cjedb-gen");

    let upstream = match args.upstream_file {
        Some(path) => {
            debug!("Using upstream file from --upstream-file: {}", path.display());
            UpstreamSource::File(path)
        }
        None => {
            debug!("Using upstream URL: {}", args.upstream_url);
            UpstreamSource::Url(args.upstream_url)
        }
    };

    let cfg = RunConfig {
        db_path: args.db_path,
        output: args.output,
        include_name: args.include_name,
        upstream,
    };

    run(&cfg).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let args = Args::parse_from(["cjedb-gen"]);
        assert_eq!(args.db_path, PathBuf::from("master.mdb"));
        assert_eq!(args.output, PathBuf::from("cjedb.json"));
        assert!(!args.include_name);
        assert_eq!(args.upstream_url, fetch::UPSTREAM_DATA_URL);
        assert!(args.upstream_file.is_none());
    }

    #[test]
    fn cli_overrides() {
        let args = Args::parse_from([
            "cjedb-gen",
            "--db-path",
            "/tmp/master.mdb",
            "-o",
            "out.json",
            "--include-name",
            "--upstream-file",
            "feed.js",
        ]);
        assert_eq!(args.db_path, PathBuf::from("/tmp/master.mdb"));
        assert!(args.include_name);
        assert_eq!(args.upstream_file, Some(PathBuf::from("feed.js")));
    }
}
