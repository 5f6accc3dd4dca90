//! Activity Stream admin tool
//!
//! Stores activities, publishes them into streams and reads stream pages
//! from the SQLite database described by the config.
//!
//! ## Usage
//!
//! ```bash
//! # Store an activity read from a JSON file
//! activity-stream store --file activity.json
//!
//! # Publish to several streams (stdin)
//! echo '{"verb":"JOIN"}' | activity-stream publish --file - --stream feed:alice --stream group:rust
//!
//! # Read the newest page, then follow the printed token
//! activity-stream page feed:alice --limit 20
//! activity-stream page feed:alice --token 'size=20&after=1421679584000'
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use activity_stream::{Activity, ActivityStream, Config, Direction, PageToken, SqliteBackend};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "activity-stream")]
#[command(about = "Bounded activity streams over SQLite")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "ACTIVITY_STREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "ACTIVITY_STREAM_DIR")]
    storage_dir: Option<PathBuf>,

    /// Entries kept per stream (0 or negative = unbounded)
    #[arg(long, allow_negative_numbers = true)]
    max_stream_size: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store an activity without adding it to any stream
    Store {
        /// Activity JSON file, `-` for stdin
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Store an activity and add it to streams
    Publish {
        /// Activity JSON file, `-` for stdin
        #[arg(short, long)]
        file: PathBuf,
        /// Target stream (repeatable)
        #[arg(short, long = "stream", required = true)]
        streams: Vec<String>,
    },

    /// Print an activity by id
    Get {
        id: String,
    },

    /// Print a page of a stream with its continuation tokens
    Page {
        stream: String,
        /// Page size (0 = whole stream)
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Newer entries than this score
        #[arg(long, conflicts_with_all = ["after", "token"])]
        before: Option<i64>,
        /// Older entries than this score
        #[arg(long, conflicts_with = "token")]
        after: Option<i64>,
        /// Continuation token from a previous page
        #[arg(long)]
        token: Option<String>,
    },
}

fn read_activity(file: &Path) -> anyhow::Result<Activity> {
    let content = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?
    };

    let mut activity: Activity = serde_json::from_str(&content).context("parsing activity JSON")?;
    if activity.id.is_empty() {
        activity.id = uuid::Uuid::new_v4().simple().to_string();
    }
    Ok(activity)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("activity_stream=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(max) = args.max_stream_size {
        config.max_stream_size = max;
    }

    std::fs::create_dir_all(&config.storage_dir)?;

    let config_path = config.config_path();
    if args.config.is_none() && !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let backend = SqliteBackend::open(&config.database_path(), &config.pool_settings())?;
    let streams = ActivityStream::from_config(backend, &config);

    match args.command {
        Command::Store { file } => {
            let stored = streams.store_activity(read_activity(&file)?)?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Command::Publish { file, streams: targets } => {
            let activity = read_activity(&file)?;
            let id = activity.id.clone();
            let targets: Vec<&str> = targets.iter().map(String::as_str).collect();

            let errors = streams.add_to_streams(activity, &targets);
            for e in &errors {
                eprintln!("error: {}", e);
            }
            if !errors.is_empty() {
                bail!("{} of {} streams failed", errors.len(), targets.len());
            }
            println!("{}", serde_json::to_string_pretty(&streams.get(&id)?)?);
        }
        Command::Get { id } => {
            println!("{}", serde_json::to_string_pretty(&streams.get(&id)?)?);
        }
        Command::Page {
            stream,
            limit,
            before,
            after,
            token,
        } => {
            let page = match (token, before, after) {
                (Some(token), _, _) => streams.follow(&stream, &token.parse::<PageToken>()?)?,
                (None, Some(pivot), _) => streams.get_page(&stream, limit, pivot, Direction::Before)?,
                (None, None, Some(pivot)) => streams.get_page(&stream, limit, pivot, Direction::After)?,
                (None, None, None) => streams.get_page(&stream, limit, 0, Direction::After)?,
            };
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
    }

    Ok(())
}
