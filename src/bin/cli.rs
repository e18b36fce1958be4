use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing::subscriber as tracing_subscriber_global;
use anyhow::{Result, Context};
use playlist_blender as lib;
use lib::api::openai::OpenAiGenerator;
use lib::api::spotify::SpotifyCatalog;
use lib::blend::Blender;
use lib::config::Config;
use lib::models::{AuthContext, BlendRequest, PlaylistTarget};

#[derive(Parser)]
#[command(name = "playlist-blender", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Blend themes into a playlist and publish it
    Blend {
        /// Theme to blend (repeat for each theme, at least two)
        #[arg(long = "theme", required = true)]
        themes: Vec<String>,

        /// Overwrite this existing playlist instead of creating a new one
        #[arg(long, requires = "playlist_name")]
        playlist_id: Option<String>,

        /// Current name of the playlist given by --playlist-id
        #[arg(long)]
        playlist_name: Option<String>,

        /// Generate a fresh name and description for an existing playlist
        #[arg(long)]
        rename: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve song titles to track URIs (uses and fills the title cache)
    Resolve {
        titles: Vec<String>,
    },
    /// List playlists the user can modify
    Playlists,
    /// Show recent blends recorded for the user
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Validate config file and exit
    ConfigValidate,
}

fn auth_from_env() -> Result<AuthContext> {
    let token = std::env::var("SPOTIFY_ACCESS_TOKEN").context("SPOTIFY_ACCESS_TOKEN is not set")?;
    let user = std::env::var("SPOTIFY_USER_ID").context("SPOTIFY_USER_ID is not set")?;
    Ok(AuthContext::new(token, user))
}

fn build_blender(cfg: &Config) -> Result<Blender> {
    let pool = lib::db::open_pool(&cfg.db_path, (cfg.search_concurrency as u32).max(4))
        .with_context(|| format!("opening database {}", cfg.db_path.display()))?;
    let catalog = Arc::new(SpotifyCatalog::new(cfg.catalog_api_base.clone(), cfg.request_timeout()));
    // Only the blend command talks to the generator; other commands run without a key.
    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    let generator = Arc::new(OpenAiGenerator::new(
        cfg.generator_api_base.clone(),
        api_key,
        cfg.generator_model.clone(),
        cfg.generator_temperature,
    ));
    Ok(Blender::new(cfg, pool, catalog, generator))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Resolve config path: explicit --config overrides; otherwise prefer
    // /etc/playlist-blender/config.toml and fall back to the repository
    // example config for local/dev usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let etc_path = Path::new("/etc/playlist-blender/config.toml");
            if etc_path.exists() {
                etc_path.to_path_buf()
            } else {
                PathBuf::from("config/example-config.toml")
            }
        }
    };

    if let Commands::ConfigValidate = cli.command {
        match Config::from_path(&resolved_config_path) {
            Ok(_) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {}", e);
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to both stdout and a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender = tracing_appender::rolling::daily(&cfg.log_dir, "playlist-blender.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(non_blocking);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    // Install as global default without triggering tracing-subscriber's
    // internal log bridge (LogTracer is already installed).
    tracing_subscriber_global::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    let blender = build_blender(&cfg)?;
    let auth = auth_from_env()?;

    match cli.command {
        Commands::Blend { themes, playlist_id, playlist_name, rename, json } => {
            let target = match playlist_id {
                Some(id) => PlaylistTarget::Existing { id, name: playlist_name.unwrap_or_default() },
                None => PlaylistTarget::Create,
            };
            match blender.blend(&auth, BlendRequest { themes, target, rename }).await {
                Ok(report) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        println!("Playlist updated successfully: {} ({})", report.playlist_name, report.playlist_id);
                        println!("{}", report.description);
                        for (i, song) in report.combined.iter().enumerate() {
                            println!("{:>3}. {}", i + 1, song);
                        }
                        println!("{} of {} songs published.", report.track_uris.len(), report.combined.len());
                    }
                }
                Err(e) => {
                    eprintln!("Blend failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Resolve { titles } => {
            let resolved = blender
                .resolver()
                .resolve(&auth, &titles)
                .await
                .with_context(|| "resolving titles".to_string())?;
            for title in &titles {
                match resolved.get(title) {
                    Some(uri) => println!("{} => {}", title, uri),
                    None => println!("{} => (not found)", title),
                }
            }
        }
        Commands::Playlists => {
            let playlists = blender
                .client()
                .list_playlists(&auth)
                .await
                .with_context(|| "listing playlists".to_string())?;
            if playlists.is_empty() {
                println!("No modifiable playlists found.");
            }
            for p in playlists {
                println!("- {}: {}", p.id, p.name);
            }
        }
        Commands::History { limit } => {
            let blends = blender.history().recent(&auth.user_id, limit).await?;
            if blends.is_empty() {
                println!("No blends recorded for {}.", auth.user_id);
            }
            for (name, themes) in blends {
                println!("- {} [{}]", name, themes.join(", "));
            }
        }
        Commands::ConfigValidate => unreachable!("handled before logging setup"),
    }

    Ok(())
}
