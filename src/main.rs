mod capture;
mod config;
mod lyrics;
mod provider;
mod service;

use anyhow::Context;
use clap::{Parser, Subcommand};
use service::{Response, Service};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "playlist-relay",
    version,
    about = "Resolve music playlists into playable audio, covers and lyrics"
)]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a playlist and print it as JSON.
    Playlist {
        #[arg(default_value = service::DEFAULT_ID)]
        id: String,
        #[arg(long, default_value = service::DEFAULT_SERVER)]
        server: String,
    },
    /// Answer a single request the way the HTTP API would.
    Resolve {
        /// playlist, song, url, pic or lrc
        #[arg(value_name = "TYPE")]
        kind: String,
        id: String,
        #[arg(long, default_value = service::DEFAULT_SERVER)]
        server: String,
    },
    /// Download a playlist's resources for the snapshot archive.
    Capture {
        id: String,
        /// Output directory.
        #[arg(long, default_value = "snapshot")]
        out: std::path::PathBuf,
        #[arg(long, default_value = service::DEFAULT_SERVER)]
        server: String,
    },
    /// Store QQ Music credentials in the config file.
    Login {
        uin: String,
        /// Value of the `qqmusic_key` cookie.
        music_key: String,
    },
    /// Print the config file location.
    ConfigPath,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref()).context("load config")?;
    config::apply_env(&mut cfg, |key| std::env::var(key).ok());

    match cli.command {
        Command::Playlist { id, server } => {
            let svc = Service::from_config(&cfg)?;
            print_response(svc.handle(&server, service::DEFAULT_TYPE, &id).await?)?;
        }
        Command::Resolve { kind, id, server } => {
            let svc = Service::from_config(&cfg)?;
            print_response(svc.handle(&server, &kind, &id).await?)?;
        }
        Command::Capture { id, out, server } => {
            anyhow::ensure!(
                !cfg.snapshot.base_url.is_empty(),
                "snapshot.base_url (or R2_BASE_URL) must be set to capture a snapshot"
            );
            let svc = Service::from_config(&cfg)?;
            let provider = svc
                .provider(&server)
                .with_context(|| format!("unknown server `{server}`"))?;
            let http = reqwest::Client::builder()
                .build()
                .context("build reqwest client")?;
            let report = capture::Capture::new(
                http,
                &cfg.snapshot.base_url,
                out,
                cfg.capture.song_delay(),
            )
            .run(provider.as_ref(), cfg.batch.policy(), &id)
            .await?;
            println!(
                "Captured {} songs ({} failed, {} without audio) into {}",
                report.captured,
                report.failed,
                report.without_audio,
                report.playlist_path.display()
            );
        }
        Command::Login { uin, music_key } => {
            // Re-read so values from the environment are not persisted.
            let mut stored = config::load(cli.config.as_deref()).context("load config")?;
            stored.tencent.uin = uin;
            stored.tencent.music_key = music_key;
            config::save(&stored, cli.config.as_deref()).context("save config")?;
            println!("Updated config credentials.");
        }
        Command::ConfigPath => {
            let path = match cli.config {
                Some(p) => p,
                None => config::default_config_path().context("default config path")?,
            };
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn print_response(resp: Response) -> anyhow::Result<()> {
    let status = resp.status();
    match resp {
        Response::Json(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        Response::Redirect(url) => println!("{status} -> {url}"),
        Response::Text(text) => println!("{text}"),
        Response::Error { message, .. } => anyhow::bail!("{status}: {message}"),
    }
    Ok(())
}
