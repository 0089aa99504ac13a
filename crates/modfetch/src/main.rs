mod cli;
mod config;

use clap::Parser;
use cli::{Cli, Command};
use config::FileConfig;
use modfetch_engine::{DownloadRequest, Engine};
use modfetch_policy::lookup_known_host;
use modfetch_state::Store;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let file_config = FileConfig::load(&cli.config)?;

    match cli.command {
        Command::Get { url, dest, sha256, resume } => get(file_config, url, dest, sha256, resume).await,
        Command::Status { dest } => status(&cli.config, dest),
    }
}

async fn get(
    file_config: FileConfig,
    url: String,
    dest: Option<std::path::PathBuf>,
    sha256: Option<String>,
    resume: bool,
) -> anyhow::Result<()> {
    let mut engine_config = file_config.into_engine_config();
    if resume {
        engine_config.always_no_resume = false;
    }

    let state_dir = engine_config.download_root.join(".modfetch");
    std::fs::create_dir_all(&state_dir)?;
    let store = Store::open(state_dir.join("state.sled"))?;

    let engine = Engine::new(engine_config, store)?;

    let mut request = DownloadRequest::new(&url);
    if let Some(dest) = dest {
        request = request.dest(dest);
    }
    if let Some(hash) = sha256 {
        request = request.expected_sha256(hash);
    }

    let host_hint = Url::parse(&url).ok().and_then(|u| u.host_str().and_then(lookup_known_host));

    match engine.download(request, CancellationToken::new()).await {
        Ok(outcome) => {
            println!("{} ({} bytes, sha256 {})", outcome.dest.display(), outcome.bytes, outcome.sha256_hex);
            Ok(())
        }
        Err(e) => anyhow::bail!(e.friendly_message(host_hint.as_ref())),
    }
}

fn status(config_path: &std::path::Path, dest: std::path::PathBuf) -> anyhow::Result<()> {
    let file_config = FileConfig::load(config_path)?;
    let engine_config = file_config.into_engine_config();
    let state_dir = engine_config.download_root.join(".modfetch");
    let store = Store::open(state_dir.join("state.sled"))?;

    let dest_key = dest.to_string_lossy().into_owned();
    match store.find_by_dest(&dest_key)? {
        Some(record) => {
            println!("{:?}", record.status);
            if let Some(hash) = record.actual_hash {
                println!("sha256: {hash}");
            }
            if let Some(err) = record.last_error {
                println!("last error: {err}");
            }
            Ok(())
        }
        None => {
            println!("no record for {}", dest.display());
            Ok(())
        }
    }
}
