use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use narrator::NarratorConfig;
use narrator::cli::{self, Command};
use narrator::core::playback::{FileAudioSink, PlaybackController, PlaybackEvent, TextParagraphSource};
use narrator::core::region::{AzureRegionProber, RegionResolver};
use narrator::core::store::{SessionStore, open_resource_store};
use narrator::core::tts::{AzureSynthesisClient, AzureTTSConfig};

const USAGE: &str = "\
Usage: narrator [--config <file>] <command>

Commands:
  read <file> [--out <dir>] [--region <region>]   Narrate a text file
  resolve [--region <region>]                     Discover the region for the configured key
  forget                                          Clear stored credentials and position";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let command = loop {
        match args.next() {
            Some(arg) if arg == "-c" || arg == "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                config_path = Some(PathBuf::from(path));
            }
            Some(arg) => break arg,
            None => {
                println!("{USAGE}");
                return Ok(());
            }
        }
    };

    let config = match &config_path {
        Some(path) => NarratorConfig::from_file(path),
        None => NarratorConfig::from_env(),
    }
    .map_err(|e| anyhow!(e.to_string()))?;

    match command.as_str() {
        "read" => {
            let mut file: Option<PathBuf> = None;
            let mut out = PathBuf::from("narration");
            let mut region = config.azure_speech_region.clone();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "-o" | "--out" => {
                        out = PathBuf::from(
                            args.next()
                                .ok_or_else(|| anyhow!("--out requires a directory"))?,
                        );
                    }
                    "-r" | "--region" => {
                        region = Some(
                            args.next()
                                .ok_or_else(|| anyhow!("--region requires a region name"))?,
                        );
                    }
                    other if file.is_none() && !other.starts_with('-') => {
                        file = Some(PathBuf::from(other));
                    }
                    other => anyhow::bail!("Unexpected argument '{other}' for 'read'"),
                }
            }
            let file = file.ok_or_else(|| anyhow!("'read' requires a file to narrate"))?;
            read(&config, file, out, region).await
        }
        "resolve" => {
            let mut region = config.azure_speech_region.clone();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "-r" | "--region" => {
                        region = Some(
                            args.next()
                                .ok_or_else(|| anyhow!("--region requires a region name"))?,
                        );
                    }
                    other => anyhow::bail!("Unexpected argument '{other}' for 'resolve'"),
                }
            }
            resolve(&config, region).await
        }
        "forget" => {
            if let Some(extra) = args.next() {
                anyhow::bail!("Unexpected argument '{extra}' after 'forget'");
            }
            let session = open_session(&config)?;
            session.clear_credentials();
            session.clear_bookmark();
            println!("Stored credentials and position cleared");
            Ok(())
        }
        "help" | "-h" | "--help" => {
            println!("{USAGE}");
            Ok(())
        }
        other => anyhow::bail!("Unknown command '{other}'. Supported commands: read, resolve, forget"),
    }
}

fn open_session(config: &NarratorConfig) -> anyhow::Result<SessionStore> {
    let store = open_resource_store(config.store_path.as_deref())
        .context("Failed to open the resource store")?;
    Ok(SessionStore::new(store))
}

fn build_resolver(config: &NarratorConfig, session: &SessionStore) -> anyhow::Result<RegionResolver> {
    let prober = AzureRegionProber::new(Duration::from_millis(config.probe_timeout_ms))
        .context("Failed to build the probe HTTP client")?;
    Ok(RegionResolver::new(
        Arc::new(prober),
        session.clone(),
        config.resolver_config(),
    ))
}

/// Configured key, else the one stored by a previous session.
fn speech_key(config: &NarratorConfig, session: &SessionStore) -> anyhow::Result<String> {
    config
        .speech_key()
        .map(str::to_string)
        .or_else(|| session.credentials().map(|c| c.speech_key))
        .ok_or_else(|| anyhow!("No subscription key: set AZURE_SPEECH_SUBSCRIPTION_KEY"))
}

async fn resolve(config: &NarratorConfig, region: Option<String>) -> anyhow::Result<()> {
    let session = open_session(config)?;
    let key = speech_key(config, &session)?;
    let resolver = build_resolver(config, &session)?;

    let result = resolver.resolve(&key, region.as_deref()).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    match result.region {
        Some(_) => Ok(()),
        None => Err(anyhow!("Region discovery failed: {}", result.reason)),
    }
}

async fn read(
    config: &NarratorConfig,
    file: PathBuf,
    out: PathBuf,
    region: Option<String>,
) -> anyhow::Result<()> {
    let session = open_session(config)?;
    let key = speech_key(config, &session)?;
    let resolver = build_resolver(config, &session)?;

    let source = TextParagraphSource::from_file(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let client = AzureSynthesisClient::new(AzureTTSConfig::from_base(&config.tts_config()))?;
    let encoding = client.config().output_format;
    let sink = FileAudioSink::new(&out, encoding.file_extension())
        .with_context(|| format!("Failed to create {}", out.display()))?
        .with_bitrate(encoding.bits_per_second());

    let controller = PlaybackController::new(
        Arc::new(source),
        Arc::new(client),
        Arc::new(sink),
        resolver,
        session,
        config.default_preferences(),
    );
    println!(
        "Loaded {} paragraphs from {}; clips go to {}",
        controller.paragraph_count(),
        file.display(),
        out.display()
    );

    let mut events = controller.subscribe();
    let voice = controller.snapshot().voice;
    controller.start(&key, region.as_deref(), &voice).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut finished = false;

    while !finished {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) | Err(_) => {
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(Command::Status) => println!("{:?}", controller.snapshot()),
                    Ok(command) => {
                        if let Err(e) = cli::apply(&controller, &command).await {
                            eprintln!("{e}");
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            event = events.recv() => match event {
                Ok(PlaybackEvent::ParagraphStarted { index, .. }) => {
                    println!("[{}/{}]", index + 1, controller.paragraph_count());
                }
                Ok(PlaybackEvent::Failed { message, .. }) => eprintln!("{message}"),
                Ok(PlaybackEvent::Finished) => {
                    println!("Finished");
                    finished = true;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    if !finished {
        controller.pause().await;
    }
    Ok(())
}
