use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use dotenvy::dotenv;
use teloxide::prelude::*;
use url::Url;

use loadra::cli::{Cli, Commands};
use loadra::core::{config, init_logger, AppResult};
use loadra::download::format::{AudioBitrate, Selection, VideoQuality};
use loadra::download::job::{run_job, Delivery, DeliveryFile, Transport};
use loadra::telegram::handlers::{schema, HandlerDeps};
use loadra::telegram::session::SessionStore;
use loadra::telegram::create_bot;
use loadra::{Extractor, YtDlpClient};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logger(&config::LOG_FILE_PATH)?;
    let _ = dotenv();

    match cli.command {
        None | Some(Commands::Run) => run_bot().await,
        Some(Commands::Info { url }) => run_info(&url).await,
        Some(Commands::Download { url, audio, quality }) => {
            run_download(&url, audio, &quality).await
        }
    }
}

async fn run_bot() -> Result<()> {
    let bot = create_bot()?;
    let deps = HandlerDeps::new(Arc::new(YtDlpClient::new()), Arc::new(SessionStore::new()));

    log::info!("Starting loadra bot...");
    Dispatcher::builder(bot, schema(deps))
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn run_info(url: &str) -> Result<()> {
    let url = Url::parse(url).context("invalid URL")?;
    let client = YtDlpClient::new();
    let info = client.probe(&url).await?;

    println!("title:     {}", info.title);
    if let Some(duration) = info.duration_seconds {
        println!("duration:  {duration:.0}s");
    }
    if let Some(thumb) = info.thumbnail_url {
        println!("thumbnail: {thumb}");
    }
    Ok(())
}

async fn run_download(url: &str, audio: bool, quality: &str) -> Result<()> {
    let url = Url::parse(url).context("invalid URL")?;
    let selection = parse_selection(audio, quality)?;

    let extractor = Arc::new(YtDlpClient::new());
    let info = extractor.probe(&url).await?;
    println!("Downloading \"{}\" as {}", info.title, selection.label());

    let request = loadra::download::job::JobRequest {
        url,
        title: info.title,
        selection,
        duration_hint: info.duration_seconds,
        thumbnail_url: info.thumbnail_url,
    };
    run_job(extractor, Arc::new(CliTransport), request).await?;
    Ok(())
}

fn parse_selection(audio: bool, quality: &str) -> Result<Selection> {
    let selection = if audio {
        AudioBitrate::parse(quality).map(Selection::Audio)
    } else {
        VideoQuality::parse(quality).map(Selection::Video)
    };
    match selection {
        Some(s) => Ok(s),
        None => bail!("unknown quality tier: {quality}"),
    }
}

/// Stdout-backed transport for the CLI download mode. The job's temp file is
/// removed on exit, so delivery copies it into the working directory.
struct CliTransport;

#[async_trait]
impl Transport for CliTransport {
    async fn update_status(&self, text: &str) -> AppResult<()> {
        println!("{text}");
        Ok(())
    }

    async fn deliver(&self, file: DeliveryFile<'_>) -> AppResult<Delivery> {
        let name = file
            .path
            .file_name()
            .map(|n| {
                let n = n.to_string_lossy();
                // Drop the job token prefix from the visible name.
                match n.split_once('_') {
                    Some((_, rest)) if !rest.is_empty() => rest.to_string(),
                    _ => n.into_owned(),
                }
            })
            .unwrap_or_else(|| "media".to_string());
        let dest = PathBuf::from(name);
        tokio::fs::copy(file.path, &dest).await?;
        println!("Saved to {}", dest.display());
        Ok(Delivery::Sent)
    }
}
