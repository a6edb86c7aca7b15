use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod country_client;
mod error;
mod image_service;
mod openai_client;
mod pokemon_client;
mod session;
mod validation;
mod viewer;

use country_client::CountryClient;
use image_service::ImageService;
use openai_client::{CredentialSource, OPENAI_API_KEY_VAR, OpenAiImageClient};
use pokemon_client::PokemonClient;
use validation::{SaveDirValidator, Validator};
use viewer::{Clients, HELP_TEXT, TerminalSurface, Viewer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Use this API key instead of reading OPENAI_API_KEY on each cartoon request
    #[arg(long, value_name = "KEY")]
    openai_api_key: Option<String>,

    /// Also write displayed images to DIR/flag.png and DIR/cartoon.png
    #[arg(long, value_name = "DIR")]
    save_dir: Option<PathBuf>,

    /// Prompt sent with the flag to the image edit API
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout belongs to the viewer.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    info!("Starting flag viewer");

    let credentials = match args.openai_api_key {
        Some(key) if !key.trim().is_empty() => {
            info!("Using API key provided via command line");
            CredentialSource::Explicit(key)
        }
        Some(_) => {
            warn!("Command line API key is empty - falling back to {}", OPENAI_API_KEY_VAR);
            CredentialSource::openai_env()
        }
        None => {
            if std::env::var(OPENAI_API_KEY_VAR).unwrap_or_default().trim().is_empty() {
                warn!("{} is not set yet - cartoon requests will fail until it is", OPENAI_API_KEY_VAR);
            }
            CredentialSource::openai_env()
        }
    };

    if let Some(dir) = &args.save_dir {
        SaveDirValidator.validate(dir.as_path())?;
    }

    let clients = Clients {
        country: CountryClient::new().context("Failed to build country API client")?,
        images: ImageService::new().context("Failed to build image download client")?,
        openai: OpenAiImageClient::new(credentials).context("Failed to build image edit client")?,
        pokemon: PokemonClient::new().context("Failed to build Pokémon API client")?,
    };

    let mut viewer = Viewer::new(clients, TerminalSurface::new(io::stdout(), args.save_dir));
    if let Some(prompt) = args.prompt {
        viewer = viewer.with_prompt(prompt);
    }

    // Stdin blocks, so it gets a plain thread; the process does not wait for it on exit.
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if input_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read from stdin: {}", e);
                    break;
                }
            }
        }
    });

    println!("{}", HELP_TEXT);
    viewer.run(input_rx).await;

    info!("Shutting down flag viewer");
    Ok(())
}
