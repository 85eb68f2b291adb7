//! tts-studio: speak text with Gemini voices from the command line.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tts_studio::api::{self, ApiState};
use tts_studio::audio::playback::PlaybackController;
use tts_studio::config::Config;
use tts_studio::gemini::GeminiClient;
use tts_studio::studio::{Studio, StudioError};
use tts_studio::voice::Voice;

#[derive(Parser, Debug)]
#[command(name = "tts-studio", about = "Text-to-speech with Gemini voices")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize text and play it. Use "-" to read the text from stdin.
    Say {
        text: String,

        /// Voice to use (defaults to synthesis.voice from config)
        #[arg(long, value_enum)]
        voice: Option<Voice>,

        /// Also save the clip as a 16-bit WAV file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Do not play the clip (useful with --out)
        #[arg(long)]
        no_play: bool,
    },

    /// List the available voices
    Voices,

    /// Run the local HTTP control API
    Serve {
        /// Port to listen on (defaults to api.port from config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy HTTP/audio internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,hyper_util=info,reqwest=info,rodio=info,cpal=info")
    } else {
        EnvFilter::new("info,hyper=warn,hyper_util=warn,reqwest=warn,rodio=warn,cpal=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(args.config.as_deref());

    match args.command {
        Command::Voices => {
            for voice in Voice::ALL {
                let marker = if voice == config.synthesis.voice { "*" } else { " " };
                println!(
                    "{marker} {:<8} {:<7} {}",
                    voice.name(),
                    voice.gender().to_string(),
                    voice.description()
                );
            }
        }
        Command::Say {
            text,
            voice,
            out,
            no_play,
        } => {
            let text = if text == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                text
            };
            let voice = voice.unwrap_or(config.synthesis.voice);
            let studio = Arc::new(build_studio(&config)?);
            say(studio, &text, voice, out, no_play).await?;
        }
        Command::Serve { port } => {
            let studio = Arc::new(build_studio(&config)?);
            info!(
                "tts-studio serving (model: {}, default voice: {})",
                config.synthesis.model, config.synthesis.voice
            );
            let state = ApiState {
                studio,
                default_voice: config.synthesis.voice,
            };
            api::serve(state, port.unwrap_or(config.api.port)).await?;
        }
    }

    Ok(())
}

fn build_studio(config: &Config) -> Result<Studio, Box<dyn std::error::Error>> {
    let client = GeminiClient::new(&config.synthesis)?;
    info!("Using model {}", client.model());
    Ok(Studio::new(Arc::new(client), PlaybackController::new()))
}

/// Synthesize, export, then play, so a playback failure never costs the
/// `--out` file.
async fn say(
    studio: Arc<Studio>,
    text: &str,
    voice: Voice,
    out: Option<PathBuf>,
    no_play: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let entry = match studio.synthesize(text, voice).await {
        Ok(entry) => entry,
        Err(StudioError::Synthesis(e)) if e.needs_reauth() => {
            warn!("Provider detail: {}", e.detail());
            return Err(format!("{e} (re-run with a valid GEMINI_API_KEY)").into());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(path) = out {
        studio.export_wav(&entry.id, &path)?;
    }

    if !no_play {
        // Opening the output device blocks
        let player = Arc::clone(&studio);
        let id = entry.id.clone();
        tokio::task::spawn_blocking(move || player.replay(&id)).await??;
        wait_for_playback(&studio).await;
    }
    Ok(())
}

/// Block until playback ends; Ctrl-C stops it early.
async fn wait_for_playback(studio: &Studio) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut tick = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                studio.stop();
                info!("Playback cancelled");
                break;
            }
            _ = tick.tick() => {
                if !studio.is_playing() {
                    break;
                }
            }
        }
    }
}
