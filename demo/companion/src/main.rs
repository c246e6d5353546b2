mod config;
use config::AppConfig;
use starlog_audio::{CommandPlayer, PiperSynthesizer};
use starlog_core::{
    Collaborators, Companion, EdsmLookup, HttpGenerator, Notification, NullSink, PlaybackSink,
    ScriptedGenerator, SpeechSynthesizer, SystemLookup, TextGenerator, ToneSynthesizer,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

fn build_collaborators(cfg: &AppConfig) -> Result<Collaborators, Box<dyn std::error::Error>> {
    let generator: Arc<dyn TextGenerator> = if cfg.offline {
        info!(target = "starlog_companion", "Offline mode: using scripted replies");
        Arc::new(ScriptedGenerator::new())
    } else {
        info!(target = "starlog_companion", base_url = %cfg.llm.base_url, model = %cfg.llm.model, "Using LLM server");
        Arc::new(HttpGenerator::new(cfg.llm.clone())?)
    };

    let synthesizer: Arc<dyn SpeechSynthesizer> = match PiperSynthesizer::new(cfg.piper.clone()) {
        Ok(piper) => Arc::new(piper),
        Err(e) => {
            warn!(target = "starlog_companion", error = %e, "Piper unavailable; falling back to tones");
            Arc::new(ToneSynthesizer::new())
        }
    };

    let sink: Arc<dyn PlaybackSink> = match CommandPlayer::detect(cfg.player.clone()) {
        Some(player) => Arc::new(player),
        None => {
            warn!(target = "starlog_companion", "No audio player found (aplay/paplay/ffplay); speech is muted");
            Arc::new(NullSink::realtime())
        }
    };

    let lookup: Option<Arc<dyn SystemLookup>> = if cfg.lookup {
        match EdsmLookup::new(cfg.edsm.clone()) {
            Ok(l) => Some(Arc::new(l)),
            Err(e) => {
                warn!(target = "starlog_companion", error = %e, "System lookup disabled");
                None
            }
        }
    } else {
        None
    };

    Ok(Collaborators {
        generator,
        synthesizer,
        sink,
        lookup,
    })
}

fn print_notification(n: &Notification) {
    match n {
        Notification::Event(text) => println!("  {}", text),
        Notification::Response(text) => println!("> {}", text),
        Notification::Status(status) => println!("* {}", status),
    }
}

/// Handle one line of console input. Returns false to quit.
fn handle_line(companion: &Companion, line: &str) -> bool {
    let line = line.trim();
    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) | ("/exit", _) => return false,
        ("/stop", _) => companion.audio().stop(),
        ("/voices", _) => println!("* voices: {}", companion.audio().voices().join(", ")),
        ("/voice", name) => {
            if let Err(e) = companion.audio().set_voice(name.trim()) {
                println!("* {}", e);
            } else {
                println!("* voice: {}", companion.audio().voice());
            }
        }
        ("/state", _) => println!("{}", companion.state().chat_context()),
        _ => companion.submit_chat_message(line),
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,starlog_core=info,starlog_companion=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(
        target = "starlog_companion",
        "Starting ship's computer: journal → classifier → LLM → speech"
    );

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = AppConfig::load();
    let collaborators = build_collaborators(&cfg)?;
    let companion = Companion::new(cfg.companion.clone(), collaborators);

    // Print everything the pipeline publishes
    let mut inbox = companion.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(n) = inbox.recv().await {
            print_notification(&n);
        }
    });

    companion.start().await?;
    info!(
        target = "starlog_companion",
        engine = %companion.audio().engine(),
        voice = %companion.audio().voice(),
        "Type a message to talk to the ship; /voices, /voice <name>, /stop, /state, /quit"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(target = "starlog_companion", "Shutting down...");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&companion, &line) {
                        break;
                    }
                }
                Ok(None) => {
                    // stdin closed; keep running until Ctrl+C
                    if let Err(e) = signal::ctrl_c().await {
                        error!(target = "starlog_companion", error = %e, "Failed to wait for Ctrl+C");
                    }
                    break;
                }
                Err(e) => {
                    error!(target = "starlog_companion", error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    }

    companion.stop().await;
    printer.abort();
    Ok(())
}
