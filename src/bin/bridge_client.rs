//! Terminal front-end. Reads gesture and navigation commands from stdin.
//!
//! Usage: bridge-client [SERVER_URL] [--audio FILE.pcm] [--history FILE.json]

use std::sync::Arc;
use anyhow::{bail, Context};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;
use voice_bridge::client::api::HttpBridgeApi;
use voice_bridge::client::history::HistoryStore;
use voice_bridge::client::link::WsLink;
use voice_bridge::client::runtime::{PcmFileSource, Runtime};
use voice_bridge::client::state::{Event, Gesture};
use voice_bridge::client::view::TerminalRenderer;
use voice_bridge::config;

const HELP: &str = "commands: tap | double | up | down | pick N | back | record | send | cancel \
| messenger NAME | contact N | folder N | message N | settings | hide | show | quit";

struct Options {
    server: Url,
    audio: String,
    history: String,
}

fn parse_args() -> anyhow::Result<Options> {
    let mut server = format!("http://localhost:{}", config::port());
    let mut audio = "recording.pcm".to_string();
    let mut history = config::data_dir().join("history.json").display().to_string();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--audio" => audio = args.next().context("--audio needs a file")?,
            "--history" => history = args.next().context("--history needs a file")?,
            "-h" | "--help" => {
                println!("bridge-client [SERVER_URL] [--audio FILE.pcm] [--history FILE.json]");
                println!("{}", HELP);
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("Unknown option {}", other),
            other => server = other.to_string(),
        }
    }

    Ok(Options {
        server: Url::parse(&server).with_context(|| format!("Invalid server URL {}", server))?,
        audio,
        history,
    })
}

fn parse_command(line: &str) -> Option<Event> {
    let mut parts = line.split_whitespace();
    let command = parts.next()?;
    let arg = parts.next();
    let index = || arg.and_then(|a| a.parse::<usize>().ok());

    Some(match command {
        "tap" => Event::Gesture(Gesture::Tap),
        "double" => Event::Gesture(Gesture::DoubleTap),
        "up" => Event::Gesture(Gesture::ScrollUp),
        "down" => Event::Gesture(Gesture::ScrollDown),
        "pick" => Event::Gesture(Gesture::ListSelect(index()?)),
        "back" => Event::Back,
        "record" => Event::ToggleRecording,
        "send" => Event::SendPending,
        "cancel" => Event::CancelPreview,
        "messenger" => Event::SelectMessenger(arg?.to_lowercase()),
        "contact" => Event::OpenContact(index()?),
        "folder" => Event::OpenFolder(index()?),
        "message" => Event::OpenMessage(index()?),
        "settings" => Event::OpenSettings,
        "hide" => Event::Hidden,
        "show" => Event::Visible,
        "quit" | "exit" => Event::Quit,
        _ => return None,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_env();
    config::init_logging();

    let options = parse_args()?;
    info!("Connecting to {}", options.server);

    let runtime = Runtime::new(
        Arc::new(HttpBridgeApi::new(options.server.clone())?),
        Arc::new(WsLink::new(&options.server)?),
        Box::new(PcmFileSource::new(options.audio)),
        Box::new(TerminalRenderer::stdout()),
        HistoryStore::new(options.history),
    );
    let events = runtime.events();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_command(line.trim()) {
                    Some(event) => {
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("{}", HELP),
                },
                Ok(None) | Err(_) => {
                    let _ = events.send(Event::Quit);
                    break;
                }
            }
        }
    });

    let final_state = runtime.run().await;
    info!("Client stopped on {:?}", final_state.screen);
    Ok(())
}
