use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use reasonchat_core::config::API_KEY_ENV;
use reasonchat_core::{
    Attachment, CompletionClient, Config, ConversationStore, ConversationWatcher, Message, Role,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reasonchat")]
#[command(about = "Chat with an AI assistant from the terminal, optionally attaching images")]
struct Cli {
    /// Model to use (defaults to the configured model)
    #[arg(short, long)]
    model: Option<String>,
    /// Base URL of the chat-completions API
    #[arg(long)]
    base_url: Option<String>,
    /// Start without the assistant greeting
    #[arg(long)]
    no_greeting: bool,
    /// Remember --model as the default for next time
    #[arg(long, requires = "model")]
    save_model: bool,
}

#[derive(Debug, PartialEq)]
enum Input {
    Quit,
    Empty,
    Send {
        text: String,
        image: Option<PathBuf>,
    },
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line == "/quit" || line == "/exit" {
        return Input::Quit;
    }

    if let Some(rest) = line.strip_prefix("/image ") {
        let rest = rest.trim_start();
        let (path, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        return Input::Send {
            text: text.trim().to_string(),
            image: Some(PathBuf::from(path)),
        };
    }

    Input::Send {
        text: line.to_string(),
        image: None,
    }
}

fn print_message(out: &mut impl Write, message: &Message) -> io::Result<()> {
    match message.role() {
        Role::Assistant => writeln!(out, "AI: {}\n", message.text()),
        Role::User => {
            let images = message.images().count();
            if images > 0 {
                writeln!(out, "You: [{} image(s) attached] {}\n", images, message.text())?;
            }
            Ok(())
        }
    }
}

/// Print new messages and the thinking indicator as the store changes.
///
/// Returns once the store is dropped, after everything it held was printed.
async fn render<W: Write>(mut watcher: ConversationWatcher, mut out: W) -> io::Result<W> {
    let mut printed = 0;
    let mut was_composing = false;
    let mut closed = false;

    loop {
        {
            let state = watcher.borrow_and_update();
            for message in state.messages.iter().skip(printed) {
                print_message(&mut out, message)?;
            }
            printed = state.messages.len();

            if state.is_composing && !was_composing {
                writeln!(out, "AI: thinking...")?;
            }
            was_composing = state.is_composing;
        }
        out.flush()?;

        if closed {
            return Ok(out);
        }
        closed = watcher.changed().await.is_err();
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|err| {
        warn!(error = %err, "could not load config, using defaults");
        Config::new()
    });

    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
        if cli.save_model {
            Config::save_default_model(model)?;
        }
    }
    if let Some(base_url) = cli.base_url {
        config.base_url = Some(base_url);
    }
    if config.api_key.is_none() {
        warn!("no API key configured, set {} or add api_key to the config file", API_KEY_ENV);
    }

    let client = Arc::new(CompletionClient::from_config(&config));
    println!("Model: {}", client.model());
    println!("Type a message, /image <path> [text] to attach an image, /quit to exit.\n");

    let store = if cli.no_greeting {
        ConversationStore::new(client)
    } else {
        ConversationStore::with_greeting(client, config.greeting())
    };
    let renderer = tokio::spawn(render(store.subscribe(), io::stdout()));

    // Reading the next line waits for the current send, so sends never overlap
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => break,
            Input::Empty => continue,
            Input::Send { text, image } => {
                let image = image.map(Attachment::File);
                if let Err(err) = store.send_message(&text, image).await {
                    eprintln!("Error: {}\n", err);
                }
            }
        }
    }

    // Closing the store lets the renderer print the last reply and exit
    drop(store);
    renderer.await??;
    Ok(())
}
