//! A terminal front-end for watching two models talk to each other.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use crosstalk::core::{
    ConversationBroker, ModelTag, Speaker, TranscriptEvent, export,
};
use crosstalk::{Session, StopHandle, config};
use crosstalk_openai_adapter::probe_reachable;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    for url in &config.local_probe_urls {
        if !probe_reachable(url, Duration::from_millis(300)).await {
            eprintln!(
                "{}",
                format!("warning: no backend answering at {url}")
                    .bright_yellow()
            );
        }
    }

    let broker = ConversationBroker::new(
        config.model_a,
        config.model_b,
        config.engine,
        config.prompts,
    );
    let mut session = Session::new(broker);
    let stop = session.stop_handle();

    let events = session.subscribe();
    let renderer = tokio::spawn(render_feed(events));

    println!("Enter an opening message, then watch the two models talk.");
    print!("> ");
    std::io::stdout().flush().unwrap();
    let Some(line) = read_line().await else {
        return;
    };
    let line = line.trim();
    if !line.is_empty() {
        session.add_user_message(line);
    }

    run_with_interrupt(&mut session, &stop).await;

    loop {
        print!("> ");
        std::io::stdout().flush().unwrap();
        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        match command {
            "/quit" | "/exit" => break,
            "/run" => run_with_interrupt(&mut session, &stop).await,
            "/reset" => session.reset(),
            "/a" => force_turn(&mut session, ModelTag::A, rest).await,
            "/b" => force_turn(&mut session, ModelTag::B, rest).await,
            "/export" => export_transcript(&session, rest),
            _ if command.starts_with('/') => {
                println!(
                    "commands: /run, /a [msg], /b [msg], /export <path>, \
                     /reset, /quit"
                );
            }
            // Bare text becomes a user message both models will see.
            _ => session.add_user_message(line),
        }
    }

    drop(session);
    renderer.await.ok();
}

/// Runs the conversation, letting Ctrl-C stop it gracefully.
async fn run_with_interrupt(session: &mut Session, stop: &StopHandle) {
    let run = session.run();
    let mut run = std::pin::pin!(run);
    let result = loop {
        select! {
            result = &mut run => break result,
            _ = tokio::signal::ctrl_c() => {
                // The run keeps going until the in-flight turn notices
                // the token and winds down.
                stop.stop();
            }
        }
    };
    if let Err(err) = result {
        eprintln!("{}", err.to_string().bright_red());
    }
}

async fn force_turn(session: &mut Session, tag: ModelTag, message: &str) {
    let message = (!message.is_empty()).then_some(message);
    if let Err(err) = session.send_to(tag, message).await {
        eprintln!("{}", err.to_string().bright_red());
    }
}

fn export_transcript(session: &Session, path: &str) {
    if path.is_empty() {
        println!("usage: /export <path>.md | <path>.json");
        return;
    }
    let entries = session.entries();
    let rendered = match Path::new(path).extension().and_then(|e| e.to_str())
    {
        Some("md") => export::to_markdown(&entries),
        Some("json") => match export::to_json(&entries) {
            Ok(rendered) => rendered,
            Err(err) => {
                eprintln!("failed to render transcript: {err}");
                return;
            }
        },
        _ => {
            println!("usage: /export <path>.md | <path>.json");
            return;
        }
    };
    match std::fs::write(path, rendered) {
        Ok(()) => println!("exported {} entries to {path}", entries.len()),
        Err(err) => eprintln!("failed to write {path}: {err}"),
    }
}

async fn render_feed(mut events: mpsc::UnboundedReceiver<TranscriptEvent>) {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut waiting: Option<ProgressBar> = None;
    let mut streaming: Option<ModelTag> = None;

    while let Some(event) = events.recv().await {
        if let Some(bar) = waiting.take() {
            bar.finish_and_clear();
        }

        match event {
            TranscriptEvent::Status { text } => {
                if streaming.take().is_some() {
                    println!();
                }
                println!("{}{}", BAR_CHAR.bright_magenta(), text.bold());
                if text.starts_with("Turn ") {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(progress_style.clone());
                    bar.enable_steady_tick(Duration::from_millis(100));
                    bar.set_message("Waiting for the model...");
                    waiting = Some(bar);
                }
            }
            TranscriptEvent::Chunk { tag, text } => {
                if streaming != Some(tag) {
                    if streaming.take().is_some() {
                        println!();
                    }
                    print!("{}", speaker_bar(Speaker::Model(tag)));
                    streaming = Some(tag);
                }
                print!("{text}");
                std::io::stdout().flush().unwrap();
            }
            TranscriptEvent::Message { speaker, text } => {
                match (speaker, streaming.take()) {
                    // The streamed chunks already painted this reply.
                    (Speaker::Model(_), Some(_)) => println!(),
                    (speaker, previous) => {
                        if previous.is_some() {
                            println!();
                        }
                        println!("{}{text}", speaker_bar(speaker));
                    }
                }
            }
        }
    }
}

fn speaker_bar(speaker: Speaker) -> String {
    match speaker {
        Speaker::User => {
            format!("{}{} ", BAR_CHAR.bright_green(), "You:".bright_white())
        }
        Speaker::Model(ModelTag::A) => {
            format!("{}{} ", BAR_CHAR.bright_cyan(), "A:".bright_white())
        }
        Speaker::Model(ModelTag::B) => {
            format!("{}{} ", BAR_CHAR.bright_yellow(), "B:".bright_white())
        }
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
