//! Tern - terminal front end
//!
//! `tern [url]` loads the page and then reads commands from stdin:
//! an address or search terms, `back`, `forward`, `reload`, `home`,
//! `history`, `map <n>` or `quit`.

use std::io::Write;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use tern_core::{
    Answer, Browser, CacheMode, Config, ImageMapChoice, NavigationEvent,
};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tern_core::init_logging();

    let mut browser = Browser::new(Config::default()).context("Failed to start browser")?;
    browser.initialize()?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut choices: Vec<ImageMapChoice> = Vec::new();

    let first = match std::env::args().nth(1) {
        Some(url) => Command::Open(url),
        None => Command::Home,
    };
    if let Err(e) = execute(&mut browser, first, &choices) {
        println!("Error: {e}");
    }
    settle(&mut browser, &mut input, &mut choices).await?;

    while let Some(line) = input.next_line().await? {
        let command = match Command::parse(&line) {
            Some(Command::Quit) => break,
            Some(command) => command,
            None => continue,
        };
        if let Err(e) = execute(&mut browser, command, &choices) {
            println!("Error: {e}");
        }
        settle(&mut browser, &mut input, &mut choices).await?;
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Open(String),
    Back,
    Forward,
    Reload,
    Home,
    History,
    Map(usize),
    Quit,
}

impl Command {
    /// `None` for a blank line.
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let command = match line {
            "" => return None,
            "quit" | "q" => Command::Quit,
            "back" => Command::Back,
            "forward" => Command::Forward,
            "reload" => Command::Reload,
            "home" => Command::Home,
            "history" => Command::History,
            _ => match line
                .strip_prefix("map ")
                .and_then(|n| n.trim().parse::<usize>().ok())
            {
                Some(n) => Command::Map(n),
                None => Command::Open(line.to_string()),
            },
        };
        Some(command)
    }
}

fn execute(
    browser: &mut Browser,
    command: Command,
    choices: &[ImageMapChoice],
) -> tern_core::Result<()> {
    match command {
        Command::Open(input) => {
            browser.open(&input)?;
        }
        Command::Back => {
            if !browser.back() {
                println!("Nothing to go back to");
            }
        }
        Command::Forward => {
            if !browser.forward() {
                println!("Nothing to go forward to");
            }
        }
        Command::Reload => browser.reload(CacheMode::ForceReload)?,
        Command::Home => {
            browser.home()?;
        }
        Command::History => {
            for visit in browser.visits().recent(20)? {
                println!("{:>4}  {}  {}", visit.visit_count, visit.url, visit.title);
            }
        }
        Command::Map(n) => match choices.get(n) {
            Some(choice) => browser.choose_image_map_entry(choice.clone()),
            None => println!("No such map entry"),
        },
        Command::Quit => {}
    }
    Ok(())
}

/// Run until the browser is idle, answering questions from stdin.
async fn settle(
    browser: &mut Browser,
    input: &mut Input,
    choices: &mut Vec<ImageMapChoice>,
) -> anyhow::Result<()> {
    loop {
        for event in browser.run_until_idle().await {
            report(&event, choices);
        }

        let questions = browser.pending_questions();
        if questions.is_empty() {
            return Ok(());
        }
        for (id, prompt) in questions {
            println!("{}: {}", prompt.title(), prompt.message());
            print!("[y/N] ");
            std::io::stdout().flush()?;
            let reply = input.next_line().await?.unwrap_or_default();
            let answer = if reply.trim().eq_ignore_ascii_case("y") {
                Answer::Yes
            } else {
                Answer::No
            };
            if let Err(e) = browser.answer(id, answer) {
                println!("Error: {e}");
            }
        }
    }
}

fn report(event: &NavigationEvent, choices: &mut Vec<ImageMapChoice>) {
    match event {
        NavigationEvent::Started { uri, .. } => println!("Loading {}", uri.public_string()),
        NavigationEvent::Displayed { uri, .. } => println!("Showing {}", uri.public_string()),
        NavigationEvent::FrameUpdated { frame, uri } => {
            println!("Frame {frame}: {}", uri.public_string())
        }
        NavigationEvent::ImageMap { choices: found, .. } => {
            for (n, choice) in found.iter().enumerate() {
                println!("  [{n}] {} -> {}", choice.label, choice.uri.public_string());
            }
            *choices = found.clone();
        }
        NavigationEvent::Redisplayed { .. } => println!("Keeping the previous page"),
        NavigationEvent::RedirectLimitReached { uri, limit } => {
            println!("Stopped after {limit} redirects at {}", uri.public_string())
        }
        NavigationEvent::Failed(error) => println!("Error: {error}"),
        NavigationEvent::ExternalHandoff { uri } => {
            println!("Opened {} externally", uri.public_string())
        }
        NavigationEvent::Progress { .. }
        | NavigationEvent::ConfirmationRequested { .. }
        | NavigationEvent::Abandoned { .. }
        | NavigationEvent::Aborted { .. } => {
            tracing::debug!(?event, "Navigation event");
        }
    }
}
