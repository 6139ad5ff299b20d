use std::collections::HashMap;
use std::io::Write;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stepflow::adapters::ReqwestHttpClient;
use stepflow::cli::{parse_args, run_cli_command, CliCommand, RunOptions};
use stepflow::sse::CrisisPayload;
use stepflow::{
    ledger, ClientConfig, Message, Orchestrator, SessionApi, Step, TurnOutcome, TurnUpdate,
};

type Client = Orchestrator<ReqwestHttpClient>;

const HELP: &str = "\
Type a message and press enter. Ctrl-C cancels a reply in progress.
  /steps            show step history
  /done <action>    finish the session with your first step
  /quit             leave (the session can be resumed with --session)";

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("STEPFLOW_LOG")
                .unwrap_or_else(|_| "stepflow=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let command = parse_args(std::env::args());
    if let Some(result) = run_cli_command(&command) {
        return result;
    }
    let CliCommand::Run(options) = command else {
        return Err(eyre!("unexpected command"));
    };

    color_eyre::install()?;
    init_logging();

    let config = build_config(&options);
    let ledger = ledger::init_global(&config.data_dir)
        .wrap_err_with(|| format!("Failed to open ledger in {}", config.data_dir.display()))?
        .clone();
    let api = SessionApi::from_config(ReqwestHttpClient::new(), &config);
    let orchestrator = Orchestrator::with_update_buffer(api, ledger, config.update_buffer);

    let flow = options.flow.unwrap_or(config.flow);
    let session_id = match &options.session {
        Some(id) => {
            let messages = orchestrator.resume(id, flow).await?;
            print_transcript(&messages);
            id.clone()
        }
        None => {
            let session = orchestrator
                .start(flow)
                .await
                .wrap_err("Could not start a session")?;
            println!("Session {} started.", session.id);
            session.id
        }
    };

    println!("{}", HELP);
    repl(&orchestrator, &session_id).await
}

fn build_config(options: &RunOptions) -> ClientConfig {
    let mut config = ClientConfig::from_env();
    if let Some(url) = &options.api_url {
        config = config.with_api_url(url.clone());
    }
    if let Some(dir) = &options.data_dir {
        config = config.with_data_dir(dir.clone());
    }
    if let Some(flow) = options.flow {
        config = config.with_flow(flow);
    }
    config
}

fn print_transcript(messages: &[Message]) {
    for message in messages {
        let who = if message.is_user() { "you" } else { "guide" };
        println!("[{}] {}: {}", message.step, who, message.content);
    }
}

/// Writes streamed reply text for one session, each delta once.
struct UpdatePrinter {
    session_id: String,
    printed: HashMap<u64, usize>,
}

impl UpdatePrinter {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            printed: HashMap::new(),
        }
    }

    fn handle(&mut self, update: TurnUpdate, out: &mut impl Write) {
        if update.session_id() != self.session_id {
            return;
        }

        match update {
            TurnUpdate::Content {
                turn_id, content, ..
            } => {
                let seen = self.printed.entry(turn_id).or_insert(0);
                if let Some(fresh) = content.get(*seen..) {
                    let _ = write!(out, "{}", fresh);
                    let _ = out.flush();
                }
                *seen = content.len();
            }
            TurnUpdate::Committed { turn_id, .. } | TurnUpdate::Cancelled { turn_id, .. } => {
                self.printed.remove(&turn_id);
                let _ = writeln!(out);
            }
            TurnUpdate::Failed { turn_id, .. } | TurnUpdate::Crisis { turn_id, .. } => {
                self.printed.remove(&turn_id);
            }
            TurnUpdate::Started { .. } => {}
        }
    }

    /// Print everything already queued. Updates are published before
    /// `submit` returns, so this settles the finished turn.
    fn drain(&mut self, updates: &mut broadcast::Receiver<TurnUpdate>, out: &mut impl Write) {
        loop {
            match updates.try_recv() {
                Ok(update) => self.handle(update, out),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Update printer lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }
}

async fn repl(orchestrator: &Client, session_id: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_options: Vec<String> = Vec::new();
    let mut updates = orchestrator.subscribe();
    let mut printer = UpdatePrinter::new(session_id);

    loop {
        let state = orchestrator.state(session_id).await?;
        let step = state.session.current_step;
        print!(
            "[{}/{} {}] > ",
            state.progress_index.map(|i| i + 1).unwrap_or(0),
            state.step_count,
            step
        );
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if line == "/quit" {
            break;
        }
        if line == "/steps" {
            for entry in orchestrator.step_history(session_id).await? {
                let marker = if entry.completed_at.is_some() { "done" } else { "current" };
                println!("  {} ({}, {} messages)", entry.step, marker, entry.messages.len());
            }
            continue;
        }
        if let Some(action) = line.strip_prefix("/done") {
            let action = action.trim();
            if action.is_empty() {
                println!("Usage: /done <your first step>");
                continue;
            }
            match orchestrator.complete(session_id, action, None).await {
                Ok(()) => {
                    println!("Session complete. Good luck with: {}", action);
                    break;
                }
                Err(e) => println!("{}", e.user_message()),
            }
            continue;
        }

        if let Some(choice) = pick_option(&pending_options, line) {
            orchestrator.select_option(session_id, &choice).await?;
            pending_options.clear();
            println!("You chose: {}", choice);
            continue;
        }

        let outcome =
            submit_with_cancel(orchestrator, session_id, line, step, &mut updates, &mut printer)
                .await;
        printer.drain(&mut updates, &mut std::io::stdout());
        match outcome {
            Ok(TurnOutcome::Completed(turn)) => {
                if let Some(change) = turn.transition {
                    println!("-- {} -> {}", change.from, change.to);
                }
                if !turn.options.is_empty() {
                    for (i, option) in turn.options.iter().enumerate() {
                        println!("  {}) {}", i + 1, option);
                    }
                    pending_options = turn.options;
                }
                if turn.ledger_degraded {
                    println!("(history could not be saved; it will be retried on resume)");
                }
                if turn.session_complete {
                    println!("This session is complete. Use /done <action> to record your first step.");
                }
            }
            Ok(TurnOutcome::Crisis(payload)) => {
                print_crisis(&payload);
                break;
            }
            Ok(TurnOutcome::Cancelled) => println!("(cancelled)"),
            Ok(TurnOutcome::Ignored) => {}
            Err(e) => println!("\n{}", e.user_message()),
        }
    }

    Ok(())
}

/// Run a turn while streaming its text; Ctrl-C cancels it.
async fn submit_with_cancel(
    orchestrator: &Client,
    session_id: &str,
    text: &str,
    step: Step,
    updates: &mut broadcast::Receiver<TurnUpdate>,
    printer: &mut UpdatePrinter,
) -> Result<TurnOutcome, stepflow::TurnError> {
    let submit = orchestrator.submit(session_id, text, step);
    tokio::pin!(submit);
    let mut open = true;

    loop {
        tokio::select! {
            outcome = &mut submit => return outcome,
            update = updates.recv(), if open => match update {
                Ok(update) => printer.handle(update, &mut std::io::stdout()),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Update printer lagged");
                }
                Err(RecvError::Closed) => open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                orchestrator.cancel(session_id).await?;
            }
        }
    }
}

/// Match a number or a letter against the listed options.
fn pick_option(options: &[String], input: &str) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let index = match input.parse::<usize>() {
        Ok(n) => n.checked_sub(1)?,
        Err(_) => {
            let mut chars = input.chars();
            let letter = chars.next()?.to_ascii_uppercase();
            if chars.next().is_some() || !letter.is_ascii_uppercase() {
                return None;
            }
            (letter as u8 - b'A') as usize
        }
    };
    options.get(index).cloned()
}

fn print_crisis(payload: &CrisisPayload) {
    println!();
    if let Some(message) = &payload.message {
        println!("{}", message);
    }
    println!("If you are in danger, please reach out now:");
    for (region, number) in &payload.resources {
        println!("  {}: {}", region, number);
    }
}
