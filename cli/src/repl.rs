//! REPL shell: Reedline input on a blocking thread, provider events and
//! background refreshes on the async side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use reedline::{DefaultCompleter, DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use tokio::sync::mpsc::{self, UnboundedSender};
use walletwatch_core::commands::{format_board, Command};
use walletwatch_core::render::{NetworkWarning, Renderer, Slot, SlotBoard};
use walletwatch_core::{build_session, Session};

use crate::Cli;

/// Board that also reports every finished refresh pass, so passes started
/// by the timer or by provider events get printed.
struct ConsoleBoard {
    board: SlotBoard,
    passes: AtomicU64,
    finished: UnboundedSender<u64>,
}

impl ConsoleBoard {
    fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }
}

impl Renderer for ConsoleBoard {
    fn render(&self, slot: Slot, text: String) {
        self.board.render(slot, text);
    }

    fn set_network_label(&self, label: String) {
        self.board.set_network_label(label);
    }

    fn set_network_warning(&self, warning: Option<NetworkWarning>) {
        self.board.set_network_warning(warning);
    }

    fn set_loading(&self, loading: bool) {
        self.board.set_loading(loading);
        if !loading {
            let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = self.finished.send(pass);
        }
    }

    fn clear(&self, slot: &Slot) {
        self.board.clear(slot);
    }

    fn reset(&self, placeholders: &[(Slot, String)]) {
        self.board.reset(placeholders);
    }
}

enum Input {
    Line(String),
    Eof,
}

const COMMANDS: &[&str] = &[
    "connect",
    "disconnect",
    "toggle",
    "refresh",
    "r",
    "show",
    "balances",
    "bal",
    "tokens",
    "add_token",
    "add",
    "remove_token",
    "rm",
    "auto",
    "network",
    "net",
    "switch",
    "account",
    "acc",
    "help",
    "exit",
    "quit",
    "q",
];

/// Read lines on a plain thread. After each line the thread waits for an
/// ack so the prompt is redrawn only once the command's output is printed.
fn spawn_reader(
    tx: UnboundedSender<Input>,
    ack: std::sync::mpsc::Receiver<()>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let commands: Vec<String> = COMMANDS.iter().map(|c| c.to_string()).collect();
        let completer = Box::new(DefaultCompleter::new(commands));
        let mut line_editor = Reedline::create().with_completer(completer);
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic("[walletwatch]".to_string()),
            DefaultPromptSegment::Empty,
        );
        loop {
            match line_editor.read_line(&prompt) {
                Ok(Signal::Success(line)) => {
                    if tx.send(Input::Line(line)).is_err() || ack.recv().is_err() {
                        break;
                    }
                }
                Ok(Signal::CtrlD) | Ok(Signal::CtrlC) => {
                    let _ = tx.send(Input::Eof);
                    break;
                }
                Err(e) => {
                    eprintln!("Input error: {e}");
                    let _ = tx.send(Input::Eof);
                    break;
                }
            }
        }
    })
}

pub async fn run_repl(cli: &Cli) -> Result<()> {
    let config = cli.config();
    println!("walletwatch v{}", env!("CARGO_PKG_VERSION"));
    println!("RPC: {}", config.rpc_url);
    println!();

    let (finished_tx, mut finished) = mpsc::unbounded_channel();
    let console = Arc::new(ConsoleBoard {
        board: SlotBoard::new(),
        passes: AtomicU64::new(0),
        finished: finished_tx,
    });
    let board = console.board.clone();
    let mut session = build_session(&config, console.clone())?;
    let mut events = session
        .take_events()
        .context("Provider event channel already in use")?;

    if session.probe().await.is_none() {
        println!("No authorized account. Use 'connect' to link your wallet.");
    }
    if let Some(interval) = config.auto_refresh() {
        session.set_auto_refresh(Some(interval));
        println!("Auto-refresh every {}s.", interval.as_secs());
    }
    println!("{}", format_board(&board, false));
    println!("Type 'help' for a list of commands.");
    println!();
    let mut printed = console.passes();

    let (line_tx, mut lines) = mpsc::unbounded_channel();
    let (ack_tx, ack_rx) = std::sync::mpsc::channel();
    let _reader = spawn_reader(line_tx, ack_rx);

    loop {
        tokio::select! {
            input = lines.recv() => {
                let line = match input {
                    Some(Input::Line(line)) => line,
                    Some(Input::Eof) | None => break,
                };
                if handle_line(&line, &mut session, &board, cli.json).await {
                    break;
                }
                printed = console.passes();
                let _ = ack_tx.send(());
            }
            Some(event) = events.recv() => {
                let kind = event.kind();
                session.handle_event(event).await;
                println!("\n[{kind}]");
                println!("{}", format_board(&board, cli.json));
                printed = console.passes();
            }
            Some(pass) = finished.recv() => {
                if pass > printed {
                    println!("\n[refreshed]");
                    println!("{}", format_board(&board, cli.json));
                    printed = pass;
                }
            }
        }
    }

    session.set_auto_refresh(None);
    println!("Goodbye.");
    Ok(())
}

/// Run one input line. Returns `true` when the user asked to exit.
async fn handle_line(line: &str, session: &mut Session, board: &SlotBoard, json: bool) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    match Command::parse(line) {
        Ok(Command::Exit) => true,
        Ok(cmd) => {
            match cmd.execute(session, board, json).await {
                Ok(output) => {
                    if !output.is_empty() {
                        println!("{output}");
                    }
                }
                Err(e) => {
                    tracing::debug!("command failed: {e:#}");
                    eprintln!("Error: {e}");
                }
            }
            false
        }
        Err(e) => {
            eprintln!("{e}");
            false
        }
    }
}
