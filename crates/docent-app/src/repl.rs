//! Interactive terminal loop.
//!
//! Reads lines with rustyline on a dedicated thread, feeds them to the
//! pipeline and renders replies in the current theme.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::future::Future;
use std::io::Write;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use docent_chat::{ChatPipeline, Reply, SearchReply};
use docent_core::Theme;

use crate::theme::{painted_banner, palette};

const COMMANDS: &[&str] = &[
    "/help",
    "/theme",
    "/bookmark",
    "/preview",
    "/similar",
    "/analyze",
    "/history",
    "/sessions",
    "/analytics",
    "/exit",
];

/// Completion, highlighting and hints for slash commands.
#[derive(Clone)]
struct CommandHelper {
    commands: Vec<String>,
}

impl CommandHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if let Some(partial) = line.strip_prefix("/theme ") {
            let start = pos - partial.len();
            let candidates = theme_names()
                .into_iter()
                .filter(|name| name.starts_with(partial))
                .map(|name| Pair {
                    display: name.to_string(),
                    replacement: name.to_string(),
                })
                .collect();
            return Ok((start, candidates));
        }

        if line.starts_with('/') && !line.contains(' ') {
            let candidates = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CommandHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CommandHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CommandHelper {}

type LineEditor = Editor<CommandHelper, DefaultHistory>;

/// Outcome of one readline call.
enum Input {
    Line(String),
    Quit,
    Interrupted,
}

/// Line editor running on its own thread.
///
/// The editor never leaves the thread; prompts go in and lines come back
/// over channels so the async side never blocks on the terminal.
struct LineReader {
    prompts: std::sync::mpsc::Sender<String>,
    lines: mpsc::UnboundedReceiver<Input>,
}

impl LineReader {
    fn spawn() -> Result<Self, Box<dyn std::error::Error>> {
        let (prompt_tx, prompt_rx) = std::sync::mpsc::channel::<String>();
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

        thread::Builder::new()
            .name("docent-readline".to_string())
            .spawn(move || {
                let mut editor: LineEditor = match Editor::new() {
                    Ok(editor) => editor,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                editor.set_helper(Some(CommandHelper::new()));
                let _ = ready_tx.send(Ok(()));

                while let Ok(prompt) = prompt_rx.recv() {
                    let input = match editor.readline(&prompt) {
                        Ok(line) => {
                            if !line.trim().is_empty() {
                                let _ = editor.add_history_entry(line.as_str());
                            }
                            Input::Line(line)
                        }
                        Err(ReadlineError::Interrupted) => Input::Interrupted,
                        Err(ReadlineError::Eof) => Input::Quit,
                        Err(e) => {
                            error!(error = %e, "Failed to read input");
                            Input::Quit
                        }
                    };
                    if line_tx.send(input).is_err() {
                        break;
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                prompts: prompt_tx,
                lines: line_rx,
            }),
            Ok(Err(e)) => Err(format!("Failed to start line editor: {}", e).into()),
            Err(_) => Err("Line editor thread exited during start-up".into()),
        }
    }

    async fn read(&mut self, prompt: String) -> Input {
        if self.prompts.send(prompt).is_err() {
            return Input::Quit;
        }
        self.lines.recv().await.unwrap_or(Input::Quit)
    }
}

/// The terminal front end around a [`ChatPipeline`].
pub struct Repl {
    pipeline: ChatPipeline,
    reader: LineReader,
    typing_delay: Duration,
}

impl Repl {
    pub fn new(pipeline: ChatPipeline) -> Result<Self, Box<dyn std::error::Error>> {
        let reader = LineReader::spawn()?;
        let typing_delay = Duration::from_millis(pipeline.config().ui.typing_delay_ms);
        Ok(Self {
            pipeline,
            reader,
            typing_delay,
        })
    }

    /// Run until `/exit`, Ctrl-C or Ctrl-D. History is saved on the way out.
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.print_welcome();

        loop {
            let prompt = format!("{} ", "you ›".color(palette(self.pipeline.theme()).user).bold());
            match self.reader.read(prompt).await {
                Input::Line(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if matches!(trimmed, "/exit" | "/quit") {
                        break;
                    }
                    if until_interrupted(self.handle_line(trimmed), ctrl_c())
                        .await
                        .is_none()
                    {
                        println!();
                        warn!("Interrupted during a request");
                        break;
                    }
                }
                Input::Interrupted | Input::Quit => break,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) {
        let theme_before = self.pipeline.theme();
        let p = palette(theme_before);
        println!("{}", "docent is thinking…".color(p.system).italic());

        match self.pipeline.respond(line).await {
            Reply::Text(text) => self.reveal(&text).await,
            Reply::Search(reply) => self.show_search(reply).await,
        }

        let theme_after = self.pipeline.theme();
        if theme_after != theme_before {
            println!("{}", painted_banner(theme_after));
        }
        println!();
    }

    async fn show_search(&mut self, reply: SearchReply) {
        self.reveal(&reply.text).await;

        if let Some(recommendation) = reply.recommendation {
            let p = palette(self.pipeline.theme());
            if let Some(text) = recommendation.await {
                println!();
                println!("{} {}", "💡".color(p.accent), text.color(p.accent));
            }
        }
    }

    /// Print a reply character by character in the assistant colour.
    async fn reveal(&self, text: &str) {
        let colour = palette(self.pipeline.theme()).assistant;
        print!("{} ", "docent ›".color(colour).bold());

        if self.typing_delay.is_zero() {
            println!("{}", text.color(colour));
            return;
        }

        let mut stdout = std::io::stdout();
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let s: &str = ch.encode_utf8(&mut buf);
            print!("{}", s.color(colour));
            let _ = stdout.flush();
            tokio::time::sleep(self.typing_delay).await;
        }
        println!();
    }

    fn print_welcome(&self) {
        let theme = self.pipeline.theme();
        let p = palette(theme);
        println!("{}", painted_banner(theme));
        println!(
            "{}",
            "Ask about your documents, or type /help for commands and /exit to quit."
                .color(p.system)
        );
        println!();
    }

    async fn shutdown(&mut self) {
        let p = palette(self.pipeline.theme());
        match self.pipeline.save().await {
            Ok(()) => {
                info!("History saved");
                println!("{}", "History saved. Goodbye!".color(p.system));
            }
            Err(e) => {
                error!(error = %e, "Failed to save history");
                eprintln!("{}", format!("Failed to save history: {}", e).red());
            }
        }
    }
}

/// Drive `work` to completion unless `interrupt` resolves first.
async fn until_interrupted<F, I>(work: F, interrupt: I) -> Option<F::Output>
where
    F: Future,
    I: Future<Output = ()>,
{
    tokio::select! {
        output = work => Some(output),
        () = interrupt => None,
    }
}

/// Resolves on the first Ctrl-C. Never resolves if the handler cannot be
/// installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Theme names offered by `/theme` completion.
fn theme_names() -> Vec<&'static str> {
    Theme::ALL.iter().map(|t| t.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyline::history::DefaultHistory as History;

    #[test]
    fn test_hint_completes_command() {
        let helper = CommandHelper::new();
        let history = History::new();
        let ctx = Context::new(&history);
        assert_eq!(helper.hint("/hist", 5, &ctx), Some("ory".to_string()));
        assert_eq!(helper.hint("/history now", 12, &ctx), None);
        assert_eq!(helper.hint("hello", 5, &ctx), None);
    }

    #[test]
    fn test_complete_lists_matching_commands() {
        let helper = CommandHelper::new();
        let history = History::new();
        let ctx = Context::new(&history);
        let (start, candidates) = helper.complete("/s", 2, &ctx).unwrap();
        assert_eq!(start, 0);
        let names: Vec<&str> = candidates.iter().map(|c| c.replacement.as_str()).collect();
        assert_eq!(names, vec!["/similar", "/sessions"]);
    }

    #[test]
    fn test_complete_theme_argument() {
        let helper = CommandHelper::new();
        let history = History::new();
        let ctx = Context::new(&history);
        let (start, candidates) = helper.complete("/theme o", 8, &ctx).unwrap();
        assert_eq!(start, 7);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].replacement, "ocean");
    }

    // ---- Interruption ----

    #[tokio::test]
    async fn test_work_finishes_without_interrupt() {
        let out = until_interrupted(async { 42 }, std::future::pending()).await;
        assert_eq!(out, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_cancels_in_flight_work() {
        let work = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            "reply"
        };
        let interrupt = tokio::time::sleep(Duration::from_millis(10));
        assert_eq!(until_interrupted(work, interrupt).await, None);
    }

    #[test]
    fn test_theme_names() {
        assert_eq!(theme_names(), vec!["cyberpunk", "ocean", "forest", "sunset"]);
    }
}
