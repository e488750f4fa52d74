//! REPL – Read-Eval-Print Loop for the recollect interactive shell.
//!
//! Supported slash-commands:
//!   /help            – show this list
//!   /say <text>      – add a user turn and show what it recalls (bare text works too)
//!   /reply <text>    – add an assistant turn
//!   /buffer          – show the turns waiting to be committed
//!   /commit          – feed the buffered turns to the memory engine
//!   /recall <query>  – deep recall across all long-term memories
//!   /stats           – memory counts and average HP for the current user
//!   /clear           – forget everything about the current user
//!   /user <id>       – switch the current user
//!   /settings        – interactively edit `~/.recollect/config.toml`
//!   /models          – list / switch the active AI model
//!   /quit | /exit    – gracefully exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use recollect_memory::{MemorySystem, UpdateReport};
use recollect_types::{ConversationState, MemoryStats, Role};

use crate::config::{self, AiProvider};
use crate::ollama;

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Say(String),
    Reply(String),
    Buffer,
    Commit,
    Recall(String),
    Stats,
    Clear,
    User(String),
    Settings,
    Models,
    Quit,
    Unknown(String),
}

/// Parse one input line. Blank lines yield `None`; text without a leading
/// slash is a user turn.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Say(line.to_string()));
    }
    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim().to_string()),
        None => (line, String::new()),
    };
    let command = match name {
        "/help" => Command::Help,
        "/say" => Command::Say(arg),
        "/reply" => Command::Reply(arg),
        "/buffer" => Command::Buffer,
        "/commit" => Command::Commit,
        "/recall" => Command::Recall(arg),
        "/stats" => Command::Stats,
        "/clear" => Command::Clear,
        "/user" => Command::User(arg),
        "/settings" => Command::Settings,
        "/models" => Command::Models,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// The memory engine, the current user and the turns not yet committed.
pub struct Session {
    memory: MemorySystem,
    user_id: String,
    buffer: Vec<ConversationState>,
}

impl Session {
    pub fn new(memory: MemorySystem, user_id: impl Into<String>) -> Self {
        Self {
            memory,
            user_id: user_id.into(),
            buffer: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn buffer(&self) -> &[ConversationState] {
        &self.buffer
    }

    /// Buffer a user turn and return the memories it brings to mind.
    pub fn say(&mut self, text: &str) -> String {
        self.buffer.push(ConversationState::user(text));
        self.memory.get_relevant_memories(text, &self.user_id)
    }

    pub fn reply(&mut self, text: &str) {
        self.buffer.push(ConversationState::assistant(text));
    }

    /// Hand the buffered turns to the engine. The buffer is kept when the
    /// batch was too small to become a memory.
    pub fn commit(&mut self) -> UpdateReport {
        if self.buffer.is_empty() {
            return UpdateReport::default();
        }
        let report = self.memory.update_memory(&self.buffer, &self.user_id);
        if report.created.is_some() {
            self.buffer.clear();
        }
        report
    }

    pub fn recall(&mut self, query: &str) -> String {
        self.memory.deep_recall(query, &self.user_id)
    }

    pub fn stats(&self) -> MemoryStats {
        self.memory.get_stats(&self.user_id)
    }

    pub fn clear(&mut self) {
        self.memory.clear_user_memories(&self.user_id);
        self.buffer.clear();
    }

    /// Switch to another user. Uncommitted turns belong to the previous
    /// conversation and are dropped.
    pub fn switch_user(&mut self, user_id: &str) -> bool {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return false;
        }
        self.user_id = user_id.to_string();
        self.buffer.clear();
        true
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(mut session: Session, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", format!("{}>", session.user_id()).bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let Some(command) = parse_command(&line) else {
            continue;
        };

        match command {
            Command::Help => cmd_help(),
            Command::Say(text) => cmd_say(&mut session, &text),
            Command::Reply(text) => cmd_reply(&mut session, &text),
            Command::Buffer => cmd_buffer(&session),
            Command::Commit => cmd_commit(&mut session),
            Command::Recall(query) => println!("{}", session.recall(&query)),
            Command::Stats => cmd_stats(&session),
            Command::Clear => cmd_clear(&mut session),
            Command::User(id) => cmd_user(&mut session, &id),
            Command::Settings => cmd_settings(),
            Command::Models => cmd_models(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "recollect Commands".bold().underline());
    println!("  {}  – add a user turn and show recalled memories", "/say <text>".bold().cyan());
    println!("  {} – add an assistant turn", "/reply <text>".bold().cyan());
    println!("  {}       – show uncommitted turns", "/buffer".bold().cyan());
    println!("  {}       – store the buffered conversation", "/commit".bold().cyan());
    println!("  {} – search every long-term memory", "/recall <query>".bold().cyan());
    println!("  {}        – memory statistics", "/stats".bold().cyan());
    println!("  {}        – forget the current user", "/clear".bold().cyan());
    println!("  {}    – switch user", "/user <id>".bold().cyan());
    println!("  {}     – edit ~/.recollect/config.toml", "/settings".bold().cyan());
    println!("  {}       – list and switch AI models", "/models".bold().cyan());
    println!("  {}  – exit the CLI", "/quit  /exit".bold().cyan());
    println!("  Text without a leading slash is treated as {}.", "/say".bold());
    println!();
}

fn cmd_say(session: &mut Session, text: &str) {
    if text.is_empty() {
        println!("{} /say <text>", "Usage:".yellow());
        return;
    }
    let recalled = session.say(text);
    if recalled.is_empty() {
        println!("  {}", "(no relevant memories)".dimmed());
    } else {
        println!("{}", recalled.dimmed());
    }
}

fn cmd_reply(session: &mut Session, text: &str) {
    if text.is_empty() {
        println!("{} /reply <text>", "Usage:".yellow());
        return;
    }
    session.reply(text);
    println!("  {} {} turn(s) buffered", "✓".green(), session.buffer().len());
}

fn cmd_buffer(session: &Session) {
    if session.buffer().is_empty() {
        println!("  {}", "(buffer is empty)".dimmed());
        return;
    }
    for (i, state) in session.buffer().iter().enumerate() {
        let role = match state.role {
            Role::User => "user".cyan(),
            Role::Assistant => "assistant".green(),
            Role::Tool => "tool".yellow(),
            Role::System => "system".magenta(),
        };
        println!("  {:>3}. [{}] {}", i + 1, role, state.content);
    }
}

fn cmd_commit(session: &mut Session) {
    if session.buffer().is_empty() {
        println!("  {}", "Nothing to commit.".dimmed());
        return;
    }
    let turns = session.buffer().len();
    let report = session.commit();
    match report.created {
        Some(id) => {
            println!("  {} {} turn(s) stored as memory {}", "✓".green(), turns, id.to_string().bold());
            if report.promoted > 0 {
                println!(
                    "  {} {} memory(ies) promoted into {} long-term fact(s)",
                    "↑".cyan(),
                    report.promoted,
                    report.facts_saved
                );
            }
            if report.expired > 0 {
                println!("  {} {} faded memory(ies) forgotten", "✗".yellow(), report.expired);
            }
        }
        None => println!(
            "  {} Conversation not dense enough yet; {} turn(s) kept in the buffer.",
            "…".yellow(),
            turns
        ),
    }
}

fn cmd_stats(session: &Session) {
    let stats = session.stats();
    println!("{}", format!("Memory for {}", session.user_id()).bold().underline());
    println!(
        "  Short-term : {} item(s), avg HP {:.2}",
        stats.short_term.count.to_string().yellow(),
        stats.short_term.avg_hp
    );
    println!(
        "  Long-term  : {} item(s), avg HP {:.2}",
        stats.long_term.count.to_string().yellow(),
        stats.long_term.avg_hp
    );
}

fn cmd_clear(session: &mut Session) {
    let answer = prompt_str(
        &format!("  Forget everything about '{}'? [y/N]: ", session.user_id()),
        "n",
    );
    if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        session.clear();
        println!("  {} All memories cleared.", "✓".green());
    } else {
        println!("  {}", "Cancelled.".dimmed());
    }
}

fn cmd_user(session: &mut Session, id: &str) {
    if session.switch_user(id) {
        println!("  {} Now talking as {}", "✓".green(), session.user_id().bold());
    } else {
        println!("  Current user: {}", session.user_id().bold());
    }
}

fn cmd_settings() {
    let mut cfg = match config::load() {
        Ok(Some(c)) => c,
        Ok(None) => config::Config::default(),
        Err(e) => {
            println!("{}: {}", "Error loading config".red(), e);
            return;
        }
    };

    println!("{}", "Settings Editor".bold().underline());

    let provider = prompt_str(
        &format!("  AI provider (ollama / openai) [{}]: ", cfg.ai_provider),
        &cfg.ai_provider.to_string(),
    );
    cfg.ai_provider = AiProvider::parse(&provider);

    cfg.active_model = prompt_str(&format!("  Chat model      [{}]: ", cfg.active_model), &cfg.active_model);
    cfg.embedding_model = prompt_str(
        &format!("  Embedding model [{}]: ", cfg.embedding_model),
        &cfg.embedding_model,
    );
    if cfg.ai_provider == AiProvider::Ollama {
        cfg.ollama_url = prompt_str(&format!("  Ollama URL      [{}]: ", cfg.ollama_url), &cfg.ollama_url);
    }

    cfg.memory.states_token_threshold = prompt_usize(
        &format!("  Summarize after ~N tokens [{}]: ", cfg.memory.states_token_threshold),
        cfg.memory.states_token_threshold,
    );
    cfg.memory.short_term_max_count = prompt_usize(
        &format!("  Short-term capacity       [{}]: ", cfg.memory.short_term_max_count),
        cfg.memory.short_term_max_count,
    );

    match config::save(&cfg) {
        Ok(()) => {
            println!(
                "{} {}",
                "✓ Settings saved to".green(),
                config::config_path().display().to_string().bold()
            );
            println!("  {}", "Restart recollect for the changes to take effect.".dimmed());
        }
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

fn cmd_models() {
    let cfg = config::load_or_default();

    println!("{}", "AI Models".bold().underline());
    println!("  Chat model      : {}", cfg.active_model.yellow());
    println!("  Embedding model : {}", cfg.embedding_model.yellow());

    if cfg.ai_provider != AiProvider::Ollama {
        println!("  Provider: {}", cfg.ai_provider.to_string().yellow());
        println!("  (Edit cloud models with /settings.)");
        return;
    }

    print!("  Probing Ollama at {} … ", cfg.ollama_url.dimmed());
    io::stdout().flush().ok();

    match ollama::fetch_models(&cfg.ollama_url) {
        Ok(models) if models.is_empty() => {
            println!("{}", "no models found".yellow());
            println!("  Run `ollama pull {}` to download a model.", cfg.active_model);
        }
        Ok(models) => {
            println!("{}", "online".green());
            println!("  Available local models:");
            for m in &models {
                let active = ollama::has_model(std::slice::from_ref(m), &cfg.active_model);
                let marker = if active { "▶" } else { " " };
                println!("    {} {}", marker.green(), m.name.bold());
            }
            if !ollama::has_model(&models, &cfg.embedding_model) {
                println!(
                    "  {} embedding model '{}' is not downloaded",
                    "Warning:".yellow(),
                    cfg.embedding_model
                );
            }

            let new_model = prompt_str(
                &format!("  Switch chat model [{}]: ", cfg.active_model),
                &cfg.active_model,
            );
            if new_model != cfg.active_model {
                if ollama::has_model(&models, &new_model) {
                    let mut new_cfg = cfg.clone();
                    new_cfg.active_model = new_model.clone();
                    match config::save(&new_cfg) {
                        Ok(()) => println!(
                            "{} {} (restart to apply)",
                            "✓ Chat model set to".green(),
                            new_model.bold()
                        ),
                        Err(e) => println!("{}: {}", "Error saving config".red(), e),
                    }
                } else {
                    println!("{} '{}'", "Unknown model:".red(), new_model.yellow());
                }
            }
        }
        Err(e) => {
            println!("{}", "offline".red());
            println!("  {}", e.dimmed());
            println!("  Is Ollama running?  Try: ollama serve");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Prompt for a count.  Returns `default` when the user presses Enter.
fn prompt_usize(msg: &str, default: usize) -> usize {
    let raw = prompt_str(msg, &default.to_string());
    match raw.parse::<usize>() {
        Ok(v) => v,
        Err(_) => {
            println!(
                "  {} '{}' is not a valid number, keeping {}",
                "Warning:".yellow(),
                raw,
                default
            );
            default
        }
    }
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        Err(_) => default.to_string(),
    }
}
