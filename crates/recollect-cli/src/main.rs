//! `recollect-cli` – recollect Command Line Interface
//!
//! An interactive shell around the tiered memory engine. It:
//!
//! 1. Checks for `~/.recollect/config.toml`; runs a **First-Run Wizard** when
//!    the file is absent.
//! 2. Probes the local Ollama instance and reports available AI models.
//! 3. Opens the SQLite memory store and wires it to the configured model.
//! 4. Drops the user into an **interactive REPL** where conversation turns
//!    are buffered, committed into memory and recalled.
//! 5. Intercepts **Ctrl-C** to stop the REPL cleanly.

mod config;
mod ollama;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use recollect_memory::MemorySystem;
use recollect_runtime::{LlmDriver, LlmPolicy};
use recollect_types::RecollectError;

use crate::config::{AiProvider, Config};
use crate::repl::prompt_str;

fn main() {
    let _telemetry = recollect_runtime::init_tracing("recollect");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – finishing the current command …".yellow().bold());
        println!("{}", "  Press Enter to leave recollect.".dimmed());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(_)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
        }
    }

    let cfg = config::load_or_default();

    // ── Ollama discovery ──────────────────────────────────────────────────
    if cfg.ai_provider == AiProvider::Ollama {
        probe_ollama(&cfg);
    } else {
        println!("\n  Provider: {} at {}", cfg.ai_provider.to_string().bold(), cfg.openai_url.dimmed());
    }

    // ── Memory engine ─────────────────────────────────────────────────────
    let memory = match build_memory(&cfg) {
        Ok(memory) => memory,
        Err(e) => {
            println!("{}: {}", "Failed to start the memory engine".red(), e);
            std::process::exit(1);
        }
    };

    println!();
    println!(
        "  Talking as {}. Type {} for a list of commands.\n",
        cfg.user_id.bold(),
        "/help".bold().cyan()
    );

    repl::run(repl::Session::new(memory, cfg.user_id.clone()), shutdown);
}

/// Open the memory store and connect it to the configured model.
fn build_memory(cfg: &Config) -> Result<MemorySystem, RecollectError> {
    let memory_config = cfg.memory_config();
    if let Some(path) = memory_config.db_path.as_deref()
        && let Some(parent) = std::path::Path::new(path).parent()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| RecollectError::Storage(format!("{}: {}", parent.display(), e)))?;
    }

    let driver = LlmDriver::new(cfg.base_url(), cfg.active_model.clone())
        .with_embedding_model(cfg.embedding_model.clone())
        .with_api_key(cfg.api_key())
        .with_timeout(Duration::from_secs(cfg.request_timeout_secs))
        .map_err(|e| RecollectError::Policy(e.to_string()))?;
    let policy = Arc::new(LlmPolicy::new(driver));

    let memory = MemorySystem::open(memory_config.clone(), policy)
        .map_err(|e| RecollectError::Storage(e.to_string()))?;
    info!(
        db_path = memory_config.db_path.as_deref().unwrap_or(":memory:"),
        model = %cfg.active_model,
        "memory engine ready"
    );
    Ok(memory)
}

fn probe_ollama(cfg: &Config) {
    print!("\n  Probing Ollama at {} … ", cfg.ollama_url.dimmed());
    match ollama::fetch_models(&cfg.ollama_url) {
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            for m in &models {
                println!("    • {}", m.name.bold());
            }
            for wanted in [&cfg.active_model, &cfg.embedding_model] {
                if !ollama::has_model(&models, wanted) {
                    println!(
                        "  {} '{}' is not downloaded. Run `{}`.",
                        "Warning:".yellow(),
                        wanted,
                        format!("ollama pull {wanted}").bold()
                    );
                }
            }
        }
        Err(_) => {
            println!("{}", "offline".yellow());
            println!(
                "  {}  Run `{}` to start a local AI.",
                "No Ollama instance detected.".dimmed(),
                "ollama serve".bold()
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      recollect First-Run Wizard      ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up recollect.\n");

    let mut cfg = Config::default();

    println!("  Which AI provider would you like to use?");
    println!("    1) Local AI via Ollama  (default, offline-first)");
    println!("    2) Cloud AI via OpenAI");
    let choice = prompt_str("  Enter choice [1]: ", "1");
    cfg.ai_provider = match choice.trim() {
        "2" => AiProvider::OpenAI,
        other => AiProvider::parse(other),
    };

    if cfg.ai_provider == AiProvider::OpenAI {
        cfg.active_model = "gpt-4o-mini".to_string();
        cfg.embedding_model = "text-embedding-3-small".to_string();
        cfg.openai_api_key = prompt_str("  OpenAI API key: ", "");
    }

    cfg.active_model = prompt_str(&format!("  Chat model [{}]: ", cfg.active_model), &cfg.active_model);
    cfg.embedding_model = prompt_str(
        &format!("  Embedding model [{}]: ", cfg.embedding_model),
        &cfg.embedding_model,
    );
    cfg.user_id = prompt_str(&format!("  Your name [{}]: ", cfg.user_id), &cfg.user_id);

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ________  _________  / / /__  _____/ /_"#.bold().cyan());
    println!("{}", r#"  / ___/ _ \/ ___/ __ \/ / / _ \/ ___/ __/"#.bold().cyan());
    println!("{}", r#" / /  /  __/ /__/ /_/ / / /  __/ /__/ /_  "#.bold().cyan());
    println!("{}", r#"/_/   \___/\___/\____/_/_/\___/\___/\__/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "recollect".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Tiered memory for conversational agents");
    println!();
}
