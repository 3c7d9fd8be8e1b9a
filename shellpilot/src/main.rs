//! Operator-supervised shell task loop.
//!
//! `shellpilot run` asks for a goal, has the oracle plan shell commands,
//! confirms the plan with the operator, and executes it, generating and
//! self-repairing any source files the plan creates.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use shellpilot::core::classifier::{Classified, classify, is_long_running};
use shellpilot::core::types::SessionOutcome;
use shellpilot::exit_codes;
use shellpilot::io::config::{CONFIG_FILE_NAME, PilotConfig, load_config, write_config};
use shellpilot::io::operator::TerminalOperator;
use shellpilot::io::oracle::OpenAiOracle;
use shellpilot::io::runner::SystemRunner;
use shellpilot::logging;
use shellpilot::plan::PlanEvent;
use shellpilot::session::{SessionConfig, run_session};

#[derive(Parser)]
#[command(
    name = "shellpilot",
    version,
    about = "Plan, confirm, and run shell tasks with an LLM in the loop"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask for a goal and work on it until it succeeds or attempts run out.
    Run {
        /// Use this goal instead of prompting for one.
        #[arg(short, long)]
        task: Option<String>,
        /// Run plans without asking for confirmation.
        #[arg(short, long)]
        yes: bool,
        /// Config file (defaults to `shellpilot.toml` in the current directory).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print how each line of a plan would be handled, without running anything.
    Classify {
        /// Plan file; reads stdin when omitted.
        file: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a default `shellpilot.toml`.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { task, yes, config } => cmd_run(task, yes, &config_path(config)),
        Command::Classify { file, config } => cmd_classify(file.as_deref(), &config_path(config)),
        Command::Init { force, config } => cmd_init(force, &config_path(config)),
    }
}

fn config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn cmd_run(task: Option<String>, yes: bool, config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    // Fail before the first prompt when the credential is missing.
    let oracle = OpenAiOracle::from_config(&cfg.oracle)?;
    let runner = SystemRunner;
    let operator = TerminalOperator::stdio(task, yes);
    let start_dir = std::env::current_dir().context("read current directory")?;
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let session = SessionConfig::from_config(&cfg, home);

    let report = run_session(&oracle, &runner, &operator, &session, start_dir, print_event)?;

    let code = match report.outcome {
        SessionOutcome::Completed { attempt } => {
            println!("\nDone after {attempt} attempt(s).");
            exit_codes::OK
        }
        SessionOutcome::Exited => exit_codes::OK,
        SessionOutcome::Aborted { attempt } => {
            println!("\nPlan {attempt} declined; stopping.");
            exit_codes::ABORTED
        }
        SessionOutcome::Exhausted { attempts } => {
            println!("\nMaximum attempts reached ({attempts}); giving up.");
            exit_codes::EXHAUSTED
        }
    };
    Ok(code)
}

fn cmd_classify(file: Option<&Path>, config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let plan = match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read plan from stdin")?;
            buf
        }
    };
    for line in describe_plan(&plan, &cfg) {
        println!("{line}");
    }
    Ok(exit_codes::OK)
}

fn cmd_init(force: bool, config_path: &Path) -> Result<i32> {
    if !force && config_path.exists() {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &PilotConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

/// One `<label>\t<line>` entry per non-blank plan line.
fn describe_plan(plan: &str, cfg: &PilotConfig) -> Vec<String> {
    plan.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let label = match classify(line) {
                Classified::Skip => "skip".to_string(),
                _ if is_long_running(line, &cfg.long_running) => "filtered".to_string(),
                other => other.to_string(),
            };
            format!("{label}\t{line}")
        })
        .collect()
}

fn print_event(event: &PlanEvent) {
    match event {
        PlanEvent::LongRunningFiltered { command } => {
            println!("~ skipped long-running command: {command}");
        }
        PlanEvent::DuplicateSkipped { command } => println!("~ already done: {command}"),
        PlanEvent::DirectoryChanged { dir, .. } => println!("$ cd {}", dir.display()),
        PlanEvent::CommandSucceeded {
            command,
            stdout,
            stderr,
        } => {
            println!("$ {command}");
            print_output(stdout, stderr);
        }
        PlanEvent::CommandFailed {
            command,
            kind,
            diagnostic,
        } => {
            println!("! {command} failed ({kind})");
            println!("{}", diagnostic.trim_end());
        }
        PlanEvent::ArtifactWritten { path } => println!("+ wrote {}", path.display()),
        PlanEvent::ArtifactStatic { path } => {
            println!("  {} is not runnable, skipping validation", path.display());
        }
        PlanEvent::ArtifactPassed {
            path,
            stdout,
            stderr,
        } => {
            println!("  {} ran cleanly", path.display());
            print_output(stdout, stderr);
        }
        PlanEvent::ArtifactFailed { path, diagnostic } => {
            println!("  {} failed:", path.display());
            println!("{}", diagnostic.trim_end());
        }
        PlanEvent::ArtifactRepaired { path, repair } => {
            println!("  {} rewritten (repair {repair})", path.display());
        }
    }
}

fn print_output(stdout: &str, stderr: &str) {
    for text in [stdout, stderr] {
        let text = text.trim_end();
        if !text.is_empty() {
            println!("{text}");
        }
    }
}
