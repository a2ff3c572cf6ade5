//! Plan execution CLI.
//!
//! Validates and runs structured plans against a sandboxed workspace, asking
//! for confirmation according to the plan's risk level, and shows stored runs.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use planrun::approval::{confirm, write_summary};
use planrun::core::risk::{Approval, approval_for};
use planrun::core::trace::ExecutionResult;
use planrun::core::types::{Plan, RiskLevel};
use planrun::executor::Executor;
use planrun::exit_codes;
use planrun::io::config::{CONFIG_FILE, Settings, load_settings, write_settings};
use planrun::io::run_store::{latest_run, load_plan, load_trace};
use planrun::logging;
use planrun::planner::{CannedPlanner, Planner};

#[derive(Parser)]
#[command(
    name = "planrun",
    version,
    about = "Sandboxed, traced execution of structured plans"
)]
struct Cli {
    /// Settings file; missing means defaults.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default settings file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Check a plan file against the schema and plan invariants.
    Validate {
        plan: PathBuf,
    },
    /// Execute a saved plan file.
    Run {
        plan: PathBuf,
        #[command(flatten)]
        opts: ExecOpts,
    },
    /// Generate a plan for a goal with the canned planner and execute it.
    Execute {
        goal: String,
        #[command(flatten)]
        opts: ExecOpts,
    },
    /// Show the stored result of a run (latest when omitted).
    Replay {
        run_dir: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct ExecOpts {
    /// Skip confirmation for LOW/MEDIUM plans. HIGH risk plans are refused.
    #[arg(short, long)]
    yes: bool,
    /// Record steps without invoking tools.
    #[arg(long)]
    dry_run: bool,
    /// Workspace root tools are confined to (overrides settings).
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Validate { plan } => cmd_validate(&plan),
        Command::Run { plan, opts } => {
            let settings = settings_for(&cli.config, &opts)?;
            let plan = load_plan(&plan)?;
            let planner = CannedPlanner::new();
            let risk = plan.risk_level.max(planner.estimate_risk_level(&plan));
            execute(&settings, &plan, risk, &opts)
        }
        Command::Execute { goal, opts } => {
            let settings = settings_for(&cli.config, &opts)?;
            let planner = CannedPlanner::new();
            let plan = planner
                .generate_plan(&goal, &settings.workspace_root()?)
                .context("generate plan")?;
            let risk = plan.risk_level.max(planner.estimate_risk_level(&plan));
            execute(&settings, &plan, risk, &opts)
        }
        Command::Replay { run_dir } => cmd_replay(&cli.config, run_dir),
    }
}

fn cmd_init(config: &Path, force: bool) -> Result<i32> {
    if config.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config.display());
    }
    write_settings(config, &Settings::default())?;
    println!("wrote {}", config.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(path: &Path) -> Result<i32> {
    let plan = load_plan(path)?;
    println!("ok: {} step(s), risk {}", plan.steps.len(), plan.risk_level);
    Ok(exit_codes::OK)
}

fn settings_for(config: &Path, opts: &ExecOpts) -> Result<Settings> {
    let mut settings = load_settings(config)?;
    if let Some(workspace) = &opts.workspace {
        settings.workspace_root = Some(workspace.clone());
    }
    Ok(settings)
}

fn execute(settings: &Settings, plan: &Plan, risk: RiskLevel, opts: &ExecOpts) -> Result<i32> {
    let executor = Executor::from_settings(settings)?;

    if !opts.dry_run {
        match approval_for(risk, opts.yes) {
            Approval::Proceed => {
                write_summary(plan, &mut io::stdout().lock())?;
            }
            Approval::Confirm => {
                let approved = confirm(plan, io::stdin().lock(), io::stdout().lock())?;
                if !approved {
                    println!("Execution cancelled.");
                    return Ok(exit_codes::DECLINED);
                }
            }
            Approval::Refuse => {
                eprintln!(
                    "Refusing to execute {} risk plan with --yes; run without --yes to confirm",
                    risk
                );
                return Ok(exit_codes::DECLINED);
            }
        }
    } else {
        write_summary(plan, &mut io::stdout().lock())?;
    }

    let result = executor.execute_plan(plan, opts.dry_run)?;
    print_result(&result);
    if result.is_success() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::FAILED)
    }
}

fn cmd_replay(config: &Path, run_dir: Option<PathBuf>) -> Result<i32> {
    let run_dir = match run_dir {
        Some(dir) => dir,
        None => {
            let runs_dir = load_settings(config)?.runs_dir()?;
            latest_run(&runs_dir)?
                .with_context(|| format!("no runs under {}", runs_dir.display()))?
        }
    };
    let result = load_trace(&run_dir)?;
    print_result(&result);
    for trace in &result.traces {
        let error = trace
            .error
            .as_deref()
            .map(|e| format!(": {}", e.trim_end()))
            .unwrap_or_default();
        println!(
            "  [{}] {} {} (inputs {}){}",
            trace.step_id, trace.tool, trace.status, trace.inputs_digest, error
        );
    }
    Ok(exit_codes::OK)
}

fn print_result(result: &ExecutionResult) {
    println!("Status: {}", result.overall_status);
    println!(
        "Steps: {} total, {} succeeded, {} failed, {} skipped",
        result.total_steps, result.successful_steps, result.failed_steps, result.skipped_steps
    );
    if let Some(ms) = result.duration_ms() {
        println!("Duration: {} ms", ms);
    }
    for file in &result.produced_files {
        println!("Produced: {}", file);
    }
    if let Some(summary) = &result.error_summary {
        println!("Error: {}", summary.trim_end());
    }
    if let Some(dir) = &result.run_dir {
        println!("Run: {}", dir.display());
    }
}
