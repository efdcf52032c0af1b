//! `fixer`: run the bug-fixing agent on one working copy.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fixer::agents::ActionEvaluator;
use fixer::agents::exec_oracle::ExecOracle;
use fixer::core::trajectory::Trajectory;
use fixer::core::types::ViewFile;
use fixer::dispatch::Toolbox;
use fixer::edit::EditPipeline;
use fixer::exit_codes;
use fixer::io::config::{FixerConfig, load_config};
use fixer::io::executor::CodexExecutor;
use fixer::io::git::{Git, VersionControl};
use fixer::io::lint::CommandChecker;
use fixer::io::workspace::Workspace;
use fixer::logging;
use fixer::looping::{LoopConfig, LoopStop, Task, run_agent};
use fixer::search::search;
use fixer::view::view_file;

#[derive(Parser)]
#[command(
    name = "fixer",
    version,
    about = "Search, view and edit a repository until a bug is fixed"
)]
struct Cli {
    /// Config file (defaults apply when it does not exist).
    #[arg(long, global = true, default_value = "fixer.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent loop until it submits or runs out of steps.
    Run {
        /// Working copy to fix (a git checkout).
        #[arg(long)]
        workspace: PathBuf,
        /// File holding the problem statement.
        #[arg(long)]
        problem: PathBuf,
        /// File holding hints for the agent.
        #[arg(long)]
        hints: Option<PathBuf>,
        /// Where step logs and oracle calls are written.
        #[arg(long, default_value = ".fixer")]
        state_dir: PathBuf,
        /// Override `max_steps` from the config.
        #[arg(long)]
        max_steps: Option<u32>,
        /// Run actions without asking the evaluator first.
        #[arg(long)]
        no_evaluate: bool,
    },
    /// Search file contents and names with a regex.
    Search {
        #[arg(long, default_value = ".")]
        workspace: PathBuf,
        regex: String,
    },
    /// Show a file around a line, with its outline.
    View {
        #[arg(long, default_value = ".")]
        workspace: PathBuf,
        file: String,
        #[arg(long, default_value_t = 1)]
        line: usize,
        #[arg(long, default_value_t = 100)]
        before: usize,
        #[arg(long, default_value_t = 100)]
        after: usize,
    },
}

fn main() {
    logging::init("warn");
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    match cli.command {
        Command::Run {
            workspace,
            problem,
            hints,
            state_dir,
            max_steps,
            no_evaluate,
        } => {
            if let Some(max_steps) = max_steps {
                config.max_steps = max_steps;
            }
            if no_evaluate {
                config.evaluate_actions = false;
            }
            config.validate()?;
            cmd_run(&config, &workspace, &problem, hints.as_deref(), &state_dir)
        }
        Command::Search { workspace, regex } => {
            println!("{}", search(&Workspace::new(workspace), &regex, &config.search));
            Ok(exit_codes::OK)
        }
        Command::View {
            workspace,
            file,
            line,
            before,
            after,
        } => {
            let request = ViewFile {
                file_path: file,
                cursor_line: line,
                before,
                after,
            };
            println!("{}", view_file(&Workspace::new(workspace), &request, &config.view));
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_run(
    config: &FixerConfig,
    workspace_dir: &Path,
    problem_path: &Path,
    hints_path: Option<&Path>,
    state_dir: &Path,
) -> Result<i32> {
    let problem = fs::read_to_string(problem_path)
        .with_context(|| format!("read problem {}", problem_path.display()))?;
    let hints = hints_path
        .map(|path| fs::read_to_string(path).with_context(|| format!("read hints {}", path.display())))
        .transpose()?;

    let workspace = Workspace::new(workspace_dir).excluding(state_dir);
    let git = Git::new(workspace_dir);
    let checker = CommandChecker::from_config(&config.lint);
    let oracle = ExecOracle::new(CodexExecutor::from_config(&config.oracle), &config.oracle, state_dir)?;
    let evaluator: Option<&dyn ActionEvaluator> = if config.evaluate_actions {
        Some(&oracle)
    } else {
        None
    };

    let toolbox = Toolbox {
        workspace: &workspace,
        edits: EditPipeline {
            workspace: &workspace,
            rewriter: &oracle,
            checker: &checker,
            vcs: &git,
            config: &config.edit,
        },
        search: &config.search,
        view: &config.view,
    };
    let loop_config = LoopConfig {
        max_steps: config.max_steps,
        state_dir: Some(state_dir.to_path_buf()),
    };
    let mut trajectory = Trajectory::new();
    let outcome = run_agent(
        Task {
            problem: &problem,
            hints: hints.as_deref(),
        },
        &oracle,
        evaluator,
        &toolbox,
        &loop_config,
        &mut trajectory,
        |report| {
            let marker = if report.gated { " (rejected)" } else { "" };
            eprintln!("[step {}]{marker} {}", report.step, report.action.kind);
        },
    )?;

    match outcome.stop {
        LoopStop::Submitted { .. } => {
            print!("{}", git.diff()?);
            Ok(exit_codes::OK)
        }
        LoopStop::Exhausted { max_steps } => {
            eprintln!("Failed to solve the problem in {max_steps} steps.");
            Ok(exit_codes::EXHAUSTED)
        }
    }
}
