#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # tagrade
//!
//! Command-line driver for rubric-driven grading sessions: one operator,
//! one submitter, one rubric scope at a time.

use std::{
    io::{BufRead, Write},
    process::Command,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, Result, ensure};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use tagrade::{
    AssignmentRegistry, CheckSet, GenericAssignment, GradeStore, RunMode, Rubric, Session,
    Workspace,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Script modes, mutually exclusive on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptMode {
    /// Grade normally, skipping fully graded items.
    Grade,
    /// Do not skip previously graded items.
    Regrade,
    /// Dump grades and exit.
    DumpGrades,
    /// Report grading status through the exit code.
    Status,
    /// Drop into a shell to inspect the submission.
    Inspect,
}

/// Parsed command-line options.
#[derive(Debug, Clone)]
struct Opts {
    /// Homework to grade, prompted for when missing.
    hw:        Option<String>,
    /// Rubric code to grade: `all`, a table letter, or an item code.
    code:      String,
    /// Run mode for checks and prompting.
    mode:      RunMode,
    /// Script mode for this invocation.
    script:    ScriptMode,
    /// The student/group being graded.
    submitter: Option<String>,
}

/// Parses the command line.
fn options() -> Opts {
    let hw = short('w')
        .long("hw")
        .help("homework to grade")
        .argument::<String>("HW")
        .optional();

    let code = short('c')
        .long("code")
        .help("rubric item (e.g. A, B4) to grade; defaults to all")
        .argument::<String>("CODE")
        .fallback("all".to_string());

    let grade_only = short('g')
        .long("grade-only")
        .help("grade without running any tests")
        .req_flag(RunMode::GradeOnly);
    let test_only = short('t')
        .long("test-only")
        .help("run tests without grading")
        .req_flag(RunMode::TestOnly);
    let mode = construct!([grade_only, test_only]).fallback(RunMode::Normal);

    let regrade = short('r')
        .long("regrade")
        .help("do not skip previously graded items")
        .req_flag(ScriptMode::Regrade);
    let dump_grades = short('d')
        .long("dump-grades")
        .help("dump grades for this homework -- all if no submitter specified")
        .req_flag(ScriptMode::DumpGrades);
    let status = short('s')
        .long("status")
        .help("return grading status for this homework -- all if no submitter specified")
        .req_flag(ScriptMode::Status);
    let inspect = short('i')
        .long("inspect")
        .help("drop into shell to inspect submission")
        .req_flag(ScriptMode::Inspect);
    let script = construct!([regrade, dump_grades, status, inspect]).fallback(ScriptMode::Grade);

    let submitter = positional::<String>("SUBMITTER")
        .help("the name of student/group to grade")
        .optional();

    construct!(Opts {
        hw,
        code,
        mode,
        script,
        submitter
    })
    .to_options()
    .descr("tagrade: rubric-driven grading sessions")
    .run()
}

/// Prompts the operator to pick a homework from the registered assignments.
fn prompt_homework(registry: &AssignmentRegistry) -> Result<String> {
    let names = registry.names();
    ensure!(!names.is_empty(), "no homework directories found in the grading workspace");

    println!("known homeworks: {}", names.join(", "));
    print!("{}", "homework to grade: ".blue());
    std::io::stdout().flush().context("could not flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("could not read homework choice")?;
    Ok(line.trim().to_string())
}

/// Drops into an interactive shell inside the submission directory.
fn inspect(workspace: &Workspace, hw: &str) -> Result<()> {
    let mut dir = workspace.submission_dir(hw);
    if !dir.is_dir() {
        dir = workspace.homework_dir(hw);
    }

    println!("{}", "[ ^D/exit when done ]".red());
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "bash".to_string());
    Command::new(shell)
        .current_dir(&dir)
        .status()
        .with_context(|| format!("could not open a shell in {}", dir.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let Opts {
        hw,
        code,
        mode,
        script,
        submitter,
    } = options();

    let workspace = Workspace::from_env();
    let mut registry = AssignmentRegistry::new();
    for name in workspace.homework_names().unwrap_or_default() {
        registry.register(Box::new(GenericAssignment::new(name, &workspace)));
    }

    let hw = match hw {
        Some(hw) => hw,
        None => prompt_homework(&registry)?,
    };
    let mut assignment = registry
        .take(&hw)
        .with_context(|| format!("unsupported assignment: {hw}"))?;

    let rubric = Rubric::from_file(workspace.rubric_path(assignment.name(), assignment.rubric_file()))?;
    let scope = rubric.resolve_scope(&code)?;

    match script {
        ScriptMode::DumpGrades => {
            let store = GradeStore::open(
                workspace.grades_path(assignment.name()),
                &rubric,
                submitter.as_deref(),
            )?;
            println!("{}", store.dump(submitter.as_deref(), &scope));
            return Ok(());
        }
        ScriptMode::Status => {
            let store = GradeStore::open(
                workspace.grades_path(assignment.name()),
                &rubric,
                submitter.as_deref(),
            )?;
            let all_graded = store.status(submitter.as_deref(), &scope);
            // The one exit code with semantic meaning: 0 iff fully graded.
            std::process::exit(if all_graded { 0 } else { 1 });
        }
        ScriptMode::Inspect => return inspect(&workspace, assignment.name()),
        ScriptMode::Grade | ScriptMode::Regrade => {}
    }

    let submitter = submitter.context("unspecified student/team")?;
    let store = GradeStore::open(
        workspace.grades_path(assignment.name()),
        &rubric,
        Some(&submitter),
    )?;

    let mut checks = CheckSet::new();
    assignment.register_checks(&mut checks);
    assignment.setup()?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("could not install interrupt handler")?;

    let deadline_path = workspace.deadline_path(assignment.name());
    let mut session = Session::builder()
        .rubric(rubric)
        .store(store)
        .checks(checks)
        .assignment(assignment)
        .submitter(submitter.clone())
        .deadline_path(deadline_path)
        .mode(mode)
        .regrade(script == ScriptMode::Regrade)
        .cancel(cancel)
        .build();

    session.pregrade(&code)?;
    session.run(&code)?;

    println!(
        "{}",
        format!("\n[ Pretty-printing pts/comments for {submitter}... ]").magenta()
    );
    println!("{}", session.store().dump(Some(&submitter), &scope));
    session.cleanup();

    Ok(())
}
