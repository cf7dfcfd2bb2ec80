#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The per-homework collaborator boundary: homework-specific checks, setup
//! and cleanup, and version-control inspection live behind the [`Assignment`]
//! trait; sessions find collaborators through an explicit registry.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, bail};
use which::which;

use crate::{check::CheckSet, workspace::Workspace};

/// One homework's grading collaborator.
///
/// Implementations bind programmatic checks to rubric item codes, perform
/// submission setup/cleanup, and answer version-control queries. Everything
/// has a default so the simplest assignment is just a name.
pub trait Assignment {
    /// The canonical homework name (e.g. `hw3`).
    fn name(&self) -> &str;

    /// Names this assignment also answers to.
    fn aliases(&self) -> Vec<String> {
        vec![self.name().to_string()]
    }

    /// File name of the rubric description inside the homework workspace.
    fn rubric_file(&self) -> &str {
        "rubric.json"
    }

    /// Registers this homework's testers and pretesters by item code. Codes
    /// left unregistered fall back to interactive grading.
    fn register_checks(&mut self, _checks: &mut CheckSet) {}

    /// Performs submission setup (e.g. untar, checkout of a tag).
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Stops stray processes and undoes filesystem mutations left by checks.
    /// Runs at session end and when an interrupt is observed.
    fn cleanup(&mut self) {}

    /// The submission directory commits are inspected in, if any.
    fn submission_dir(&self) -> Option<&Path> {
        None
    }

    /// Returns the ISO-8601 timestamp of the submission's most recent commit.
    ///
    /// The default implementation asks git in the submission directory, the
    /// same query `git log -n 1 --format=%aI` answers on the command line.
    fn commit_timestamp(&mut self) -> Result<String> {
        let git = which("git").context("cannot find git on path")?;
        let mut cmd = Command::new(git);
        cmd.args(["log", "-n", "1", "--format=%aI"]);
        if let Some(dir) = self.submission_dir() {
            cmd.current_dir(dir);
        }

        let out = cmd.output().context("could not run git log")?;
        if !out.status.success() {
            bail!(
                "git log failed for {}: {}",
                self.name(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

/// A collaborator for any homework directory found in the workspace: no
/// programmatic checks (every item falls back to interactive grading) and a
/// git-based commit timestamp.
pub struct GenericAssignment {
    /// The homework name, matching its workspace directory.
    name:           String,
    /// The submission directory commits are inspected in.
    submission_dir: PathBuf,
}

impl GenericAssignment {
    /// Builds the generic collaborator for a homework in `workspace`.
    pub fn new(name: impl Into<String>, workspace: &Workspace) -> Self {
        let name = name.into();
        let submission_dir = workspace.submission_dir(&name);
        Self {
            name,
            submission_dir,
        }
    }
}

impl Assignment for GenericAssignment {
    fn name(&self) -> &str {
        &self.name
    }

    fn submission_dir(&self) -> Option<&Path> {
        Some(&self.submission_dir)
    }
}

/// An explicit registry of assignment collaborators, passed into session
/// construction instead of living as ambient global state.
#[derive(Default)]
pub struct AssignmentRegistry {
    /// Registered collaborators, in registration order.
    entries: Vec<Box<dyn Assignment>>,
}

impl AssignmentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a collaborator.
    pub fn register(&mut self, assignment: Box<dyn Assignment>) -> &mut Self {
        self.entries.push(assignment);
        self
    }

    /// The canonical names of every registered collaborator.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|a| a.name().to_string()).collect()
    }

    /// Removes and returns the collaborator answering to `name`
    /// (case-insensitive, aliases included).
    pub fn take(&mut self, name: &str) -> Option<Box<dyn Assignment>> {
        let idx = self.entries.iter().position(|a| {
            a.aliases()
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
        })?;
        Some(self.entries.remove(idx))
    }
}
