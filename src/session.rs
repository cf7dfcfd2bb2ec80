#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The grading session controller: walks the requested rubric scope in
//! declaration order, deciding per item whether to skip, check, prompt, and
//! persist, without ever losing previously recorded grades.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, Result, bail, ensure};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::{
    assignment::Assignment,
    check::{AutoGrade, CheckOutcome, CheckSet},
    grades::GradeStore,
    late,
    output::{self, Prompt, TerminalPrompt},
    rubric::{Rubric, RubricItem},
};

/// How a session treats checks and prompting. The modes are mutually
/// exclusive on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Run checks, then prompt (or auto-apply) awards.
    #[default]
    Normal,
    /// Skip checks; award from rubric text and previously known grades only.
    GradeOnly,
    /// Run checks but never prompt or record; display stored grades only.
    TestOnly,
}

/// One grading session: a single operator grading a single submitter through
/// a single rubric scope.
///
/// Items move through `PENDING -> (SKIPPED | TESTED) -> AWARDED`; the grade
/// store is synchronized after every fully-awarded item, so an interrupt
/// never rolls back completed work.
#[derive(TypedBuilder)]
pub struct Session {
    /// The homework rubric, read-only for the session's lifetime.
    rubric:        Rubric,
    /// Durable award/comment state for this homework.
    store:         GradeStore,
    /// Programmatic checks registered by the assignment.
    #[builder(default)]
    checks:        CheckSet,
    /// The per-homework collaborator (setup, cleanup, version control).
    assignment:    Box<dyn Assignment>,
    /// Who is being graded.
    submitter:     String,
    /// Path of the homework's deadline file.
    deadline_path: PathBuf,
    /// Check/prompt behavior for this session.
    #[builder(default)]
    mode:          RunMode,
    /// When set, previously graded items are not skipped.
    #[builder(default)]
    regrade:       bool,
    /// Operator-input boundary; swapped out in tests.
    #[builder(default = { let p: Box<dyn Prompt> = Box::new(TerminalPrompt); p })]
    prompt:        Box<dyn Prompt>,
    /// Cooperative cancellation flag, set from the interrupt handler and
    /// polled at suspension points.
    #[builder(default)]
    cancel:        Arc<AtomicBool>,
    /// Artifacts gathered by pretesters, keyed by item code. Session-lifetime
    /// only; never flushed to durable storage.
    #[builder(default, setter(skip))]
    gradables:     HashMap<String, Value>,
}

impl Session {
    /// Runs the grading pass over the requested rubric scope.
    ///
    /// Scope validity is checked before any side effects; an unknown table or
    /// item code fails here.
    pub fn run(&mut self, scope_code: &str) -> Result<()> {
        self.pass(scope_code, false)
    }

    /// Runs the pregrade pass over the requested rubric scope, gathering
    /// pretester artifacts without prompting for or recording grades.
    pub fn pregrade(&mut self, scope_code: &str) -> Result<()> {
        self.pass(scope_code, true)
    }

    /// Walks the scope's items in declaration order for one pass.
    fn pass(&mut self, scope_code: &str, pregrade: bool) -> Result<()> {
        let scope = self.rubric.resolve_scope(scope_code)?;
        output::intro(&self.submitter, self.assignment.name(), scope_code);

        let items: Vec<RubricItem> = self
            .rubric
            .scope_items(&scope)
            .into_iter()
            .cloned()
            .collect();
        for item in &items {
            self.grade_item(item, pregrade)?;
        }
        Ok(())
    }

    /// Takes one rubric item through the session state machine.
    fn grade_item(&mut self, item: &RubricItem, pregrade: bool) -> Result<()> {
        self.check_cancelled()?;

        if self.should_skip(item) {
            output::skip_notice(item.code());
            return Ok(());
        }

        if pregrade {
            if self.mode != RunMode::GradeOnly
                && let Some(result) = self.checks.run_pretester(item.code())
            {
                match result {
                    Ok(artifact) => {
                        self.gradables.insert(item.code().to_string(), artifact);
                    }
                    Err(err) => output::check_failure(item.code(), &err),
                }
            }
            return Ok(());
        }

        let outcome = if self.mode == RunMode::GradeOnly {
            output::headerline(item);
            CheckOutcome::Manual
        } else {
            output::item_header(item);
            match self.checks.run_tester(item.code()) {
                Ok(outcome) => outcome,
                Err(err) => {
                    // Recovered locally: the item stays ungraded and the
                    // session moves on to the next one.
                    output::check_failure(item.code(), &err);
                    return Ok(());
                }
            }
        };

        if self.mode == RunMode::TestOnly {
            self.show_grades(item);
            return Ok(());
        }

        output::rule();
        match outcome {
            CheckOutcome::Auto(grades) => self.apply_autogrades(item, &grades)?,
            CheckOutcome::Manual => self.prompt_item(item)?,
        }
        self.store.synchronize()?;

        let timestamp = self
            .assignment
            .commit_timestamp()
            .with_context(|| format!("could not determine submission time for {}", self.submitter))?;
        if late::is_late(&self.deadline_path, &timestamp)? {
            // Once any part of the submission is late, the whole submission
            // is considered late.
            self.store.set_late(true);
            self.store.synchronize()?;
        }
        Ok(())
    }

    /// True when the item's every subitem already has a record and neither
    /// test-only nor regrade mode is set.
    fn should_skip(&self, item: &RubricItem) -> bool {
        self.mode != RunMode::TestOnly
            && !self.regrade
            && item
                .subitem_codes()
                .iter()
                .all(|code| self.store.is_graded(code))
    }

    /// Applies an autograde result to the store. The entry count must match
    /// the item's subitem count exactly; a mismatch is a fatal configuration
    /// error and nothing is written for the item.
    fn apply_autogrades(&mut self, item: &RubricItem, grades: &[AutoGrade]) -> Result<()> {
        ensure!(
            grades.len() == item.subitems().len(),
            "autogrades for {} have {} entries but the item has {} subitems",
            item.code(),
            grades.len(),
            item.subitems().len()
        );
        for (i, grade) in grades.iter().enumerate() {
            self.store
                .set(&item.subitem_code(i + 1), grade.award, grade.comments.clone());
        }
        Ok(())
    }

    /// Prompts the operator for each subitem's award and comments, in
    /// declared order.
    fn prompt_item(&mut self, item: &RubricItem) -> Result<()> {
        for (i, subitem) in item.subitems().iter().enumerate() {
            self.check_cancelled()?;
            let code = item.subitem_code(i + 1);
            output::subitem_line(&code, subitem.points, &subitem.description);
            output::subitem_grade(&code, self.store.record(&code), false);

            let award = self
                .prompt
                .award(&code, subitem.points, &subitem.description)?;
            let comments = self.prompt.comments(&code)?;
            self.store.set(&code, award, comments);
        }
        Ok(())
    }

    /// Displays stored grades for the item, warning about ungraded subitems.
    /// Used by test-only mode, which never prompts or records.
    fn show_grades(&self, item: &RubricItem) {
        for code in item.subitem_codes() {
            output::subitem_grade(&code, self.store.record(&code), true);
        }
    }

    /// Polls the cancellation flag; on observation runs the assignment's
    /// cleanup hook synchronously and ends the session. Grades already
    /// synchronized remain valid.
    fn check_cancelled(&mut self) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            output::interrupt_notice();
            self.assignment.cleanup();
            bail!("grading session interrupted");
        }
        Ok(())
    }

    /// Returns the artifact a pretester cached for an item, if any.
    pub fn gradable(&self, code: &str) -> Option<&Value> {
        self.gradables.get(code)
    }

    /// Read access to the session's grade store.
    pub fn store(&self) -> &GradeStore {
        &self.store
    }

    /// Runs the assignment's cleanup hook. Called at normal session end; the
    /// interrupt path invokes it on its own.
    pub fn cleanup(&mut self) {
        self.assignment.cleanup();
    }
}
