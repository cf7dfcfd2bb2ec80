use std::{
    cell::Cell,
    collections::VecDeque,
    fs,
    path::PathBuf,
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tagrade::{
    assignment::Assignment,
    check::{AutoGrade, CheckOutcome, CheckSet},
    grades::GradeStore,
    output::Prompt,
    rubric::Rubric,
    session::{RunMode, Session},
};
use tempfile::TempDir;

const ON_TIME: &str = "2026-01-10T12:00:00-05:00";
const PAST_DEADLINE: &str = "2026-01-20T12:00:00-05:00";

/// A homework workspace on disk: rubric, deadline, and a spot for grades.
struct Fixture {
    dir:    TempDir,
    rubric: Rubric,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("deadline.txt"), "2026-01-15 23:59:59\n")
            .expect("write deadline");
        let rubric = Rubric::load(
            r#"{
                "A": {
                    "A1": {
                        "name": "A1",
                        "points_per_subitem": [2, 3],
                        "desc_per_subitem": ["first", "second"]
                    },
                    "A2": {
                        "name": "A2",
                        "points_per_subitem": [4],
                        "desc_per_subitem": ["third"]
                    }
                }
            }"#,
        )
        .expect("load rubric");
        Self { dir, rubric }
    }

    fn grades_path(&self) -> PathBuf {
        self.dir.path().join("grades.json")
    }

    fn deadline_path(&self) -> PathBuf {
        self.dir.path().join("deadline.txt")
    }

    fn store(&self) -> GradeStore {
        GradeStore::open(self.grades_path(), &self.rubric, Some("alice")).expect("open store")
    }
}

/// Collaborator stub with scripted commit timestamps and a cleanup counter.
struct StubAssignment {
    timestamps: VecDeque<String>,
    cleanups:   Rc<Cell<usize>>,
}

impl StubAssignment {
    fn on_time() -> Self {
        Self::with_timestamps([])
    }

    fn with_timestamps(timestamps: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            timestamps: timestamps.into_iter().map(str::to_string).collect(),
            cleanups:   Rc::new(Cell::new(0)),
        }
    }

    fn cleanup_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.cleanups)
    }
}

impl Assignment for StubAssignment {
    fn name(&self) -> &str {
        "hw1"
    }

    fn cleanup(&mut self) {
        self.cleanups.set(self.cleanups.get() + 1);
    }

    fn commit_timestamp(&mut self) -> Result<String> {
        Ok(self
            .timestamps
            .pop_front()
            .unwrap_or_else(|| ON_TIME.to_string()))
    }
}

/// Operator stub that answers prompts from scripted queues.
#[derive(Default)]
struct ScriptedPrompt {
    awards:   VecDeque<bool>,
    comments: VecDeque<String>,
}

impl ScriptedPrompt {
    fn new(
        awards: impl IntoIterator<Item = bool>,
        comments: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        Self {
            awards:   awards.into_iter().collect(),
            comments: comments.into_iter().map(str::to_string).collect(),
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn award(&mut self, code: &str, _points: i64, _description: &str) -> Result<bool> {
        self.awards
            .pop_front()
            .with_context(|| format!("unexpected award prompt for {code}"))
    }

    fn comments(&mut self, _code: &str) -> Result<String> {
        Ok(self.comments.pop_front().unwrap_or_default())
    }
}

/// A tester that counts its invocations before yielding a fixed outcome.
fn counting_tester(
    checks: &mut CheckSet,
    code: &str,
    outcome: CheckOutcome,
) -> Rc<Cell<usize>> {
    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    checks.tester(code, move || {
        counter.set(counter.get() + 1);
        Ok(outcome.clone())
    });
    runs
}

fn full_marks(n: usize) -> CheckOutcome {
    CheckOutcome::Auto(vec![AutoGrade::new(true, "looks right"); n])
}

fn session(fixture: &Fixture, checks: CheckSet, assignment: StubAssignment) -> Session {
    Session::builder()
        .rubric(fixture.rubric.clone())
        .store(fixture.store())
        .checks(checks)
        .assignment(Box::new(assignment))
        .submitter("alice".to_string())
        .deadline_path(fixture.deadline_path())
        .prompt(Box::new(ScriptedPrompt::default()))
        .build()
}

#[test]
fn autograde_results_are_recorded_and_persisted() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    checks.tester("A1", || {
        Ok(CheckOutcome::Auto(vec![
            AutoGrade::new(true, "works"),
            AutoGrade::new(false, "misses the edge case"),
        ]))
    });

    let mut session = session(&fixture, checks, StubAssignment::on_time());
    session.run("A1").expect("run");

    let store = fixture.store();
    assert!(store.record("A1.1").expect("A1.1").award);
    let second = store.record("A1.2").expect("A1.2");
    assert!(!second.award);
    assert_eq!(second.comments, "misses the edge case");
    assert!(!store.late());
}

#[test]
fn fully_graded_items_are_skipped_without_running_checks() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    counting_tester(&mut checks, "A1", full_marks(2));
    session(&fixture, checks, StubAssignment::on_time())
        .run("A1")
        .expect("first run");
    let before = fs::read(fixture.grades_path()).expect("read grades");

    let mut checks = CheckSet::new();
    let runs = counting_tester(&mut checks, "A1", full_marks(2));
    session(&fixture, checks, StubAssignment::on_time())
        .run("A1")
        .expect("second run");

    assert_eq!(runs.get(), 0);
    let after = fs::read(fixture.grades_path()).expect("read grades again");
    assert_eq!(before, after);
}

#[test]
fn regrade_mode_does_not_skip_graded_items() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    counting_tester(&mut checks, "A1", full_marks(2));
    session(&fixture, checks, StubAssignment::on_time())
        .run("A1")
        .expect("first run");

    let mut checks = CheckSet::new();
    let runs = counting_tester(&mut checks, "A1", full_marks(2));
    let mut second = Session::builder()
        .rubric(fixture.rubric.clone())
        .store(fixture.store())
        .checks(checks)
        .assignment(Box::new(StubAssignment::on_time()))
        .submitter("alice".to_string())
        .deadline_path(fixture.deadline_path())
        .regrade(true)
        .prompt(Box::new(ScriptedPrompt::default()))
        .build();
    second.run("A1").expect("regrade run");

    assert_eq!(runs.get(), 1);
}

#[test]
fn test_only_mode_runs_checks_but_records_nothing() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    let runs = counting_tester(&mut checks, "A1", full_marks(2));

    let mut session = Session::builder()
        .rubric(fixture.rubric.clone())
        .store(fixture.store())
        .checks(checks)
        .assignment(Box::new(StubAssignment::on_time()))
        .submitter("alice".to_string())
        .deadline_path(fixture.deadline_path())
        .mode(RunMode::TestOnly)
        .prompt(Box::new(ScriptedPrompt::default()))
        .build();
    session.run("A1").expect("run");

    assert_eq!(runs.get(), 1);
    assert!(!fixture.grades_path().exists());
}

#[test]
fn grade_only_mode_prompts_without_running_checks() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    let runs = counting_tester(&mut checks, "A1", full_marks(2));

    let mut session = Session::builder()
        .rubric(fixture.rubric.clone())
        .store(fixture.store())
        .checks(checks)
        .assignment(Box::new(StubAssignment::on_time()))
        .submitter("alice".to_string())
        .deadline_path(fixture.deadline_path())
        .mode(RunMode::GradeOnly)
        .prompt(Box::new(ScriptedPrompt::new([true, false], ["good", "needs work"])))
        .build();
    session.run("A1").expect("run");

    assert_eq!(runs.get(), 0);
    let store = fixture.store();
    assert!(store.record("A1.1").expect("A1.1").award);
    assert_eq!(store.record("A1.2").expect("A1.2").comments, "needs work");
}

#[test]
fn manual_fallback_prompts_for_unregistered_items() {
    let fixture = Fixture::new();
    let mut session = Session::builder()
        .rubric(fixture.rubric.clone())
        .store(fixture.store())
        .checks(CheckSet::new())
        .assignment(Box::new(StubAssignment::on_time()))
        .submitter("alice".to_string())
        .deadline_path(fixture.deadline_path())
        .prompt(Box::new(ScriptedPrompt::new([false, true], ["off by one", ""])))
        .build();
    session.run("A1").expect("run");

    let store = fixture.store();
    assert!(!store.record("A1.1").expect("A1.1").award);
    assert_eq!(store.record("A1.1").expect("A1.1").comments, "off by one");
    assert!(store.record("A1.2").expect("A1.2").award);
}

#[test]
fn misaligned_autogrades_are_fatal_and_write_nothing() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    checks.tester("A1", || {
        Ok(CheckOutcome::Auto(vec![AutoGrade::new(true, "only one entry")]))
    });

    let mut session = session(&fixture, checks, StubAssignment::on_time());
    let err = session.run("A1").expect_err("should fail");
    assert!(err.to_string().contains("subitems"));
    assert!(!fixture.grades_path().exists());
}

#[test]
fn failed_check_leaves_item_ungraded_and_session_continues() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    checks.tester("A1", || Err(anyhow!("submission does not build")));
    checks.tester("A2", || Ok(full_marks(1)));

    let mut session = session(&fixture, checks, StubAssignment::on_time());
    session.run("A").expect("run survives the failed check");

    let store = fixture.store();
    assert!(!store.is_graded("A1.1"));
    assert!(!store.is_graded("A1.2"));
    assert!(store.is_graded("A2.1"));
}

#[test]
fn late_flag_set_by_one_item_survives_later_on_time_items() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    checks.tester("A1", || Ok(full_marks(2)));
    checks.tester("A2", || Ok(full_marks(1)));

    let assignment = StubAssignment::with_timestamps([PAST_DEADLINE, ON_TIME]);
    let mut session = session(&fixture, checks, assignment);
    session.run("A").expect("run");

    assert!(fixture.store().late());
}

#[test]
fn unknown_scope_fails_before_any_side_effects() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    let runs = counting_tester(&mut checks, "A1", full_marks(2));

    let mut session = session(&fixture, checks, StubAssignment::on_time());
    session.run("Z9").expect_err("unknown scope");

    assert_eq!(runs.get(), 0);
    assert!(!fixture.grades_path().exists());
}

#[test]
fn pregrade_caches_artifacts_without_recording_grades() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    let runs = counting_tester(&mut checks, "A1", full_marks(2));
    checks.pretester("A1", || Ok(json!({ "built": true, "warnings": 2 })));

    let mut session = session(&fixture, checks, StubAssignment::on_time());
    session.pregrade("A1").expect("pregrade");

    assert_eq!(runs.get(), 0);
    assert_eq!(session.gradable("A1"), Some(&json!({ "built": true, "warnings": 2 })));
    assert!(session.gradable("A2").is_none());
    assert!(!fixture.grades_path().exists());
}

#[test]
fn interrupt_runs_cleanup_and_keeps_synchronized_grades() {
    let fixture = Fixture::new();
    let mut checks = CheckSet::new();
    counting_tester(&mut checks, "A1", full_marks(2));
    session(&fixture, checks, StubAssignment::on_time())
        .run("A1")
        .expect("first run");
    let before = fs::read(fixture.grades_path()).expect("read grades");

    let cancel = Arc::new(AtomicBool::new(true));
    let assignment = StubAssignment::on_time();
    let cleanups = assignment.cleanup_counter();
    let mut session = Session::builder()
        .rubric(fixture.rubric.clone())
        .store(fixture.store())
        .checks(CheckSet::new())
        .assignment(Box::new(assignment))
        .submitter("alice".to_string())
        .deadline_path(fixture.deadline_path())
        .regrade(true)
        .cancel(Arc::clone(&cancel))
        .prompt(Box::new(ScriptedPrompt::default()))
        .build();

    let err = session.run("all").expect_err("interrupted");
    assert!(err.to_string().contains("interrupted"));
    assert_eq!(cleanups.get(), 1);
    assert!(cancel.load(Ordering::SeqCst));

    let after = fs::read(fixture.grades_path()).expect("read grades again");
    assert_eq!(before, after);
}
