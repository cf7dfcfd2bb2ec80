//! # tagrade
//!
//! A rubric-driven grading session tool for programming-course homework: it
//! loads a per-assignment rubric, runs per-item checks (automated or
//! interactive), records awarded points and comments durably and
//! idempotently, and determines whether a submission was late.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// The per-homework collaborator boundary and its registry
pub mod assignment;
/// The check boundary: testers, pretesters, and their registry
pub mod check;
/// Durable award/comment state per submitter
pub mod grades;
/// Late-submission determination
pub mod late;
/// Colored terminal output and operator prompting
pub mod output;
/// The rubric data model and scope resolution
pub mod rubric;
/// The grading session controller
pub mod session;
/// The on-disk grading workspace layout
pub mod workspace;

pub use assignment::{Assignment, AssignmentRegistry, GenericAssignment};
pub use check::{AutoGrade, CheckOutcome, CheckSet};
pub use grades::{GradeRecord, GradeStore, StoreError};
pub use rubric::{Rubric, RubricError, Scope, ScopeError};
pub use session::{RunMode, Session};
pub use workspace::Workspace;
