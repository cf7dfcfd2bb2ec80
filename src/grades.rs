#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The grade store: a durable mapping from (submitter, subitem code) to
//! award/comment records, flushed atomically after every batch of awards.

use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tabled::{
    Table, Tabled,
    settings::{Panel, Style},
};
use thiserror::Error;

use crate::rubric::{Rubric, RubricItem, Scope};

/// An error raised by the grade store. Corrupt persisted state is surfaced
/// verbatim rather than silently reset, to protect prior grading work.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The grade store file exists but could not be read.
    #[error("could not read grade store at {path}")]
    Read {
        /// Path to the store file.
        path:   PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The grade store file exists but does not parse.
    #[error("grade store at {path} is corrupt: {source}")]
    Corrupt {
        /// Path to the store file.
        path:   PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
    /// The grade store could not be flushed back to disk.
    #[error("could not write grade store at {path}")]
    Write {
        /// Path to the store file.
        path:   PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// The award state for one subitem. Absence of a record (not presence with
/// empty fields) is the only "ungraded" signal.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct GradeRecord {
    /// Whether the subitem's points were awarded.
    pub award:    bool,
    /// Grader comments for the subitem.
    pub comments: String,
}

/// Everything recorded for one submitter: per-subitem records plus the
/// monotonic late flag.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionGrades {
    /// True once any graded item's governing commit was found past deadline.
    /// Never cleared within a session.
    #[serde(default)]
    pub late:   bool,
    /// Subitem code -> award record.
    #[serde(default)]
    pub scores: BTreeMap<String, GradeRecord>,
}

/// One row of the human-readable grade dump.
#[derive(Tabled)]
struct DumpRow {
    /// Rubric item code.
    #[tabled(rename = "Item")]
    item:   String,
    /// Earned/maximum points for the item.
    #[tabled(rename = "Score")]
    score:  String,
    /// How many of the item's subitems have records.
    #[tabled(rename = "Graded")]
    graded: String,
}

/// Persistent grade state for one homework, opened against one submitter.
///
/// The store holds every submitter's records in memory and flushes them all
/// on [`GradeStore::synchronize`]; mutating accessors address the submitter
/// the store was opened with.
#[derive(Debug)]
pub struct GradeStore {
    /// Path of the backing JSON file.
    path:      PathBuf,
    /// The rubric, used for point aggregation in `dump` and `status`.
    rubric:    Rubric,
    /// The submitter this session mutates, when one was supplied.
    submitter: Option<String>,
    /// All submitters' recorded grades.
    all:       BTreeMap<String, SubmissionGrades>,
}

impl GradeStore {
    /// Opens the grade store, loading existing state if the file exists.
    ///
    /// A missing file starts an empty store; a submitter with no prior
    /// entries gets a fresh one. Corrupt JSON is fatal.
    pub fn open(
        path: impl Into<PathBuf>,
        rubric: &Rubric,
        submitter: Option<&str>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let all = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };

        let mut store = Self {
            path,
            rubric: rubric.clone(),
            submitter: submitter.map(str::to_string),
            all,
        };
        if let Some(name) = store.submitter.clone() {
            store.all.entry(name).or_default();
        }
        Ok(store)
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// True iff a record exists for the session submitter and this subitem.
    pub fn is_graded(&self, code: &str) -> bool {
        self.current().is_some_and(|s| s.scores.contains_key(code))
    }

    /// Returns the session submitter's record for a subitem, if one exists.
    pub fn record(&self, code: &str) -> Option<&GradeRecord> {
        self.current().and_then(|s| s.scores.get(code))
    }

    /// Writes a subitem's award and comments, creating the record if absent.
    pub fn set(&mut self, code: &str, award: bool, comments: impl Into<String>) {
        match self.current_mut() {
            Some(grades) => {
                let record = grades.scores.entry(code.to_string()).or_default();
                record.award = award;
                record.comments = comments.into();
            }
            None => tracing::warn!("discarding grade for {code}: no submitter in session"),
        }
    }

    /// OR's `late` into the session submitter's late flag. Once set it stays
    /// set for the remainder of the session.
    pub fn set_late(&mut self, late: bool) {
        match self.current_mut() {
            Some(grades) => grades.late |= late,
            None => tracing::warn!("discarding late flag: no submitter in session"),
        }
    }

    /// Returns the session submitter's late flag.
    pub fn late(&self) -> bool {
        self.current().is_some_and(|s| s.late)
    }

    /// Durably flushes the entire in-memory state for all submitters.
    ///
    /// Writes to a temporary file in the same directory and renames it over
    /// the store, so an interrupt mid-write never loses committed records.
    /// Safe to call repeatedly.
    pub fn synchronize(&self) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&self.all).map_err(|source| {
            StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("synchronized grade store at {}", self.path.display());
        Ok(())
    }

    /// Renders a human-readable summary of points earned per item and totals,
    /// optionally filtered by submitter and rubric scope.
    pub fn dump(&self, submitter: Option<&str>, scope: &Scope) -> String {
        let items = self.rubric.scope_items(scope);
        self.submitters(submitter)
            .iter()
            .map(|name| self.dump_one(name, &items))
            .join("\n\n")
    }

    /// True iff every in-scope subitem is graded for every in-scope
    /// submitter. This is the `--status` exit-code source.
    pub fn status(&self, submitter: Option<&str>, scope: &Scope) -> bool {
        let items = self.rubric.scope_items(scope);
        self.submitters(submitter).iter().all(|name| {
            items.iter().all(|item| {
                item.subitem_codes()
                    .iter()
                    .all(|code| self.graded_for(name, code))
            })
        })
    }

    /// Computes (earned, out-of, graded-subitems, total-subitems) for one
    /// submitter and item.
    ///
    /// Non-deductive items sum the points of awarded subitems; deductive
    /// items subtract awarded deductions from the starting pool. The result
    /// is deliberately unclamped, so deductive scores can go negative.
    pub fn item_score(&self, submitter: &str, item: &RubricItem) -> (i64, i64, usize, usize) {
        let mut awarded = 0;
        let mut graded = 0;
        for (i, subitem) in item.subitems().iter().enumerate() {
            let code = item.subitem_code(i + 1);
            if let Some(record) = self.all.get(submitter).and_then(|s| s.scores.get(&code)) {
                graded += 1;
                if record.award {
                    awarded += subitem.points;
                }
            }
        }
        let earned = match item.deduct_from() {
            Some(pool) => pool - awarded,
            None => awarded,
        };
        (earned, item.out_of(), graded, item.subitems().len())
    }

    /// The submitters a dump/status call covers: the filter if given, else
    /// every submitter with recorded state.
    fn submitters(&self, filter: Option<&str>) -> Vec<String> {
        match filter {
            Some(name) => vec![name.to_string()],
            None => self.all.keys().cloned().collect(),
        }
    }

    /// True iff a record exists for an arbitrary submitter and subitem.
    fn graded_for(&self, submitter: &str, code: &str) -> bool {
        self.all
            .get(submitter)
            .is_some_and(|s| s.scores.contains_key(code))
    }

    /// Renders the dump table for a single submitter.
    fn dump_one(&self, submitter: &str, items: &[&RubricItem]) -> String {
        let mut rows = Vec::with_capacity(items.len());
        let mut total_earned = 0;
        let mut total_out_of = 0;
        for item in items {
            let (earned, out_of, graded, total) = self.item_score(submitter, item);
            total_earned += earned;
            total_out_of += out_of;
            rows.push(DumpRow {
                item:   item.code().to_string(),
                score:  format!("{earned}/{out_of}"),
                graded: format!("{graded}/{total}"),
            });
        }

        let late = self
            .all
            .get(submitter)
            .is_some_and(|s| s.late);
        let header = if late {
            format!("Grades for {submitter} (LATE)")
        } else {
            format!("Grades for {submitter}")
        };

        Table::new(rows)
            .with(Panel::header(header))
            .with(Panel::footer(format!("Total: {total_earned}/{total_out_of}")))
            .with(Style::modern())
            .to_string()
    }

    /// The session submitter's grades, if a submitter was supplied.
    fn current(&self) -> Option<&SubmissionGrades> {
        self.submitter.as_ref().and_then(|name| self.all.get(name))
    }

    /// Mutable access to the session submitter's grades.
    fn current_mut(&mut self) -> Option<&mut SubmissionGrades> {
        let name = self.submitter.clone()?;
        Some(self.all.entry(name).or_default())
    }
}
