#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The boundary to homework-specific checks. A check is a zero-argument
//! callable bound to a rubric item code; it either autogrades the item's
//! subitems or declines, leaving the operator to grade interactively.

use std::collections::HashMap;

use anyhow::Result;
use serde_json::Value;

/// One autograded subitem: an award decision plus the comment to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoGrade {
    /// Whether the subitem's points are awarded (or, for deductive items,
    /// whether the deduction applies).
    pub award:    bool,
    /// Comment recorded alongside the award.
    pub comments: String,
}

impl AutoGrade {
    /// Convenience constructor.
    pub fn new(award: bool, comments: impl Into<String>) -> Self {
        Self {
            award,
            comments: comments.into(),
        }
    }
}

/// What a tester produced for one rubric item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// One entry per subitem, in declared subitem order. The entry count must
    /// match the item's subitem count exactly.
    Auto(Vec<AutoGrade>),
    /// No automated result was produced; the operator grades each subitem
    /// interactively.
    Manual,
}

/// A check bound to one rubric item.
pub type Tester = Box<dyn FnMut() -> Result<CheckOutcome>>;

/// A pregrade check bound to one rubric item, producing an artifact of any
/// JSON shape to cache for the later grading pass.
pub type Pretester = Box<dyn FnMut() -> Result<Value>>;

/// An explicit mapping from rubric item code to check callables, registered
/// after rubric load. Unregistered codes fall back to [`CheckOutcome::Manual`]
/// rather than erroring. Lookup is exact-match and case-sensitive.
#[derive(Default)]
pub struct CheckSet {
    /// Testers keyed by item code.
    testers:    HashMap<String, Tester>,
    /// Pretesters keyed by item code.
    pretesters: HashMap<String, Pretester>,
}

impl CheckSet {
    /// Creates an empty check set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the tester for an item code, replacing any prior binding.
    pub fn tester(
        &mut self,
        code: impl Into<String>,
        f: impl FnMut() -> Result<CheckOutcome> + 'static,
    ) -> &mut Self {
        self.testers.insert(code.into(), Box::new(f));
        self
    }

    /// Registers the pretester for an item code, replacing any prior binding.
    pub fn pretester(
        &mut self,
        code: impl Into<String>,
        f: impl FnMut() -> Result<Value> + 'static,
    ) -> &mut Self {
        self.pretesters.insert(code.into(), Box::new(f));
        self
    }

    /// True if a tester is registered for the code.
    pub fn has_tester(&self, code: &str) -> bool {
        self.testers.contains_key(code)
    }

    /// True if a pretester is registered for the code.
    pub fn has_pretester(&self, code: &str) -> bool {
        self.pretesters.contains_key(code)
    }

    /// Runs the tester registered for `code`. An unregistered code yields the
    /// interactive fallback.
    pub fn run_tester(&mut self, code: &str) -> Result<CheckOutcome> {
        match self.testers.get_mut(code) {
            Some(tester) => tester(),
            None => Ok(CheckOutcome::Manual),
        }
    }

    /// Runs the pretester registered for `code`, if any.
    pub fn run_pretester(&mut self, code: &str) -> Option<Result<Value>> {
        self.pretesters.get_mut(code).map(|pretester| pretester())
    }
}
