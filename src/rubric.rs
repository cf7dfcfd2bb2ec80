#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The rubric data model: tables of items of subitems, parsed from a
//! per-homework JSON description file.

use std::{collections::HashSet, path::PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Reserved top-level key that carries late-penalty policy data rather than a
/// gradable table. Its value is passed through untouched.
pub const LATE_PENALTY_KEY: &str = "late_penalty";

/// An error raised while loading a rubric description.
#[derive(Error, Debug)]
pub enum RubricError {
    /// The rubric file could not be read from disk.
    #[error("could not read rubric file {path}")]
    Io {
        /// Path to the rubric file.
        path:   PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The rubric description is not well-formed JSON.
    #[error("rubric description is not valid JSON")]
    Parse(#[from] serde_json::Error),
    /// The rubric description parsed, but a table entry is missing required
    /// fields or is internally inconsistent.
    #[error("rubric table {table}, item {item}: {reason}")]
    Config {
        /// The table key the offending entry lives under.
        table:  String,
        /// The item key of the offending entry.
        item:   String,
        /// What exactly is wrong with the entry.
        reason: String,
    },
}

/// An error raised when a requested rubric scope does not exist. Scope
/// validity is checked eagerly, before any grading side effects.
#[derive(Error, Debug)]
pub enum ScopeError {
    /// The requested table letter is not in the rubric.
    #[error("rubric has no table {0}")]
    UnknownTable(String),
    /// The requested item code is not in its table.
    #[error("rubric has no item {0}")]
    UnknownItem(String),
}

/// The smallest gradable unit: a point value and a description. Awards are
/// recorded per subitem as a boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subitem {
    /// Points this subitem is worth (a deduction for deductive items).
    pub points:      i64,
    /// Human-readable description shown while grading.
    pub description: String,
}

/// One gradable rubric item, e.g. `B1`, made up of ordered subitems
/// `B1.1`, `B1.2`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubricItem {
    /// Short identifier, unique within the whole rubric (e.g. `B1`).
    code:        String,
    /// When set, subitems deduct from this starting pool instead of
    /// accumulating from zero.
    deduct_from: Option<i64>,
    /// Ordered subitems; subitem N's code is `{code}.{N}`, 1-indexed.
    subitems:    Vec<Subitem>,
}

impl RubricItem {
    /// Returns the item code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the deduction pool, if this item is deductive.
    pub fn deduct_from(&self) -> Option<i64> {
        self.deduct_from
    }

    /// Returns the ordered subitems.
    pub fn subitems(&self) -> &[Subitem] {
        &self.subitems
    }

    /// Derives the code for the 1-indexed `index`th subitem.
    pub fn subitem_code(&self, index: usize) -> String {
        format!("{}.{}", self.code, index)
    }

    /// Derives every subitem code for this item, in declared order.
    pub fn subitem_codes(&self) -> Vec<String> {
        (1..=self.subitems.len())
            .map(|i| self.subitem_code(i))
            .collect()
    }

    /// The maximum number of points this item can award. For deductive items
    /// this is the starting pool.
    pub fn out_of(&self) -> i64 {
        match self.deduct_from {
            Some(pool) => pool,
            None => self.subitems.iter().map(|s| s.points).sum(),
        }
    }
}

/// One rubric table: an ordered collection of items under a single-letter
/// key. Iteration order is the source declaration order.
#[derive(Debug, Clone)]
pub struct RubricTable {
    /// The table key, a single uppercase letter.
    key:   String,
    /// Items in declaration order.
    items: Vec<RubricItem>,
}

impl RubricTable {
    /// Returns the table key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the table's items in declaration order.
    pub fn items(&self) -> &[RubricItem] {
        &self.items
    }

    /// Looks up an item by its exact code.
    pub fn item(&self, code: &str) -> Option<&RubricItem> {
        self.items.iter().find(|i| i.code == code)
    }
}

/// The scope of one grading pass: everything, one table, or one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every table except late-penalty configuration, in declaration order.
    All,
    /// Every item in one table, in declaration order.
    Table(String),
    /// A single item.
    Item(String),
}

/// A complete homework rubric: ordered gradable tables plus the optional
/// late-penalty policy value. Constructed once per session and read-only
/// thereafter.
#[derive(Debug, Clone)]
pub struct Rubric {
    /// Gradable tables in declaration order.
    tables:       Vec<RubricTable>,
    /// Raw late-penalty policy data, passed through untouched.
    late_penalty: Option<Value>,
}

impl Rubric {
    /// Reads and parses a rubric description file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, RubricError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|source| RubricError::Io { path, source })?;
        Self::load(&text)
    }

    /// Parses a rubric description into its in-memory form.
    ///
    /// The description maps table key -> item key -> `{name,
    /// points_per_subitem, desc_per_subitem, deducting_from?}`. The reserved
    /// `late_penalty` key is captured verbatim.
    pub fn load(description: &str) -> Result<Self, RubricError> {
        let root: Value = serde_json::from_str(description)?;
        let root = match root {
            Value::Object(map) => map,
            _ => {
                return Err(config_error("(root)", "-", "rubric root must be a JSON object"));
            }
        };

        let mut tables = Vec::new();
        let mut late_penalty = None;
        let mut seen_codes: HashSet<String> = HashSet::new();

        for (table_key, table_value) in root {
            if table_key == LATE_PENALTY_KEY {
                late_penalty = Some(table_value);
                continue;
            }

            let entries = table_value.as_object().ok_or_else(|| {
                config_error(&table_key, "", "table value must be a JSON object")
            })?;

            let mut items = Vec::new();
            for (item_key, entry) in entries {
                let item = parse_item(&table_key, item_key, entry)?;
                if !item.code.starts_with(&table_key) {
                    return Err(config_error(
                        &table_key,
                        item_key,
                        format!("item code {} does not belong to table {table_key}", item.code),
                    ));
                }
                if !seen_codes.insert(item.code.clone()) {
                    return Err(config_error(
                        &table_key,
                        item_key,
                        format!("duplicate item code {}", item.code),
                    ));
                }
                items.push(item);
            }

            tables.push(RubricTable {
                key: table_key,
                items,
            });
        }

        tracing::debug!("loaded rubric with {} gradable tables", tables.len());
        Ok(Self {
            tables,
            late_penalty,
        })
    }

    /// Returns the gradable tables in declaration order.
    pub fn tables(&self) -> &[RubricTable] {
        &self.tables
    }

    /// Looks up a table by its key.
    pub fn table(&self, key: &str) -> Option<&RubricTable> {
        self.tables.iter().find(|t| t.key == key)
    }

    /// Looks up an item anywhere in the rubric by its exact code.
    pub fn item(&self, code: &str) -> Option<&RubricItem> {
        self.tables.iter().find_map(|t| t.item(code))
    }

    /// Returns the raw late-penalty policy value, if the rubric carries one.
    pub fn late_penalty(&self) -> Option<&Value> {
        self.late_penalty.as_ref()
    }

    /// Interprets a requested rubric code as a grading scope.
    ///
    /// `all` selects every gradable table; a bare letter selects one table; a
    /// full code like `B4` selects one item. Input is case-insensitive and
    /// validated eagerly, before any grading begins.
    pub fn resolve_scope(&self, code: &str) -> Result<Scope, ScopeError> {
        let code = code.trim();
        if code.eq_ignore_ascii_case("all") {
            return Ok(Scope::All);
        }

        let canonical = code.to_uppercase();
        if canonical.chars().all(|c| c.is_ascii_alphabetic()) {
            if self.table(&canonical).is_none() {
                return Err(ScopeError::UnknownTable(canonical));
            }
            return Ok(Scope::Table(canonical));
        }

        let table_key = canonical.chars().take(1).collect::<String>();
        let table = self
            .table(&table_key)
            .ok_or_else(|| ScopeError::UnknownTable(table_key))?;
        if table.item(&canonical).is_none() {
            return Err(ScopeError::UnknownItem(canonical));
        }
        Ok(Scope::Item(canonical))
    }

    /// Returns the items selected by a scope, in table-then-item declaration
    /// order. The scope must have come from [`Rubric::resolve_scope`].
    pub fn scope_items(&self, scope: &Scope) -> Vec<&RubricItem> {
        match scope {
            Scope::All => self.tables.iter().flat_map(|t| t.items.iter()).collect(),
            Scope::Table(key) => self
                .table(key)
                .map(|t| t.items.iter().collect())
                .unwrap_or_default(),
            Scope::Item(code) => self.item(code).into_iter().collect(),
        }
    }
}

/// Builds a [`RubricError::Config`] with owned strings.
fn config_error(
    table: &str,
    item: &str,
    reason: impl Into<String>,
) -> RubricError {
    RubricError::Config {
        table:  table.to_string(),
        item:   item.to_string(),
        reason: reason.into(),
    }
}

/// Parses one item entry, validating required fields and the 1:1 alignment
/// between point values and descriptions.
fn parse_item(table_key: &str, item_key: &str, entry: &Value) -> Result<RubricItem, RubricError> {
    let entry = entry
        .as_object()
        .ok_or_else(|| config_error(table_key, item_key, "item entry must be a JSON object"))?;

    let code = entry
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| config_error(table_key, item_key, "missing required field `name`"))?
        .to_string();
    if code.is_empty() {
        return Err(config_error(table_key, item_key, "`name` must not be empty"));
    }

    let points = entry
        .get("points_per_subitem")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            config_error(table_key, item_key, "missing required field `points_per_subitem`")
        })?;
    let descs = entry
        .get("desc_per_subitem")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            config_error(table_key, item_key, "missing required field `desc_per_subitem`")
        })?;

    if points.len() != descs.len() {
        return Err(config_error(
            table_key,
            item_key,
            format!(
                "points_per_subitem has {} entries but desc_per_subitem has {}",
                points.len(),
                descs.len()
            ),
        ));
    }

    let deduct_from = match entry.get("deducting_from") {
        None => None,
        Some(v) => Some(v.as_i64().ok_or_else(|| {
            config_error(table_key, item_key, "`deducting_from` must be an integer")
        })?),
    };

    let mut subitems = Vec::with_capacity(points.len());
    for (pts, desc) in points.iter().zip(descs.iter()) {
        let pts = pts.as_i64().filter(|p| *p >= 0).ok_or_else(|| {
            config_error(table_key, item_key, "subitem points must be non-negative integers")
        })?;
        let desc = desc.as_str().ok_or_else(|| {
            config_error(table_key, item_key, "subitem descriptions must be strings")
        })?;
        subitems.push(Subitem {
            points:      pts,
            description: desc.to_string(),
        });
    }

    Ok(RubricItem {
        code,
        deduct_from,
        subitems,
    })
}
