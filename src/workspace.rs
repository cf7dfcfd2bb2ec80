#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The on-disk grading workspace layout.
//!
//! ```text
//! ~/.local/share/tagrade/
//! |_ hwN                <---- homework workspace
//!    |_ rubric.json
//!    |_ grades.json
//!    |_ deadline.txt
//!    |_ hwN             <---- submission directory
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable overriding the workspace data directory.
pub const DATA_DIR_ENV: &str = "TAGRADE_DATA_DIR";

/// Locates per-homework workspaces and the well-known files inside them.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Root directory containing one subdirectory per homework.
    data_dir: PathBuf,
}

impl Workspace {
    /// Builds a workspace from `TAGRADE_DATA_DIR`, falling back to
    /// `$HOME/.local/share/tagrade`. A missing override degrades to the
    /// default with a printed notice rather than failing.
    pub fn from_env() -> Self {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return Self {
                data_dir: PathBuf::from(dir),
            };
        }
        let data_dir = match std::env::var("HOME") {
            Ok(home) => Path::new(&home).join(".local/share/tagrade"),
            Err(_) => {
                tracing::warn!("no $HOME set, using ./tagrade-data as the grading workspace");
                PathBuf::from("tagrade-data")
            }
        };
        Self { data_dir }
    }

    /// Builds a workspace rooted at an explicit directory.
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the workspace root.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Lists the homework directories present in the workspace, skipping
    /// hidden entries.
    pub fn homework_names(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.data_dir)
            .with_context(|| format!("could not list workspace {}", self.data_dir.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.context("could not read workspace entry")?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Returns the workspace directory for one homework.
    pub fn homework_dir(&self, hw: &str) -> PathBuf {
        self.data_dir.join(hw)
    }

    /// Returns the path of a homework's rubric description file.
    pub fn rubric_path(&self, hw: &str, rubric_file: &str) -> PathBuf {
        self.homework_dir(hw).join(rubric_file)
    }

    /// Returns the path of a homework's grade store file.
    pub fn grades_path(&self, hw: &str) -> PathBuf {
        self.homework_dir(hw).join("grades.json")
    }

    /// Returns the path of a homework's deadline file.
    pub fn deadline_path(&self, hw: &str) -> PathBuf {
        self.homework_dir(hw).join("deadline.txt")
    }

    /// Returns the path of a homework's submission directory.
    pub fn submission_dir(&self, hw: &str) -> PathBuf {
        self.homework_dir(hw).join(hw)
    }
}
