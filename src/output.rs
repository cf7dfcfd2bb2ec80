#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Terminal output for grading sessions: colored chrome around rubric items,
//! plus the operator-input boundary used when a check declines to autograde.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::{grades::GradeRecord, rubric::RubricItem};

/// Width of the horizontal rules framing rubric items.
const RULE_WIDTH: usize = 85;

/// Prints the session intro banner.
pub fn intro(submitter: &str, hw: &str, code: &str) {
    println!(
        "{}",
        format!("=== grading {hw} [{code}] for {submitter} ===")
            .cyan()
            .bold()
    );
}

/// Prints a single horizontal rule.
pub fn rule() {
    println!("{}", "-".repeat(RULE_WIDTH));
}

/// Prints a double horizontal rule.
pub fn double_rule() {
    println!("{}", "=".repeat(RULE_WIDTH));
}

/// Prints the one-line header for a rubric item, noting deductive items.
pub fn headerline(item: &RubricItem) {
    let mut header = format!("Grading {}", item.code());
    if let Some(pool) = item.deduct_from() {
        header.push_str(&format!(" ({pool}p, deductive)"));
    }
    println!("{}", header.green());
}

/// Prints the full framed header for a rubric item: rules, the header line,
/// and every subitem's points and description.
pub fn item_header(item: &RubricItem) {
    double_rule();
    headerline(item);
    for (i, subitem) in item.subitems().iter().enumerate() {
        subitem_line(&item.subitem_code(i + 1), subitem.points, &subitem.description);
    }
    double_rule();
}

/// Prints one subitem's code, points, and description.
pub fn subitem_line(code: &str, points: i64, description: &str) {
    println!("{}", format!("{code} ({points}p): {description}").magenta());
}

/// Shows a previously recorded grade for a subitem, or optionally warns that
/// none exists yet.
pub fn subitem_grade(code: &str, record: Option<&GradeRecord>, warn: bool) {
    match record {
        Some(record) => println!(
            "{}",
            format!(
                "[ ({code}) Previous Grade: awarded={} comments='{}' ]",
                record.award, record.comments
            )
            .green()
        ),
        None if warn => println!("{}", format!("[ {code} hasn't been graded yet ]").yellow()),
        None => {}
    }
}

/// Reports that an already-graded item is being skipped.
pub fn skip_notice(code: &str) {
    println!("{}", format!("[ {code} has been graded, skipping... ]").yellow());
}

/// Reports a recovered per-item check failure.
pub fn check_failure(code: &str, err: &anyhow::Error) {
    println!("{}", format!("\n[ {code} check failed: {err:#} ]").red());
}

/// Reports that the session is shutting down after an interrupt.
pub fn interrupt_notice() {
    println!("{}", "\n[ interrupted, cleaning up... ]".red());
}

/// The operator-input boundary. The grading session only needs "no automated
/// result was produced, ask the operator"; implementations decide how.
pub trait Prompt {
    /// Asks whether a subitem's points should be awarded.
    fn award(&mut self, code: &str, points: i64, description: &str) -> Result<bool>;

    /// Asks for comments on a subitem.
    fn comments(&mut self, code: &str) -> Result<String>;
}

/// Interactive prompting over stdin/stdout. EOF on a prompt re-asks rather
/// than aborting, so a stray ^D never loses a half-graded item.
pub struct TerminalPrompt;

impl TerminalPrompt {
    /// Reads one line from stdin; `None` signals EOF.
    fn read_line() -> Result<Option<String>> {
        let mut line = String::new();
        let n = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("could not read operator input")?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Prints a colored prompt without a trailing newline.
    fn show(prompt: &str) -> Result<()> {
        print!("{}", prompt.blue());
        std::io::stdout().flush().context("could not flush stdout")
    }
}

impl Prompt for TerminalPrompt {
    fn award(&mut self, _code: &str, _points: i64, _description: &str) -> Result<bool> {
        loop {
            Self::show("Apply? [y/n]: ")?;
            match Self::read_line()? {
                None => println!("^D"),
                Some(answer) => match answer.to_lowercase().as_str() {
                    "y" => return Ok(true),
                    "n" => return Ok(false),
                    _ => {}
                },
            }
        }
    }

    fn comments(&mut self, _code: &str) -> Result<String> {
        loop {
            Self::show("Comments: ")?;
            match Self::read_line()? {
                None => println!("^D"),
                Some(comments) => return Ok(comments),
            }
        }
    }
}
