//! Ignore-list parsing and matching.
//!
//! ```text
//! # accepted risk until the rewrite lands
//! - key: "critical_path_no_tests:api:create_order"
//! - rule: missing_transition_handler
//!   file: app/orders.py
//! ```
//!
//! Entries start at a `-` line; `key`, `rule` and `file` values may be quoted.

use crate::finding::{Finding, FindingsReport};
use once_cell::sync::Lazy;
use regex::Regex;
use riskmap_collector::normalize_path;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

static LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\s*([a-z_]+)\s*:\s*(.+?)\s*$").expect("valid suppression regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuppressionSet {
    pub keys: HashSet<String>,
    pub rule_file_pairs: HashSet<(String, String)>,
}

impl SuppressionSet {
    /// Parse ignore-list text. Malformed lines and incomplete entries are
    /// skipped with a note naming `file_name`.
    pub fn parse(text: &str, file_name: &str) -> (Self, Vec<String>) {
        let mut notes = Vec::new();
        let mut entries: Vec<BTreeMap<String, String>> = Vec::new();
        let mut current: BTreeMap<String, String> = BTreeMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(caps) = LINE_RE.captures(line) else {
                notes.push(format!(
                    "Ignoring malformed suppression line {} in {file_name}.",
                    idx + 1
                ));
                continue;
            };
            if line.starts_with('-') && !current.is_empty() {
                entries.push(std::mem::take(&mut current));
            }
            current.insert(caps[1].to_string(), unquote(&caps[2]).to_string());
        }
        if !current.is_empty() {
            entries.push(current);
        }

        let mut set = SuppressionSet::default();
        for entry in entries {
            if let Some(key) = entry.get("key").filter(|k| !k.is_empty()) {
                set.keys.insert(key.clone());
                continue;
            }
            match (entry.get("rule"), entry.get("file")) {
                (Some(rule), Some(file)) if !rule.is_empty() && !file.is_empty() => {
                    set.rule_file_pairs
                        .insert((rule.clone(), normalize_path(file)));
                }
                _ => notes.push(format!(
                    "Ignoring suppression entry without key or rule+file in {file_name}."
                )),
            }
        }

        if !set.is_empty() {
            notes.push(format!(
                "Loaded suppressions from {file_name}: {} key(s), {} rule+file pair(s).",
                set.keys.len(),
                set.rule_file_pairs.len()
            ));
        }
        (set, notes)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.rule_file_pairs.is_empty()
    }

    pub fn is_suppressed(&self, finding: &Finding) -> bool {
        if self.keys.contains(&finding.suppression_key) {
            return true;
        }
        self.rule_file_pairs
            .contains(&(finding.rule_id.clone(), normalize_path(&finding.source_ref)))
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Load an ignore list. A missing path yields an empty set; an unreadable file
/// yields an empty set and a note.
pub fn load_suppressions(path: Option<&Path>) -> (SuppressionSet, Vec<String>) {
    let Some(path) = path.filter(|p| p.is_file()) else {
        return (SuppressionSet::default(), Vec::new());
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "suppressions".to_string());

    match std::fs::read_to_string(path) {
        Ok(text) => SuppressionSet::parse(&text, &file_name),
        Err(e) => {
            log::warn!("Failed to read suppression file {}: {e}", path.display());
            (
                SuppressionSet::default(),
                vec![format!("Ignoring unreadable suppression file {file_name}.")],
            )
        }
    }
}

/// Drop suppressed findings; returns the kept report and the number removed
pub fn apply_suppressions(
    report: &FindingsReport,
    suppressions: &SuppressionSet,
) -> (FindingsReport, usize) {
    let kept: Vec<Finding> = report
        .findings
        .iter()
        .filter(|f| !suppressions.is_suppressed(f))
        .cloned()
        .collect();
    let suppressed = report.findings.len() - kept.len();
    (
        FindingsReport::new(kept, report.generated_without_llm),
        suppressed,
    )
}
