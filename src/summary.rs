//! Input model for pre-aggregated alert summaries.
//!
//! The summary is produced upstream by the alert indexer and arrives as a single JSON document.
//! Several of its fields are JSON objects whose key order carries meaning (hour buckets are
//! displayed in the order they were written, categories keep their order as the tie-break for the
//! top-N table), so they are decoded into [`CountTable`] rather than a hash map.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading an [`AlertSummary`].
#[derive(Debug, Error)]
pub enum SummaryError {
    /// The summary file could not be opened or read.
    #[error("Failed to read alert summary {}", path.display())]
    Read {
        /// Location of the summary file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The summary file is not valid JSON or does not match the expected shape.
    #[error("Failed to parse alert summary {}", path.display())]
    Parse {
        /// Location of the summary file.
        path: PathBuf,
        /// Underlying decoding failure.
        source: serde_json::Error,
    },
    /// In-memory JSON did not match the expected shape.
    #[error("Failed to parse alert summary")]
    Json(#[from] serde_json::Error),
}

/// Aggregated alert statistics for one agent group.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AlertSummary {
    /// Identifier of the agent group the summary covers.
    pub group: String,
    /// Total number of alerts in the reporting window.
    pub total_alerts: u64,
    /// Alert counts keyed by severity level.
    pub alerts_by_level: LevelCounts,
    /// Alert counts keyed by rule category.
    pub alerts_by_category: CountTable,
    /// Alert counts keyed by MITRE ATT&CK tactic. May be empty.
    pub alerts_by_mitre: CountTable,
    /// Timing information for the reporting window.
    pub time_analysis: TimeAnalysis,
    /// Per-agent breakdown in display order.
    pub agents_overview: Vec<AgentOverview>,
}

impl AlertSummary {
    /// Parses a summary from a JSON string.
    pub fn from_json_str(input: &str) -> Result<Self, SummaryError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parses a summary from any reader yielding JSON.
    pub fn from_reader(reader: impl Read) -> Result<Self, SummaryError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Sum of the per-level counts.
    ///
    /// Upstream producers are expected to keep this equal to [`AlertSummary::total_alerts`], but
    /// nothing enforces it.
    pub fn level_total(&self) -> u64 {
        self.alerts_by_level.total()
    }
}

/// Timing information attached to a summary.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TimeAnalysis {
    /// Timestamp of the earliest alert, rendered verbatim.
    pub first_alert: String,
    /// Timestamp of the latest alert, rendered verbatim.
    pub last_alert: String,
    /// Alert counts keyed by hour label, in display order.
    pub alerts_by_hour: CountTable,
}

/// Summary of a single monitored agent.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AgentOverview {
    /// Display name of the agent.
    pub name: String,
    /// Number of alerts raised by the agent.
    pub total_alerts: u64,
    /// Highest severity level observed on the agent.
    pub highest_level: u32,
    /// Timestamp of the agent's most recent alert, rendered verbatim.
    pub last_alert: String,
    /// Categories observed on the agent, in display order.
    pub categories: Vec<String>,
}

/// Ordered `label -> count` table decoded from a JSON object.
///
/// Entries keep the order in which they appear in the source document. A repeated key keeps its
/// first position and takes the last value, matching how most JSON producers treat duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountTable {
    entries: Vec<(String, u64)>,
}

impl CountTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends or updates an entry and returns the updated table.
    pub fn with_entry(mut self, label: impl Into<String>, count: u64) -> Self {
        self.insert(label.into(), count);
        self
    }

    fn insert(&mut self, label: String, count: u64) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = count,
            None => self.entries.push((label, count)),
        }
    }

    /// Iterates over the entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.entries
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| *count).sum()
    }

    /// Returns the largest count, if any.
    pub fn max_count(&self) -> Option<u64> {
        self.entries.iter().map(|(_, count)| *count).max()
    }

    /// Returns up to `limit` entries ordered by descending count.
    ///
    /// The sort is stable, so entries with equal counts keep their document order.
    pub fn top(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }
}

impl<'de> Deserialize<'de> for CountTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CountTableVisitor;

        impl<'de> Visitor<'de> for CountTableVisitor {
            type Value = CountTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping labels to alert counts")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = CountTable {
                    entries: Vec::with_capacity(map.size_hint().unwrap_or(0)),
                };
                while let Some((label, count)) = map.next_entry::<String, u64>()? {
                    table.insert(label, count);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(CountTableVisitor)
    }
}

/// Ordered `severity level -> count` table.
///
/// JSON object keys are strings, so each key must parse as an unsigned integer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    entries: Vec<(u32, u64)>,
}

impl LevelCounts {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends or updates an entry and returns the updated table.
    pub fn with_level(mut self, level: u32, count: u64) -> Self {
        self.insert(level, count);
        self
    }

    fn insert(&mut self, level: u32, count: u64) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == level) {
            Some(entry) => entry.1 = count,
            None => self.entries.push((level, count)),
        }
    }

    /// Iterates over the entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.entries.iter().copied()
    }

    /// Returns the entries sorted by ascending level.
    pub fn ascending(&self) -> Vec<(u32, u64)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|(level, _)| *level);
        sorted
    }

    /// Returns the number of distinct levels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no levels are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| *count).sum()
    }
}

impl<'de> Deserialize<'de> for LevelCounts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LevelCountsVisitor;

        impl<'de> Visitor<'de> for LevelCountsVisitor {
            type Value = LevelCounts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping severity levels to alert counts")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = LevelCounts {
                    entries: Vec::with_capacity(map.size_hint().unwrap_or(0)),
                };
                while let Some((key, count)) = map.next_entry::<String, u64>()? {
                    let level = key.trim().parse::<u32>().map_err(|_| {
                        de::Error::invalid_value(
                            de::Unexpected::Str(&key),
                            &"a non-negative integer severity level",
                        )
                    })?;
                    table.insert(level, count);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(LevelCountsVisitor)
    }
}

/// Reads and parses the summary stored at `path`.
pub fn load_summary(path: impl AsRef<Path>) -> Result<AlertSummary, SummaryError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SummaryError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let summary: AlertSummary =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| SummaryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(
        "Loaded summary for group '{}' from {} ({} alerts, {} agents)",
        summary.group,
        path.display(),
        summary.total_alerts,
        summary.agents_overview.len()
    );

    let level_total = summary.level_total();
    if level_total != summary.total_alerts {
        warn!(
            "Summary for group '{}' reports {} alerts but its severity levels add up to {}",
            summary.group, summary.total_alerts, level_total
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "group": "web-servers",
        "total_alerts": 30,
        "alerts_by_level": {"3": 10, "7": 15, "12": 5},
        "alerts_by_category": {"syslog": 12, "sshd": 9, "web": 9},
        "alerts_by_mitre": {},
        "time_analysis": {
            "first_alert": "2024-05-01T00:12:00Z",
            "last_alert": "2024-05-01T23:40:00Z",
            "alerts_by_hour": {"23": 4, "00": 6, "01": 20}
        },
        "agents_overview": [
            {"name": "web-01", "total_alerts": 20, "highest_level": 12,
             "last_alert": "2024-05-01T23:40:00Z", "categories": ["web", "sshd"]},
            {"name": "web-02", "total_alerts": 10, "highest_level": 3,
             "last_alert": "2024-05-01T10:00:00Z", "categories": []}
        ]
    }"#;

    #[test]
    fn parses_sample_summary() {
        let summary = AlertSummary::from_json_str(SAMPLE).expect("sample parses");
        assert_eq!(summary.group, "web-servers");
        assert_eq!(summary.total_alerts, 30);
        assert_eq!(summary.level_total(), 30);
        assert!(summary.alerts_by_mitre.is_empty());
        assert_eq!(summary.agents_overview.len(), 2);
        assert!(summary.agents_overview[1].categories.is_empty());
    }

    #[test]
    fn hour_buckets_keep_document_order() {
        let summary = AlertSummary::from_json_str(SAMPLE).expect("sample parses");
        let hours: Vec<_> = summary
            .time_analysis
            .alerts_by_hour
            .iter()
            .map(|(label, _)| label)
            .collect();
        assert_eq!(hours, vec!["23", "00", "01"]);
    }

    #[test]
    fn level_keys_are_parsed_as_integers() {
        let summary = AlertSummary::from_json_str(SAMPLE).expect("sample parses");
        let levels: Vec<_> = summary.alerts_by_level.iter().collect();
        assert_eq!(levels, vec![(3, 10), (7, 15), (12, 5)]);
    }

    #[test]
    fn rejects_non_numeric_level() {
        let input = SAMPLE.replace(r#""12": 5"#, r#""critical": 5"#);
        let err = AlertSummary::from_json_str(&input).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn rejects_missing_keys() {
        let err = AlertSummary::from_json_str(r#"{"group": "g", "total_alerts": 1}"#)
            .unwrap_err();
        assert!(matches!(err, SummaryError::Json(_)));
    }

    #[test]
    fn duplicate_labels_keep_first_position() {
        let table: CountTable =
            serde_json::from_str(r#"{"a": 1, "b": 2, "a": 3}"#).expect("table parses");
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![("a", 3), ("b", 2)]);
    }

    #[test]
    fn top_selects_highest_counts() {
        let table = CountTable::new()
            .with_entry("five", 5)
            .with_entry("fifty", 50)
            .with_entry("twenty", 20)
            .with_entry("forty", 40)
            .with_entry("ten", 10)
            .with_entry("thirty", 30);

        let labels: Vec<_> = table.top(5).into_iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["fifty", "forty", "thirty", "twenty", "ten"]);
    }

    #[test]
    fn top_breaks_ties_by_document_order() {
        let table = CountTable::new()
            .with_entry("zeta", 3)
            .with_entry("alpha", 3)
            .with_entry("mid", 7);
        let labels: Vec<_> = table.top(5).into_iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["mid", "zeta", "alpha"]);
    }

    #[test]
    fn load_summary_reports_missing_file() {
        let err = load_summary("/definitely/not/here.json").unwrap_err();
        match err {
            SummaryError::Read { path, source } => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.json"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
