//! Work log.
//!
//! Every stage of a pipeline run records what it decided — parameters,
//! fallbacks, clamps — as a sequenced, timestamped entry. The log is
//! carried inside the pipeline result so callers can render or archive
//! it; nothing is written to stdout by the core.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A single log entry representing one stage decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkLogEntry {
    /// Sequential operation number (1-based).
    pub sequence: usize,
    pub timestamp: DateTime<Local>,
    /// Stage name, e.g. "restoration".
    pub stage: String,
    /// What was decided or computed.
    pub detail: String,
}

impl WorkLogEntry {
    /// Format as a human-readable text line.
    pub fn to_text(&self) -> String {
        format!(
            "[{:03}] {} | {} | {}",
            self.sequence,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.stage,
            self.detail
        )
    }
}

/// The ordered record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkLog {
    pub session_id: String,
    pub session_start: DateTime<Local>,
    pub software_version: String,
    pub entries: Vec<WorkLogEntry>,
    /// Non-fatal findings accumulated during the run.
    pub warnings: Vec<String>,
}

impl WorkLog {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            session_start: Local::now(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            entries: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record one stage decision.
    pub fn add_entry(&mut self, stage: &str, detail: &str) {
        let seq = self.entries.len() + 1;
        self.entries.push(WorkLogEntry {
            sequence: seq,
            timestamp: Local::now(),
            stage: stage.to_string(),
            detail: detail.to_string(),
        });
        log::info!("[{:03}] {} — {}", seq, stage, detail);
    }

    /// Record a non-fatal finding.
    pub fn warn(&mut self, message: &str) {
        log::warn!("{}", message);
        self.warnings.push(message.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export as human-readable text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("═══════════════════════════════════════════════════════════════\n");
        out.push_str("  Track Alignment Work Log\n");
        out.push_str("═══════════════════════════════════════════════════════════════\n");
        out.push_str(&format!("  Session ID:  {}\n", self.session_id));
        out.push_str(&format!(
            "  Started:     {}\n",
            self.session_start.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("  Software:    trackalign v{}\n", self.software_version));
        out.push_str(&format!("  Operations:  {}\n", self.entries.len()));
        out.push_str("───────────────────────────────────────────────────────────────\n\n");

        for entry in &self.entries {
            out.push_str(&entry.to_text());
            out.push('\n');
        }

        if !self.warnings.is_empty() {
            out.push_str("\n  Warnings:\n");
            for w in &self.warnings {
                out.push_str(&format!("  - {}\n", w));
            }
        }
        out
    }

    /// Export as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("JSON error: {}", e))
    }
}

impl Default for WorkLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_sequenced() {
        let mut log = WorkLog::new();
        assert!(log.is_empty());

        log.add_entry("restoration", "band 6-40 m, N=400");
        log.add_entry("plan", "zero-point spline, 19 crossings");
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries[0].sequence, 1);
        assert_eq!(log.entries[1].sequence, 2);
    }

    #[test]
    fn warnings_accumulate() {
        let mut log = WorkLog::new();
        log.warn("constraint enforcement did not converge");
        log.warn("capacity limited on 12% of samples");
        assert_eq!(log.warnings.len(), 2);
    }

    #[test]
    fn text_export_lists_operations() {
        let mut log = WorkLog::new();
        log.add_entry("restoration", "band 6-40 m");
        log.warn("demo warning");
        let text = log.to_text();
        assert!(text.contains("restoration"));
        assert!(text.contains("band 6-40 m"));
        assert!(text.contains("demo warning"));
    }

    #[test]
    fn json_roundtrip() {
        let mut log = WorkLog::new();
        log.add_entry("versine", "chords [10, 20, 40] m");
        let json = log.to_json();
        let parsed: WorkLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].stage, "versine");
    }
}
