//! Feedback flag records.
//!
//! Users can flag a reply under one of three fixed categories. Records are
//! appended to date-named JSONL files under the flag directory.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const FLAG_CATEGORIES: [&str; 3] = [
    "Incorrect / False Information",
    "Error Response (No Credits Left)",
    "Others",
];

pub fn is_valid_category(category: &str) -> bool {
    FLAG_CATEGORIES.contains(&category)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlagRecord {
    pub timestamp: String,
    pub session_id: String,
    pub category: String,
    pub message: String,
    pub reply: String,
}

pub struct FlagStore {
    dir: PathBuf,
}

impl FlagStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Default location: ~/.health-assistant/flags
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".health-assistant/flags")
    }

    fn file_for(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{date}-flags.jsonl"))
    }

    /// Append a flag record. Failures are logged, never raised.
    pub fn save(&self, record: &FlagRecord) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("Failed to create flag dir: {e}");
            return;
        }

        let date = Local::now().format("%Y-%m-%d").to_string();
        let path = self.file_for(&date);

        let mut file = match fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open flag file: {e}");
                return;
            }
        };

        match serde_json::to_string(record) {
            Ok(line) => {
                if let Err(e) = writeln!(file, "{line}") {
                    warn!("Failed to write flag record: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize flag record: {e}"),
        }
    }

    pub fn load(&self, date: &str) -> Vec<FlagRecord> {
        let path = self.file_for(date);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_fixed() {
        assert!(is_valid_category("Others"));
        assert!(is_valid_category("Incorrect / False Information"));
        assert!(!is_valid_category("Something else"));
    }

    #[test]
    fn records_round_trip_through_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlagStore::new(dir.path().to_path_buf());

        store.save(&FlagRecord {
            timestamp: now_timestamp(),
            session_id: "abc".into(),
            category: "Others".into(),
            message: "What is this?".into(),
            reply: "A lab report.".into(),
        });
        store.save(&FlagRecord {
            timestamp: now_timestamp(),
            session_id: "abc".into(),
            category: "Incorrect / False Information".into(),
            message: "Is it serious?".into(),
            reply: "Definitely not.".into(),
        });

        let date = Local::now().format("%Y-%m-%d").to_string();
        let records = store.load(&date);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, "Others");
        assert_eq!(records[1].reply, "Definitely not.");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlagStore::new(dir.path().to_path_buf());
        assert!(store.load("1999-01-01").is_empty());
    }
}
