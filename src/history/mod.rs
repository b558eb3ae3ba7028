// Session history log
// Bounded, best-effort record of every file processed, persisted across
// process restarts

#![allow(dead_code)]

pub mod logger;

pub use logger::{HistoryEntry, HistoryError, SessionHistory};
