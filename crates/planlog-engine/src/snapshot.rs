//! Snapshot persistence codec
//!
//! Snapshots are stored as JSON. Loading resets every record's operation
//! tag to `add`, which tells the representation synchronizer to rebuild all
//! mirrors from scratch.

use crate::error::EngineError;
use planlog_model::{EditLog, EditType, Entry};
use tracing::debug;

/// Serialize a snapshot
///
/// # Errors
/// Returns error if serialization fails
pub fn encode(log: &EditLog) -> Result<String, EngineError> {
    Ok(serde_json::to_string(log)?)
}

/// Serialize a snapshot as indented JSON
///
/// # Errors
/// Returns error if serialization fails
pub fn encode_pretty(log: &EditLog) -> Result<String, EngineError> {
    Ok(serde_json::to_string_pretty(log)?)
}

/// Restore a snapshot
///
/// # Errors
/// Returns error if the input is not a valid snapshot
pub fn decode(json: &str) -> Result<EditLog, EngineError> {
    let log: EditLog = serde_json::from_str(json)?;
    let log = reset_edit_types(&log);
    debug!(entries = log.entries.len(), sequence = log.sequence, "restored snapshot");
    Ok(log)
}

/// Tag every scenario and layer as freshly added
#[must_use]
pub fn reset_edit_types(log: &EditLog) -> EditLog {
    let mut next = log.clone();
    for entry in next.entries.iter_mut() {
        match entry {
            Entry::Layer(layer) => layer.edit_type = EditType::Add,
            Entry::Scenario(scenario) => {
                scenario.edit_type = EditType::Add;
                for layer in scenario.layers.iter_mut() {
                    layer.edit_type = EditType::Add;
                }
            }
        }
    }
    next
}
