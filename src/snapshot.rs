use crate::discovery::EntityRecord;
use crate::error::{HarvestError, Result};
use crate::normalize::normalize_keys;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

fn snapshot_error(path: &Path, message: impl std::fmt::Display) -> HarvestError {
    HarvestError::Snapshot {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

/// Serializes `value` as pretty JSON and atomically replaces `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| snapshot_error(path, e))?;

    let json = serde_json::to_string_pretty(value).map_err(|e| snapshot_error(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| snapshot_error(path, e))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.write_all(b"\n"))
        .and_then(|_| tmp.flush())
        .map_err(|e| snapshot_error(path, e))?;
    tmp.persist(path).map_err(|e| snapshot_error(path, e.error))?;

    debug!(path = %path.display(), bytes = json.len(), "Wrote JSON");
    Ok(())
}

pub fn save_snapshot(path: &Path, records: &[EntityRecord]) -> Result<()> {
    write_json_atomic(path, records)?;
    info!(path = %path.display(), records = records.len(), "Snapshot saved");
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<Vec<EntityRecord>> {
    if !path.exists() {
        return Err(snapshot_error(path, "file not found"));
    }

    let content = fs::read_to_string(path).map_err(|e| snapshot_error(path, e))?;
    let records: Vec<EntityRecord> =
        serde_json::from_str(&content).map_err(|e| snapshot_error(path, e))?;

    info!(path = %path.display(), records = records.len(), "Snapshot loaded");
    Ok(records)
}

/// Writes the snapshot again with every key in camelCase ASCII form.
pub fn save_normalized(path: &Path, records: &[EntityRecord]) -> Result<()> {
    let value = serde_json::to_value(records).map_err(|e| snapshot_error(path, e))?;
    write_json_atomic(path, &normalize_keys(value))?;
    info!(path = %path.display(), "Normalized snapshot saved");
    Ok(())
}

/// Sorted unique non-empty values of one attribute.
pub fn distinct_values(records: &[EntityRecord], attribute: &str) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.display_name(attribute))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
