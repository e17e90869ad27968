//! Problematic-words report: one key per line, sorted, no payload

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use tracing::info;

use super::{write_atomically, OutputError, OutputResult};
use crate::word::Key;

/// Write the report, replacing any previous one
///
/// Always writes a file, even when there is nothing to report. Returns the
/// number of keys written.
pub fn write_problematic_report(path: &Path, problematic: &BTreeSet<Key>) -> OutputResult<usize> {
    write_atomically(path, |w| {
        for key in problematic {
            writeln!(w, "{key}").map_err(|e| OutputError::IoError(e.to_string()))?;
        }
        Ok(())
    })?;

    info!(path = %path.display(), count = problematic.len(), "Problematic words report written");
    Ok(problematic.len())
}
