use sha2::{Digest, Sha256};

use crate::domain::value::RowMap;
use crate::domain::value_objects::Fingerprint;

/// SHA-256 over a table's rows, independent of row order.
///
/// Every row is serialised to compact JSON (columns already sorted by
/// `RowMap`), the row strings are sorted, then fed to the hasher separated by
/// `\n`. An empty table hashes the empty input.
pub fn fingerprint(rows: &[RowMap]) -> Fingerprint {
    let mut encoded: Vec<String> = rows
        .iter()
        .map(|row| serde_json::to_string(row).unwrap_or_default())
        .collect();
    encoded.sort_unstable();

    let mut hasher = Sha256::new();
    for (i, line) in encoded.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(line.as_bytes());
    }
    Fingerprint(format!("{:x}", hasher.finalize()))
}
