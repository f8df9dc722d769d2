//! Release identification by archive content checksums
//!
//! The 7z backend fingerprints an archive by the CRC32 values recorded for its
//! entries and hands them to a [`ReleaseLookup`]. A hit is only logged; it
//! never changes how the archive is extracted.

use crate::types::ArchiveEntry;
use std::collections::HashSet;

/// Looks up a known release from a set of entry checksums
///
/// Checksums are uppercase hexadecimal CRC32 strings without leading zeros
/// (e.g. `"1A2B3C"`).
pub trait ReleaseLookup: Send + Sync {
    /// Return the release identifier matching these checksums, if any
    fn lookup_identifier(&self, crcs: &HashSet<String>) -> Option<i64>;
}

impl<F> ReleaseLookup for F
where
    F: Fn(&HashSet<String>) -> Option<i64> + Send + Sync,
{
    fn lookup_identifier(&self, crcs: &HashSet<String>) -> Option<i64> {
        self(crcs)
    }
}

/// Lookup that never finds anything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpReleaseLookup;

impl ReleaseLookup for NoOpReleaseLookup {
    fn lookup_identifier(&self, _crcs: &HashSet<String>) -> Option<i64> {
        None
    }
}

/// Checksum set of an archive's entries, skipping missing and zero CRCs
pub fn crc_fingerprint(entries: &[ArchiveEntry]) -> HashSet<String> {
    entries
        .iter()
        .filter_map(|entry| entry.crc)
        .filter(|&crc| crc != 0)
        .map(|crc| format!("{:X}", crc))
        .collect()
}
