use std::cmp::Ordering;
use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use ext_sort::{ExternalChunk, ExternalSorterBuilder, LimitedBufferBuilder};
use ext_sort::ExternalSorter as ExtSorter;
use serde_derive::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::model::sample_record::SampleRecord;
use crate::utils::errors::ExtractError;

/**
 * Bounded-memory stable sort of SampleRecords by LocationKey.
 *
 * Spilling and k-way merging are delegated to ext_sort with a bincode-framed
 * run format; every record carries its intake sequence number so equal keys
 * resolve by arrival order regardless of run boundaries. Temporary runs live
 * in a scoped directory released on every exit path, and cancellation is
 * honored both while runs are written and on every read of the merged
 * stream.
 */
pub struct ExternalSorter {
    max_records_in_ram: usize,
    cancel: Arc<AtomicBool>,
}

impl ExternalSorter {
    pub fn new(max_records_in_ram: usize, cancel: Arc<AtomicBool>) -> ExternalSorter {
        ExternalSorter {
            max_records_in_ram: max_records_in_ram.max(1),
            cancel,
        }
    }

    /**
     * Consume `input` and return the fully sorted stream. The input is
     * drained completely before the first sorted record is available;
     * partial success is not possible.
     */
    pub fn sort_by_location<I>(self, input: I) -> Result<SortedRecords, ExtractError>
    where
        I: Iterator<Item = Result<SampleRecord, ExtractError>> + 'static,
    {
        let temp_dir = tempfile::Builder::new()
            .prefix("cohort-extract-sort")
            .tempdir()
            .map_err(ExtractError::SortSpillIo)?;

        let sorter: ExtSorter<SortEntry, ExtractError, LimitedBufferBuilder, BincodeChunk> =
            ExternalSorterBuilder::new()
                .with_tmp_dir(temp_dir.path())
                .with_buffer(LimitedBufferBuilder::new(self.max_records_in_ram, false))
                .build()
                .map_err(|e| {
                    ExtractError::SortSpillIo(io::Error::new(io::ErrorKind::Other, e.to_string()))
                })?;

        // the first upstream failure is parked here so its kind survives the
        // sorter's own error wrapping
        let pending = Arc::new(Mutex::new(None));
        let stash = Arc::clone(&pending);
        let cancel = Arc::clone(&self.cancel);
        let mut sequence: u64 = 0;
        let entries = input.map(move |item| match item {
            Ok(record) => {
                if cancel.load(AtomicOrdering::Relaxed) {
                    *stash.lock().unwrap() = Some(ExtractError::Cancelled);
                    return Err(ExtractError::Cancelled);
                }
                let entry = SortEntry {
                    location: record.location,
                    sequence,
                    record,
                };
                sequence += 1;
                Ok(entry)
            }
            Err(e) => {
                *stash.lock().unwrap() = Some(e);
                Err(ExtractError::ReadError("record stream failed".to_string()))
            }
        });

        let merged = match sorter.sort(entries) {
            Ok(merged) => merged,
            Err(e) => {
                if let Some(first) = pending.lock().unwrap().take() {
                    return Err(first);
                }
                return Err(ExtractError::SortSpillIo(io::Error::new(
                    io::ErrorKind::Other,
                    e.to_string(),
                )));
            }
        };

        Ok(SortedRecords {
            _temp_dir: temp_dir,
            cancel: self.cancel,
            merged: Box::new(merged),
        })
    }
}

/// Sort item: the packed location first, intake order second, so the merge
/// is stable across spilled runs.
#[derive(Debug, Serialize, Deserialize)]
struct SortEntry {
    location: u64,
    sequence: u64,
    record: SampleRecord,
}

impl Ord for SortEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.location, self.sequence).cmp(&(other.location, other.sequence))
    }
}

impl PartialOrd for SortEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortEntry {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location && self.sequence == other.sequence
    }
}

impl Eq for SortEntry {}

/// Run file codec for ext_sort: records framed back-to-back with bincode,
/// read until the chunk's byte limit is exhausted.
struct BincodeChunk {
    reader: io::Take<io::BufReader<fs::File>>,
}

impl ExternalChunk<SortEntry> for BincodeChunk {
    type SerializationError = bincode::Error;
    type DeserializationError = bincode::Error;

    fn new(reader: io::Take<io::BufReader<fs::File>>) -> Self {
        BincodeChunk { reader }
    }

    fn dump(
        chunk_writer: &mut io::BufWriter<fs::File>,
        items: impl IntoIterator<Item = SortEntry>,
    ) -> Result<(), Self::SerializationError> {
        for item in items {
            bincode::serialize_into(&mut *chunk_writer, &item)?;
        }
        Ok(())
    }
}

impl Iterator for BincodeChunk {
    type Item = Result<SortEntry, bincode::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.limit() == 0 {
            None
        } else {
            match bincode::deserialize_from(&mut self.reader) {
                Ok(entry) => Some(Ok(entry)),
                Err(e) => Some(Err(e)),
            }
        }
    }
}

/// Sorted output stream; owns the temp directory for the lifetime of the
/// merge and checks cancellation on every read.
pub struct SortedRecords {
    _temp_dir: TempDir,
    cancel: Arc<AtomicBool>,
    merged: Box<dyn Iterator<Item = Result<SortEntry, bincode::Error>>>,
}

impl Iterator for SortedRecords {
    type Item = Result<SampleRecord, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.load(AtomicOrdering::Relaxed) {
            return Some(Err(ExtractError::Cancelled));
        }
        match self.merged.next()? {
            Ok(entry) => Some(Ok(entry.record)),
            Err(e) => Some(Err(ExtractError::Codec(e))),
        }
    }
}
