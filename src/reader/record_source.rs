use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::location::LocationKey;
use crate::model::sample_record::{CallState, SampleRecord};
use crate::utils::errors::ExtractError;

const MAX_OPEN_ATTEMPTS: u32 = 5;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Columns the decoder interprets; everything else is passthrough.
const KNOWN_COLUMNS: &[&str] = &[
    "location",
    "sample_name",
    "state",
    "ref",
    "alt",
    "call_GT",
    "call_GQ",
    "call_AD",
    "call_PL",
    "call_DP",
    "call_RGQ",
    "QUALapprox",
    "AS_QUALapprox",
];

/**
 * Lazy, finite, non-restartable stream of SampleRecords decoded from a TSV
 * export of the cohort table. A table reference is either a single file or
 * a directory of shards, read in lexicographic order. Rows outside the
 * closed location range are skipped; rows that fail to decode surface as
 * recoverable `MalformedRecord` errors.
 */
pub struct TsvRecordSource {
    shards: Vec<PathBuf>,
    current: Option<ShardReader>,
    min_location: Option<LocationKey>,
    max_location: Option<LocationKey>,
}

struct ShardReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    columns: HashMap<String, usize>,
    row: csv::StringRecord,
}

impl TsvRecordSource {
    pub fn open<P: AsRef<Path>>(
        table: P,
        min_location: Option<LocationKey>,
        max_location: Option<LocationKey>,
    ) -> Result<TsvRecordSource, ExtractError> {
        let table = table.as_ref();
        let mut shards = if table.is_dir() {
            let mut paths: Vec<PathBuf> = std::fs::read_dir(table)
                .map_err(|e| ExtractError::ReadError(format!("{}: {}", table.display(), e)))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .map(|ext| ext == "tsv" || ext == "txt")
                        .unwrap_or(false)
                })
                .collect();
            paths.sort();
            paths
        } else {
            vec![table.to_path_buf()]
        };
        if shards.is_empty() {
            return Err(ExtractError::ReadError(format!(
                "no record shards found under {}",
                table.display()
            )));
        }
        shards.reverse(); // consumed by pop()
        Ok(TsvRecordSource {
            shards,
            current: None,
            min_location,
            max_location,
        })
    }

    fn advance_shard(&mut self) -> Result<bool, ExtractError> {
        let path = match self.shards.pop() {
            Some(p) => p,
            None => return Ok(false),
        };
        let mut reader = open_with_retry(&path)?;
        let headers = reader
            .headers()
            .map_err(|e| ExtractError::ReadError(format!("{}: {}", path.display(), e)))?;
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        for required in ["location", "sample_name", "state"] {
            if !columns.contains_key(required) {
                return Err(ExtractError::ReadError(format!(
                    "{}: missing required column '{}'",
                    path.display(),
                    required
                )));
            }
        }
        debug!("Reading record shard {}", path.display());
        self.current = Some(ShardReader {
            path,
            reader,
            columns,
            row: csv::StringRecord::new(),
        });
        Ok(true)
    }
}

impl Iterator for TsvRecordSource {
    type Item = Result<SampleRecord, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                match self.advance_shard() {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e)),
                }
            }
            let shard = self.current.as_mut().unwrap();
            match shard.reader.read_record(&mut shard.row) {
                Ok(false) => {
                    self.current = None;
                    continue;
                }
                Ok(true) => {
                    let decoded = decode_row(&shard.columns, &shard.row);
                    match decoded {
                        Ok(record) => {
                            if let Some(min) = self.min_location {
                                if record.location < min {
                                    continue;
                                }
                            }
                            if let Some(max) = self.max_location {
                                if record.location > max {
                                    continue;
                                }
                            }
                            return Some(Ok(record));
                        }
                        Err(e) => return Some(Err(e)),
                    }
                }
                Err(e) => {
                    return Some(Err(ExtractError::ReadError(format!(
                        "{}: {}",
                        shard.path.display(),
                        e
                    ))))
                }
            }
        }
    }
}

/// Transient open failures back off exponentially up to the attempt cap.
fn open_with_retry(path: &Path) -> Result<csv::Reader<File>, ExtractError> {
    let mut backoff = Duration::from_secs(1);
    let mut last_error = String::new();
    for attempt in 1..=MAX_OPEN_ATTEMPTS {
        match File::open(path) {
            Ok(file) => {
                return Ok(csv::ReaderBuilder::new()
                    .delimiter(b'\t')
                    .flexible(true)
                    .from_reader(file))
            }
            Err(e) => {
                last_error = e.to_string();
                if attempt < MAX_OPEN_ATTEMPTS {
                    warn!(
                        "Failed to open {} (attempt {}/{}): {}; retrying in {:?}",
                        path.display(),
                        attempt,
                        MAX_OPEN_ATTEMPTS,
                        last_error,
                        backoff
                    );
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
    Err(ExtractError::ReadError(format!(
        "{}: {} (after {} attempts)",
        path.display(),
        last_error,
        MAX_OPEN_ATTEMPTS
    )))
}

fn decode_row(
    columns: &HashMap<String, usize>,
    row: &csv::StringRecord,
) -> Result<SampleRecord, ExtractError> {
    let field = |name: &str| -> Option<&str> {
        columns
            .get(name)
            .and_then(|&i| row.get(i))
            .filter(|v| !v.is_empty())
    };
    let malformed = |what: &str| ExtractError::MalformedRecord(format!("{}: {:?}", what, row));

    let location: LocationKey = field("location")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| malformed("bad location"))?;
    let sample_name = field("sample_name")
        .ok_or_else(|| malformed("missing sample_name"))?
        .to_string();
    // an unknown state tag is an invariant violation, not a malformed row:
    // UnknownState propagates untransformed so the engine aborts
    let state = CallState::parse(field("state").ok_or_else(|| malformed("missing state"))?)?;

    let parse_int = |name: &str| -> Result<Option<i64>, ExtractError> {
        match field(name) {
            None => Ok(None),
            Some(v) => v
                .parse::<i64>()
                .map(Some)
                .map_err(|_| malformed(&format!("bad {}", name))),
        }
    };
    let parse_float = |name: &str| -> Result<Option<f64>, ExtractError> {
        match field(name) {
            None => Ok(None),
            Some(v) => v
                .parse::<f64>()
                .map(Some)
                .map_err(|_| malformed(&format!("bad {}", name))),
        }
    };

    let passthrough: Vec<(String, String)> = columns
        .iter()
        .filter(|(name, _)| !KNOWN_COLUMNS.contains(&name.as_str()))
        .filter_map(|(name, &i)| {
            row.get(i)
                .filter(|v| !v.is_empty())
                .map(|v| (name.clone(), v.to_string()))
        })
        .collect();

    Ok(SampleRecord {
        location,
        sample_name,
        state,
        ref_allele: field("ref").map(|s| s.to_string()),
        alt_alleles: field("alt").map(|s| s.to_string()),
        call_gt: field("call_GT").map(|s| s.to_string()),
        call_gq: parse_int("call_GQ")?,
        call_ad: field("call_AD").map(|s| s.to_string()),
        call_pl: field("call_PL").map(|s| s.to_string()),
        call_dp: parse_int("call_DP")?,
        call_rgq: parse_int("call_RGQ")?,
        qual_approx: parse_float("QUALapprox")?,
        as_qual_approx: field("AS_QUALapprox").map(|s| s.to_string()),
        passthrough,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_shard(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        write!(f, "{}", body).unwrap();
        path
    }

    const HEADER: &str =
        "location\tsample_name\tstate\tref\talt\tcall_GT\tcall_GQ\tQUALapprox\tAS_QUALapprox\n";

    #[test]
    fn reads_and_decodes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_shard(
            dir.path(),
            "records.tsv",
            &format!(
                "{}1000000100000\ts1\tv\tA\tC\t0/1\t60\t\t|500\n1000000100000\ts2\t2\t\t\t\t\t\t\n",
                HEADER
            ),
        );
        let records: Vec<SampleRecord> = TsvRecordSource::open(&path, None, None)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sample_name, "s1");
        assert_eq!(records[0].state, CallState::Variant);
        assert_eq!(records[0].call_gt.as_deref(), Some("0/1"));
        assert_eq!(records[1].state, CallState::RefBlock(2));
    }

    #[test]
    fn respects_location_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_shard(
            dir.path(),
            "records.tsv",
            &format!(
                "{}100\ts1\t0\t\t\t\t\t\t\n200\ts1\t0\t\t\t\t\t\t\n300\ts1\t0\t\t\t\t\t\t\n",
                HEADER
            ),
        );
        let records: Vec<SampleRecord> = TsvRecordSource::open(&path, Some(150), Some(250))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, 200);
    }

    #[test]
    fn malformed_rows_are_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_shard(
            dir.path(),
            "records.tsv",
            &format!("{}not_a_number\ts1\tv\tA\tC\t0/1\t60\t\t\n", HEADER),
        );
        let results: Vec<_> = TsvRecordSource::open(&path, None, None).unwrap().collect();
        assert_eq!(results.len(), 1);
        let err = results[0].as_ref().unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn unknown_state_tag_is_fatal_not_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_shard(
            dir.path(),
            "records.tsv",
            &format!("{}100\ts1\tz\tA\tC\t0/1\t60\t\t\n", HEADER),
        );
        let results: Vec<_> = TsvRecordSource::open(&path, None, None).unwrap().collect();
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, ExtractError::UnknownState(tag) if tag == "z"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn shards_are_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(dir.path(), "b.tsv", &format!("{}200\ts1\t0\t\t\t\t\t\t\n", HEADER));
        write_shard(dir.path(), "a.tsv", &format!("{}100\ts1\t0\t\t\t\t\t\t\n", HEADER));
        let locations: Vec<u64> = TsvRecordSource::open(dir.path(), None, None)
            .unwrap()
            .map(|r| r.unwrap().location)
            .collect();
        assert_eq!(locations, vec![100, 200]);
    }
}
