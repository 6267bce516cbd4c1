use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::Path;

use crate::model::location::LocationKey;
use crate::utils::errors::ExtractError;

/// Per-(location, alt) categorical label from the upstream filtering model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YngStatus {
    Yay,
    Nay,
    Gray,
    /// No information recorded; treated as NAY at filter time.
    Empty,
}

impl YngStatus {
    fn parse(raw: &str) -> Option<YngStatus> {
        match raw {
            "Y" => Some(YngStatus::Yay),
            "N" => Some(YngStatus::Nay),
            "G" => Some(YngStatus::Gray),
            "" => Some(YngStatus::Empty),
            _ => None,
        }
    }
}

impl fmt::Display for YngStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            YngStatus::Yay => "Y",
            YngStatus::Nay => "N",
            YngStatus::Gray => "G",
            YngStatus::Empty => ".",
        };
        write!(f, "{}", tag)
    }
}

/// One filter-table row scoped to a location.
#[derive(Debug, Clone)]
pub struct FilterMapEntry {
    pub ref_allele: String,
    pub alt_allele: String,
    /// NaN encodes "no score".
    pub vqslod: f64,
    pub yng: YngStatus,
}

/**
 * Eagerly loaded map of the filter table for the extraction range, keyed by
 * LocationKey with per-location entry lists. Built once at engine start and
 * immutable afterwards.
 */
#[derive(Debug, Default)]
pub struct FilterMap {
    entries: BTreeMap<LocationKey, Vec<FilterMapEntry>>,
}

impl FilterMap {
    /**
     * Load rows matching `filter_set_name` within the closed location range.
     * The same (location, ref, alt) appearing twice with conflicting values
     * is a fatal `FilterTableMalformed`.
     */
    pub fn load<P: AsRef<Path>>(
        table: P,
        filter_set_name: &str,
        min_location: Option<LocationKey>,
        max_location: Option<LocationKey>,
    ) -> Result<FilterMap, ExtractError> {
        let table = table.as_ref();
        let file = File::open(table)
            .map_err(|e| ExtractError::Config(format!("{}: {}", table.display(), e)))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| ExtractError::FilterTableMalformed(e.to_string()))?
            .clone();
        let column = |name: &str| headers.iter().position(|h| h == name);
        let loc_col = column("location")
            .ok_or_else(|| ExtractError::FilterTableMalformed("missing 'location'".to_string()))?;
        let ref_col = column("ref")
            .ok_or_else(|| ExtractError::FilterTableMalformed("missing 'ref'".to_string()))?;
        let alt_col = column("alt")
            .ok_or_else(|| ExtractError::FilterTableMalformed("missing 'alt'".to_string()))?;
        let vqslod_col = column("vqslod");
        let yng_col = column("yng_status");
        let set_col = column("filter_set_name");

        let mut map = FilterMap::default();
        let mut row = csv::StringRecord::new();
        while reader
            .read_record(&mut row)
            .map_err(|e| ExtractError::FilterTableMalformed(e.to_string()))?
        {
            if let Some(set_col) = set_col {
                if row.get(set_col).unwrap_or("") != filter_set_name {
                    continue;
                }
            }
            let location: LocationKey = row
                .get(loc_col)
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| {
                    ExtractError::FilterTableMalformed(format!("bad location in row {:?}", row))
                })?;
            if min_location.map(|min| location < min).unwrap_or(false)
                || max_location.map(|max| location > max).unwrap_or(false)
            {
                continue;
            }
            let ref_allele = row.get(ref_col).unwrap_or("").to_uppercase();
            let alt_allele = row.get(alt_col).unwrap_or("").to_uppercase();
            if ref_allele.is_empty() || alt_allele.is_empty() {
                return Err(ExtractError::FilterTableMalformed(format!(
                    "empty allele at location {}",
                    location
                )));
            }
            let vqslod = match vqslod_col.and_then(|c| row.get(c)).filter(|v| !v.is_empty()) {
                Some(raw) => raw.parse::<f64>().map_err(|_| {
                    ExtractError::FilterTableMalformed(format!(
                        "bad vqslod '{}' at location {}",
                        raw, location
                    ))
                })?,
                None => f64::NAN,
            };
            let yng_raw = yng_col.and_then(|c| row.get(c)).unwrap_or("");
            let yng = YngStatus::parse(yng_raw).ok_or_else(|| {
                ExtractError::FilterTableMalformed(format!(
                    "bad yng_status '{}' at location {}",
                    yng_raw, location
                ))
            })?;

            let entry = FilterMapEntry {
                ref_allele,
                alt_allele,
                vqslod,
                yng,
            };
            map.insert(location, entry)?;
        }
        info!(
            "Loaded filter map: {} locations for filter set '{}'",
            map.entries.len(),
            filter_set_name
        );
        Ok(map)
    }

    fn insert(&mut self, location: LocationKey, entry: FilterMapEntry) -> Result<(), ExtractError> {
        let slot = self.entries.entry(location).or_default();
        if let Some(existing) = slot
            .iter()
            .find(|e| e.ref_allele == entry.ref_allele && e.alt_allele == entry.alt_allele)
        {
            let same_score = (existing.vqslod.is_nan() && entry.vqslod.is_nan())
                || existing.vqslod == entry.vqslod;
            if !same_score || existing.yng != entry.yng {
                return Err(ExtractError::FilterTableMalformed(format!(
                    "conflicting entries for ({}, {}, {})",
                    location, entry.ref_allele, entry.alt_allele
                )));
            }
            return Ok(());
        }
        slot.push(entry);
        Ok(())
    }

    pub fn at(&self, location: LocationKey) -> Option<&[FilterMapEntry]> {
        self.entries.get(&location).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
