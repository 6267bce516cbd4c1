use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rust_htslib::faidx;

use crate::utils::errors::ExtractError;

/// Bytes fetched per cache refill. The assembler walks positions in
/// non-decreasing order within a contig, so one window serves a long run of
/// lookups.
const CACHE_WINDOW_SIZE: u64 = 8192;

/**
 * Contig names and lengths in reference dictionary order, loaded from the
 * FASTA `.fai` index. The load order defines the contig index used by the
 * location codec and the output sort order.
 */
#[derive(Debug, Clone, Default)]
pub struct ContigDictionary {
    names: Vec<String>,
    lengths: Vec<u64>,
    index: HashMap<String, usize>,
}

impl ContigDictionary {
    pub fn from_fai<P: AsRef<Path>>(fai_path: P) -> Result<ContigDictionary, ExtractError> {
        let file = File::open(fai_path.as_ref()).map_err(|e| {
            ExtractError::Config(format!(
                "cannot open reference index {}: {}",
                fai_path.as_ref().display(),
                e
            ))
        })?;
        let mut dict = ContigDictionary::default();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| ExtractError::ReferenceLookup(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let name = fields
                .next()
                .ok_or_else(|| ExtractError::Config("empty .fai line".to_string()))?
                .to_string();
            let length: u64 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| {
                    ExtractError::Config(format!("bad length field in .fai for contig {}", name))
                })?;
            dict.push(name, length);
        }
        if dict.is_empty() {
            return Err(ExtractError::Config(
                "reference index contains no contigs".to_string(),
            ));
        }
        Ok(dict)
    }

    pub fn push(&mut self, name: String, length: u64) {
        self.index.insert(name.clone(), self.names.len());
        self.names.push(name);
        self.lengths.push(length);
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|s| s.as_str())
    }

    pub fn length_of(&self, index: usize) -> Option<u64> {
        self.lengths.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.names
            .iter()
            .map(|s| s.as_str())
            .zip(self.lengths.iter().copied())
    }
}

/// Single-base reference lookup on the assembler's hot path.
pub trait ReferenceSource {
    /// The uppercased base at a 1-based position.
    fn base_at(&mut self, contig: usize, position: u64) -> Result<u8, ExtractError>;
}

/**
 * faidx-backed reference with a sliding window cache. Lookups within one
 * contig arrive in non-decreasing position order; a miss pulls the next
 * window starting at the missed position.
 */
pub struct FastaReferenceReader {
    reader: faidx::Reader,
    dict: ContigDictionary,
    cache_contig: usize,
    cache_start: u64,
    cache: Vec<u8>,
}

impl FastaReferenceReader {
    pub fn new<P: AsRef<Path>>(fasta_path: P) -> Result<FastaReferenceReader, ExtractError> {
        let fai_path = PathBuf::from(format!("{}.fai", fasta_path.as_ref().display()));
        let dict = ContigDictionary::from_fai(&fai_path)?;
        let reader = faidx::Reader::from_path(fasta_path.as_ref()).map_err(|e| {
            ExtractError::Config(format!(
                "cannot open reference {}: {}",
                fasta_path.as_ref().display(),
                e
            ))
        })?;
        Ok(FastaReferenceReader {
            reader,
            dict,
            cache_contig: usize::MAX,
            cache_start: 0,
            cache: Vec::new(),
        })
    }

    pub fn dictionary(&self) -> &ContigDictionary {
        &self.dict
    }

    fn refill(&mut self, contig: usize, position: u64) -> Result<(), ExtractError> {
        let name = self
            .dict
            .name_of(contig)
            .ok_or_else(|| ExtractError::ReferenceLookup(format!("contig index {}", contig)))?
            .to_string();
        let contig_len = self.dict.length_of(contig).unwrap_or(0);
        if position == 0 || position > contig_len {
            return Err(ExtractError::ReferenceLookup(format!(
                "position {}:{} beyond contig end {}",
                name, position, contig_len
            )));
        }
        let end = (position + CACHE_WINDOW_SIZE - 1).min(contig_len);
        // faidx coordinates are 0-based inclusive
        let bases = self
            .reader
            .fetch_seq(&name, position as usize - 1, end as usize - 1)
            .map_err(|e| {
                ExtractError::ReferenceLookup(format!("{}:{}: {}", name, position, e))
            })?;
        self.cache = bases.to_ascii_uppercase();
        self.cache_contig = contig;
        self.cache_start = position;
        Ok(())
    }
}

impl ReferenceSource for FastaReferenceReader {
    fn base_at(&mut self, contig: usize, position: u64) -> Result<u8, ExtractError> {
        let in_cache = contig == self.cache_contig
            && position >= self.cache_start
            && position < self.cache_start + self.cache.len() as u64;
        if !in_cache {
            self.refill(contig, position)?;
        }
        Ok(self.cache[(position - self.cache_start) as usize])
    }
}

/// In-memory reference used by unit tests and array-manifest runs.
pub struct InMemoryReference {
    contigs: Vec<Vec<u8>>,
}

impl InMemoryReference {
    pub fn new(contigs: Vec<Vec<u8>>) -> InMemoryReference {
        InMemoryReference { contigs }
    }
}

impl ReferenceSource for InMemoryReference {
    fn base_at(&mut self, contig: usize, position: u64) -> Result<u8, ExtractError> {
        (position as usize)
            .checked_sub(1)
            .and_then(|i| self.contigs.get(contig).and_then(|c| c.get(i)))
            .map(|b| b.to_ascii_uppercase())
            .ok_or_else(|| {
                ExtractError::ReferenceLookup(format!("contig {} position {}", contig, position))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn dictionary_preserves_fai_order() {
        let dir = tempfile::tempdir().unwrap();
        let fai = dir.path().join("ref.fa.fai");
        let mut f = File::create(&fai).unwrap();
        writeln!(f, "chr1\t248956422\t112\t70\t71").unwrap();
        writeln!(f, "chr2\t242193529\t252513167\t70\t71").unwrap();
        writeln!(f, "chrX\t156040895\t495320433\t70\t71").unwrap();

        let dict = ContigDictionary::from_fai(&fai).unwrap();
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.index_of("chr2"), Some(1));
        assert_eq!(dict.name_of(2), Some("chrX"));
        assert_eq!(dict.length_of(0), Some(248956422));
        assert_eq!(dict.index_of("chrM"), None);
    }

    #[test]
    fn in_memory_reference_is_one_based() {
        let mut reference = InMemoryReference::new(vec![b"acgt".to_vec()]);
        assert_eq!(reference.base_at(0, 1).unwrap(), b'A');
        assert_eq!(reference.base_at(0, 4).unwrap(), b'T');
        assert!(reference.base_at(0, 5).is_err());
    }
}
