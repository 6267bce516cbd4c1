use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::gnarly_genotyper::GnarlyGenotyper;
use crate::engine::locus_assembler::LocusAssembler;
use crate::filter::filter_applier::FilterApplier;
use crate::filter::filter_map::FilterMap;
use crate::model::location::LocationKey;
use crate::model::sample_record::SampleRecord;
use crate::output::vcf_writer::VcfSink;
use crate::reference::reference_reader::{ContigDictionary, ReferenceSource};
use crate::sort::external_sorter::ExternalSorter;
use crate::utils::errors::ExtractError;

const PROGRESS_RECORD_INTERVAL: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    Exomes,
    Genomes,
    Arrays,
}

impl FromStr for ExtractMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EXOMES" => Ok(ExtractMode::Exomes),
            "GENOMES" => Ok(ExtractMode::Genomes),
            "ARRAYS" => Ok(ExtractMode::Arrays),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Sort the record stream locally before assembly.
    LocalSort,
    /// Trust the backend to deliver records in LocationKey order.
    OrderedQuery,
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOCAL_SORT" => Ok(QueryMode::LocalSort),
            "ORDERED_QUERY" => Ok(QueryMode::OrderedQuery),
            other => Err(format!("unknown query mode '{}'", other)),
        }
    }
}

/// Engine configuration, decoded once from the CLI. No global state.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub project: Option<String>,
    pub cohort_table: String,
    pub sample_table: String,
    pub filter_table: Option<String>,
    pub filter_set_name: String,
    pub min_location: Option<LocationKey>,
    pub max_location: Option<LocationKey>,
    pub mode: ExtractMode,
    pub query_mode: QueryMode,
    pub local_sort_max_records_in_ram: usize,
    pub vqslod_snp_threshold: f64,
    pub vqslod_indel_threshold: f64,
    pub emit_pls: bool,
    pub print_debug: bool,
    pub ref_sequence_path: String,
    pub output_path: String,
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.local_sort_max_records_in_ram == 0 {
            return Err(ExtractError::Config(
                "local-sort-max-records-in-ram must be positive".to_string(),
            ));
        }
        if !self.vqslod_snp_threshold.is_finite() || !self.vqslod_indel_threshold.is_finite() {
            return Err(ExtractError::Config(
                "VQSLOD thresholds must be finite".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_location, self.max_location) {
            if min > max {
                return Err(ExtractError::Config(format!(
                    "min-location {} exceeds max-location {}",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractStats {
    pub records_read: u64,
    pub malformed_records: u64,
    pub loci_assembled: u64,
    pub loci_below_qual_threshold: u64,
    /// Loci with only ref-block/missing states and no variant record.
    pub loci_suppressed_no_variant: u64,
    /// Loci the gnarly finalizer declined to emit.
    pub loci_suppressed_by_finalizer: u64,
    pub records_written: u64,
}

#[derive(Debug)]
pub enum EngineOutcome {
    Completed(ExtractStats),
    Cancelled(ExtractStats),
}

/**
 * Wires the pipeline together: record reader, optional external sort,
 * per-locus assembly, gnarly finalization, filter application, and the VCF
 * sink, progressing in one cooperative loop. Cancellation is checked at
 * every suspension point; temp files and the output stream are released on
 * all exit paths.
 */
pub struct ExtractEngine<R, S> {
    config: ExtractConfig,
    reader: R,
    reference: S,
    dict: ContigDictionary,
    cohort: Vec<String>,
    filter_map: Option<FilterMap>,
    cancel: Arc<AtomicBool>,
}

impl<R, S> ExtractEngine<R, S>
where
    R: Iterator<Item = Result<SampleRecord, ExtractError>> + 'static,
    S: ReferenceSource,
{
    pub fn new(
        config: ExtractConfig,
        reader: R,
        reference: S,
        dict: ContigDictionary,
        cohort: Vec<String>,
        filter_map: Option<FilterMap>,
        cancel: Arc<AtomicBool>,
    ) -> Result<ExtractEngine<R, S>, ExtractError> {
        config.validate()?;
        if cohort.is_empty() {
            return Err(ExtractError::Config("cohort sample list is empty".to_string()));
        }
        Ok(ExtractEngine {
            config,
            reader,
            reference,
            dict,
            cohort,
            filter_map,
            cancel,
        })
    }

    pub fn run(mut self) -> Result<EngineOutcome, ExtractError> {
        let mut stats = ExtractStats::default();
        let assembler = LocusAssembler::new(self.config.mode, self.cohort.clone());
        let gnarly = GnarlyGenotyper::new(self.config.emit_pls);
        let applier = FilterApplier::new(
            self.config.vqslod_snp_threshold,
            self.config.vqslod_indel_threshold,
        );
        let mut sink = VcfSink::create(
            &self.config.output_path,
            &self.dict,
            &self.cohort,
            self.config.emit_pls,
        )?;

        let records_read = Arc::new(AtomicU64::new(0));
        let malformed = Arc::new(AtomicU64::new(0));
        let reads = Arc::clone(&records_read);
        let drops = Arc::clone(&malformed);
        let filtered = self.reader.filter_map(move |item| match item {
            Ok(record) => {
                reads.fetch_add(1, Ordering::Relaxed);
                Some(Ok(record))
            }
            Err(e) if e.is_recoverable() => {
                warn!("{}", e);
                drops.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => Some(Err(e)),
        });

        let stream: Box<dyn Iterator<Item = Result<SampleRecord, ExtractError>>> =
            match self.config.query_mode {
                QueryMode::LocalSort => {
                    let sorter = ExternalSorter::new(
                        self.config.local_sort_max_records_in_ram,
                        Arc::clone(&self.cancel),
                    );
                    match sorter.sort_by_location(filtered) {
                        Ok(sorted) => Box::new(sorted),
                        Err(ExtractError::Cancelled) => {
                            stats.records_read = records_read.load(Ordering::Relaxed);
                            stats.malformed_records += malformed.load(Ordering::Relaxed);
                            info!("Extraction cancelled during sort");
                            return Ok(EngineOutcome::Cancelled(stats));
                        }
                        Err(e) => return Err(e),
                    }
                }
                QueryMode::OrderedQuery => Box::new(OrderCheck {
                    inner: filtered,
                    last: None,
                }),
            };
        let mut stream = stream.peekable();

        let progress = ProgressBar::new_spinner();
        progress.set_style(ProgressStyle::default_spinner());
        progress.enable_steady_tick(Duration::from_millis(500));
        let mut processed: u64 = 0;
        let mut last_progress: u64 = 0;

        let outcome = loop {
            if self.cancel.load(Ordering::Relaxed) {
                info!("Extraction cancelled; dropping in-flight locus");
                break EngineOutcome::Cancelled(std::mem::take(&mut stats));
            }

            let key = match stream.peek() {
                None => {
                    break EngineOutcome::Completed(std::mem::take(&mut stats));
                }
                Some(Ok(record)) => record.location,
                Some(Err(_)) => {
                    let e = stream.next().unwrap().unwrap_err();
                    if matches!(e, ExtractError::Cancelled) {
                        break EngineOutcome::Cancelled(std::mem::take(&mut stats));
                    }
                    progress.finish_and_clear();
                    return Err(e);
                }
            };

            let mut group = Vec::new();
            while matches!(stream.peek(), Some(Ok(record)) if record.location == key) {
                group.push(stream.next().unwrap().unwrap());
            }
            processed += group.len() as u64;

            if let Some(vc) = assembler.assemble(key, group, &mut self.reference, &mut stats)? {
                match gnarly.finalize(vc) {
                    Some(mut vc) => {
                        // array manifests are never joined against the filter model
                        if self.config.mode != ExtractMode::Arrays {
                            if let Some(filter_map) = &self.filter_map {
                                applier.apply(&mut vc, filter_map.at(key));
                            }
                        }
                        if self.config.print_debug {
                            debug!(
                                "Writing locus {}:{} with {} alleles",
                                vc.contig,
                                vc.start,
                                vc.get_n_alleles()
                            );
                        }
                        sink.write(&vc)?;
                        stats.records_written += 1;
                    }
                    None => {
                        stats.loci_suppressed_by_finalizer += 1;
                    }
                }
            }

            if processed - last_progress >= PROGRESS_RECORD_INTERVAL {
                last_progress = processed;
                progress.set_message(format!(
                    "{} records processed, {} loci written",
                    processed, stats.records_written
                ));
            }
        };
        progress.finish_and_clear();

        let mut stats = match outcome {
            EngineOutcome::Completed(stats) => stats,
            EngineOutcome::Cancelled(mut stats) => {
                stats.records_read = records_read.load(Ordering::Relaxed);
                stats.malformed_records += malformed.load(Ordering::Relaxed);
                return Ok(EngineOutcome::Cancelled(stats));
            }
        };
        stats.records_read = records_read.load(Ordering::Relaxed);
        stats.malformed_records += malformed.load(Ordering::Relaxed);
        info!(
            "Extraction complete: {} records read, {} malformed, {} loci assembled, \
             {} below QUALapprox threshold, {} without variant records, \
             {} suppressed by the finalizer, {} written",
            stats.records_read,
            stats.malformed_records,
            stats.loci_assembled,
            stats.loci_below_qual_threshold,
            stats.loci_suppressed_no_variant,
            stats.loci_suppressed_by_finalizer,
            stats.records_written
        );
        Ok(EngineOutcome::Completed(stats))
    }
}

/**
 * Convenience wiring for the CLI: opens the reference, cohort list, filter
 * table, and record table from the configured paths and runs the engine.
 */
pub fn run_extract(
    config: ExtractConfig,
    cancel: Arc<AtomicBool>,
) -> Result<EngineOutcome, ExtractError> {
    config.validate()?;
    let reference = crate::reference::reference_reader::FastaReferenceReader::new(
        &config.ref_sequence_path,
    )?;
    let dict = reference.dictionary().clone();
    let cohort = read_sample_table(&config.sample_table)?;
    info!(
        "Extracting {} samples over {} contigs{}",
        cohort.len(),
        dict.len(),
        config
            .project
            .as_deref()
            .map(|p| format!(" (project {})", p))
            .unwrap_or_default()
    );
    let filter_map = match &config.filter_table {
        Some(path) => Some(FilterMap::load(
            path,
            &config.filter_set_name,
            config.min_location,
            config.max_location,
        )?),
        None => {
            info!("No filter table configured; running in no-filter mode");
            None
        }
    };
    let reader = crate::reader::record_source::TsvRecordSource::open(
        &config.cohort_table,
        config.min_location,
        config.max_location,
    )?;
    let engine = ExtractEngine::new(config, reader, reference, dict, cohort, filter_map, cancel)?;
    engine.run()
}

/// One sample name per line (or first tab-separated column); `#` comments
/// skipped; order defines the output genotype column order.
pub fn read_sample_table(path: &str) -> Result<Vec<String>, ExtractError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ExtractError::Config(format!("cannot read sample table {}: {}", path, e)))?;
    let mut samples = Vec::new();
    for line in raw.lines() {
        let name = line.split('\t').next().unwrap_or("").trim();
        if name.is_empty() || name.starts_with('#') || name == "sample_name" {
            continue;
        }
        if !samples.iter().any(|s| s == name) {
            samples.push(name.to_string());
        }
    }
    if samples.is_empty() {
        return Err(ExtractError::Config(format!(
            "sample table {} contains no samples",
            path
        )));
    }
    Ok(samples)
}

/// ORDERED_QUERY wrapper: a backend that breaks its ordering promise is a
/// fatal invariant violation, never silently re-sorted.
struct OrderCheck<I> {
    inner: I,
    last: Option<LocationKey>,
}

impl<I> Iterator for OrderCheck<I>
where
    I: Iterator<Item = Result<SampleRecord, ExtractError>>,
{
    type Item = Result<SampleRecord, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.inner.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        if let Some(last) = self.last {
            if record.location < last {
                return Some(Err(ExtractError::ReadError(format!(
                    "ordered query returned location {} after {}",
                    record.location, last
                ))));
            }
        }
        self.last = Some(record.location);
        Some(Ok(record))
    }
}
