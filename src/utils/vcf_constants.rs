//! Key names and pipeline constants shared across the engine.

// INFO keys
pub const QUAL_APPROX_KEY: &str = "QUALapprox";
pub const AS_QUAL_APPROX_KEY: &str = "AS_QUALapprox";
pub const AS_VQSLOD_KEY: &str = "AS_VQSLOD";
pub const AS_YNG_STATUS_KEY: &str = "AS_YNG_STATUS";
pub const ALLELE_COUNT_KEY: &str = "AC";
pub const ALLELE_NUMBER_KEY: &str = "AN";
pub const ALLELE_FREQUENCY_KEY: &str = "AF";
pub const MLE_ALLELE_COUNT_KEY: &str = "MLEAC";
pub const MLE_ALLELE_FREQUENCY_KEY: &str = "MLEAF";

// FILTER names
pub const NAY_FILTER_NAME: &str = "NAY";
pub const VQSR_TRANCHE_SNP_FILTER_NAME: &str = "VQSRTrancheSNP";
pub const VQSR_TRANCHE_INDEL_FILTER_NAME: &str = "VQSRTrancheINDEL";
pub const PASS_FILTER_NAME: &str = "PASS";

// Quality approximation gate, the standard haploid caller constants.
pub const DEFAULT_CALLING_THRESHOLD: f64 = 30.0;
pub const SNP_HETEROZYGOSITY: f64 = 1.0e-3;
pub const INDEL_HETEROZYGOSITY: f64 = 1.25e-4;

/// GQ assigned to ref blocks synthesized for cohort samples with no record
/// at a locus.
pub const MISSING_CONF_THRESHOLD: i64 = 60;

/// Phred threshold below which a locus is dropped before genotyping, derived
/// from the calling threshold and the class heterozygosity prior.
pub fn calling_threshold_for(heterozygosity: f64) -> f64 {
    DEFAULT_CALLING_THRESHOLD - 10.0 * heterozygosity.log10()
}
