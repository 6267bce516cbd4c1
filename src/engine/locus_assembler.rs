use std::collections::HashSet;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::engine::extract_engine::{ExtractMode, ExtractStats};
use crate::engine::sample_merger::resolve_duplicate;
use crate::genotype::genotype_builder::{AttributeObject, Genotype};
use crate::model::byte_array_allele::{ByteArrayAllele, NON_REF_ALLELE};
use crate::model::location::{self, LocationKey};
use crate::model::sample_record::{CallState, SampleRecord};
use crate::model::variant_context::VariantContext;
use crate::model::variant_context_utils::{merge_calls, PerSampleCall};
use crate::reference::reference_reader::ReferenceSource;
use crate::utils::errors::ExtractError;
use crate::utils::vcf_constants::*;

/**
 * The per-locus state machine: de-duplicates per-sample records, synthesizes
 * calls for cohort samples with no record, applies the QualApprox gate, and
 * merges per-sample contexts into one multi-sample call.
 */
pub struct LocusAssembler {
    mode: ExtractMode,
    cohort: Vec<String>,
    cohort_set: HashSet<String>,
    snp_threshold: f64,
    indel_threshold: f64,
}

/// A sample's decoded contribution at one locus.
enum SampleState {
    Call(Box<PerSampleCall>),
    /// Spanning deletion or explicit missing marker: the sample was seen but
    /// contributes no context, and is emitted as a no-call.
    SeenNoContext,
}

impl LocusAssembler {
    pub fn new(mode: ExtractMode, cohort: Vec<String>) -> LocusAssembler {
        let cohort_set = cohort.iter().cloned().collect();
        LocusAssembler {
            mode,
            cohort,
            cohort_set,
            snp_threshold: calling_threshold_for(SNP_HETEROZYGOSITY),
            indel_threshold: calling_threshold_for(INDEL_HETEROZYGOSITY),
        }
    }

    pub fn cohort(&self) -> &[String] {
        &self.cohort
    }

    /**
     * Assemble all records sharing one LocationKey into a merged call.
     * Returns None when the locus is suppressed: no variant record present,
     * or accumulated QUALapprox below the class threshold.
     */
    pub fn assemble<S: ReferenceSource>(
        &self,
        key: LocationKey,
        records: Vec<SampleRecord>,
        reference: &mut S,
        stats: &mut ExtractStats,
    ) -> Result<Option<VariantContext>, ExtractError> {
        let (contig, position) = location::decode(key);

        // per-sample de-duplication (C6)
        let mut by_sample: IndexMap<String, SampleRecord> = IndexMap::new();
        for record in records {
            if !self.cohort_set.contains(&record.sample_name) {
                warn!(
                    "Record at {} for sample '{}' outside the cohort; dropped",
                    key, record.sample_name
                );
                stats.malformed_records += 1;
                continue;
            }
            match by_sample.entry(record.sample_name.clone()) {
                Entry::Occupied(mut occupied) => {
                    let existing = occupied.get().clone();
                    occupied.insert(resolve_duplicate(existing, record));
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(record);
                }
            }
        }

        let ref_base = reference.base_at(contig, position)?;
        let ref_allele = ByteArrayAllele::new(&[ref_base], true);

        let mut states: IndexMap<String, SampleState> = IndexMap::new();
        let mut qual_approx = 0.0f64;
        let mut has_variant = false;
        let mut has_snp_allele = false;

        for (sample, record) in by_sample {
            match record.state {
                CallState::Variant => {
                    match self.build_variant_call(&record, ref_base) {
                        Ok((call, qual, snp)) => {
                            has_variant = true;
                            qual_approx += qual;
                            has_snp_allele |= snp;
                            states.insert(sample, SampleState::Call(Box::new(call)));
                        }
                        Err(e) => {
                            warn!("{}", e);
                            stats.malformed_records += 1;
                        }
                    }
                }
                CallState::RefBlock(band) => {
                    let genotype = self.ref_block_genotype(
                        &record,
                        ref_allele.clone(),
                        Some(i64::from(band) * 10),
                    );
                    states.insert(
                        sample,
                        SampleState::Call(Box::new(PerSampleCall::new(
                            vec![ref_allele.clone(), NON_REF_ALLELE.clone()],
                            genotype,
                        ))),
                    );
                }
                CallState::UnknownGq => {
                    let genotype = self.ref_block_genotype(&record, ref_allele.clone(), None);
                    states.insert(
                        sample,
                        SampleState::Call(Box::new(PerSampleCall::new(
                            vec![ref_allele.clone(), NON_REF_ALLELE.clone()],
                            genotype,
                        ))),
                    );
                }
                CallState::SpanningDeletion | CallState::Missing => {
                    states.insert(sample, SampleState::SeenNoContext);
                }
            }
        }

        // no variant context anywhere: the locus is all reference bands and
        // never emits
        if !has_variant {
            stats.loci_suppressed_no_variant += 1;
            return Ok(None);
        }

        // QualApprox gate (C8)
        let threshold = if has_snp_allele {
            self.snp_threshold
        } else {
            self.indel_threshold
        };
        if qual_approx < threshold {
            debug!(
                "Suppressing locus {}: QUALapprox {:.2} below threshold {:.2}",
                key, qual_approx, threshold
            );
            stats.loci_below_qual_threshold += 1;
            return Ok(None);
        }

        // cohort-ordered genotype assembly with missing-sample synthesis
        let mut calls = Vec::with_capacity(self.cohort.len());
        for sample in &self.cohort {
            match states.shift_remove(sample.as_str()) {
                Some(SampleState::Call(call)) => calls.push(*call),
                Some(SampleState::SeenNoContext) => calls.push(PerSampleCall::new(
                    vec![ref_allele.clone(), NON_REF_ALLELE.clone()],
                    Genotype::no_call(sample.clone()),
                )),
                None => {
                    let gq = match self.mode {
                        ExtractMode::Arrays => None,
                        _ => Some(MISSING_CONF_THRESHOLD),
                    };
                    calls.push(PerSampleCall::new(
                        vec![ref_allele.clone(), NON_REF_ALLELE.clone()],
                        Genotype::ref_block(sample.clone(), ref_allele.clone(), gq),
                    ));
                }
            }
        }

        let mut merged = merge_calls(contig, position, calls);
        merged.qual = qual_approx;
        merged.set_attribute(
            QUAL_APPROX_KEY,
            AttributeObject::Integer(qual_approx.round() as i64),
        );
        stats.loci_assembled += 1;
        Ok(Some(merged))
    }

    /// The GQ of a reference band comes from the state digit alone; any
    /// `call_GQ` the export carries on these rows is ignored.
    fn ref_block_genotype(
        &self,
        record: &SampleRecord,
        ref_allele: ByteArrayAllele,
        band_gq: Option<i64>,
    ) -> Genotype {
        let gq = match self.mode {
            ExtractMode::Arrays => None,
            _ => band_gq,
        };
        let mut genotype = Genotype::ref_block(record.sample_name.clone(), ref_allele, gq);
        if let Some(dp) = record.call_dp {
            genotype.dp = dp;
        }
        if let Some(rgq) = record.call_rgq {
            genotype.rgq = rgq;
        }
        genotype
    }

    /**
     * Build a per-sample variant context from a `v` record: its own alleles
     * plus the `<NON_REF>` pseudo-allele, the parsed genotype fields, and
     * this sample's QUALapprox contribution.
     */
    fn build_variant_call(
        &self,
        record: &SampleRecord,
        ref_base: u8,
    ) -> Result<(PerSampleCall, f64, bool), ExtractError> {
        let malformed = |what: String| ExtractError::MalformedRecord(what);

        let ref_str = record
            .ref_allele
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                malformed(format!(
                    "variant record without ref allele at {} for {}",
                    record.location, record.sample_name
                ))
            })?;
        if !ref_str.as_bytes()[0].eq_ignore_ascii_case(&ref_base) {
            return Err(malformed(format!(
                "record ref '{}' disagrees with reference base '{}' at {} for {}",
                ref_str, ref_base as char, record.location, record.sample_name
            )));
        }

        let alt_strings = record.alt_allele_list();
        let mut alleles = vec![ByteArrayAllele::new(ref_str.as_bytes(), true)];
        for alt in &alt_strings {
            alleles.push(ByteArrayAllele::new(alt.as_bytes(), false));
        }
        if !alleles.iter().any(|a| a.is_non_ref()) {
            alleles.push(NON_REF_ALLELE.clone());
        }

        let gt_alleles = match record.parse_gt() {
            Some((indices, _)) => indices
                .iter()
                .map(|slot| match slot {
                    None => Ok(ByteArrayAllele::no_call()),
                    Some(i) => alleles.get(*i).cloned().ok_or_else(|| {
                        malformed(format!(
                            "GT index {} out of range at {} for {}",
                            i, record.location, record.sample_name
                        ))
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![ByteArrayAllele::no_call(), ByteArrayAllele::no_call()],
        };

        let mut genotype = Genotype::build_from_alleles(record.sample_name.clone(), gt_alleles);
        genotype.is_phased = record
            .call_gt
            .as_deref()
            .map(|gt| gt.contains('|'))
            .unwrap_or(false);
        if let Some(gq) = record.call_gq {
            genotype.gq = gq;
        }
        if let Some(dp) = record.call_dp {
            genotype.dp = dp;
        }
        if let Some(rgq) = record.call_rgq {
            genotype.rgq = rgq;
        }
        if let Some(ad) = SampleRecord::parse_int_list(&record.call_ad) {
            genotype.ad = ad;
        }
        if let Some(pl) = SampleRecord::parse_int_list(&record.call_pl) {
            genotype.pl = pl;
        }

        // QUALapprox is authoritative; the allele-specific components are the
        // fallback, with the spanning-deletion component excluded
        let mut components = record.as_qual_approx_components();
        components.resize(alleles.len(), None);
        let qual = match record.qual_approx {
            Some(q) => q,
            None => {
                let mut sum = 0.0;
                for (i, component) in components.iter().enumerate().skip(1) {
                    let alt = alt_strings.get(i - 1).map(|s| s.as_str());
                    if alt == Some("*") {
                        continue;
                    }
                    sum += component.unwrap_or(0.0);
                }
                sum
            }
        };

        let has_snp = alt_strings
            .iter()
            .any(|alt| alt != "*" && !alt.starts_with('<') && alt.len() == ref_str.len());

        let mut call = PerSampleCall::new(alleles, genotype);
        call.as_qual_approx = components;
        Ok((call, qual, has_snp))
    }
}
