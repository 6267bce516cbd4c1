use ordered_float::OrderedFloat;

use crate::filter::filter_map::{FilterMapEntry, YngStatus};
use crate::genotype::genotype_builder::AttributeObject;
use crate::model::variant_context::VariantContext;
use crate::utils::vcf_constants::*;

/**
 * Joins the finalized call against the filter map: remaps filter-table
 * alleles into the call's reference frame, attaches AS_VQSLOD and
 * AS_YNG_STATUS, and sets FILTER. Recomputed from scratch on every call, so
 * re-application is idempotent.
 */
pub struct FilterApplier {
    vqslod_snp_threshold: f64,
    vqslod_indel_threshold: f64,
}

impl FilterApplier {
    pub fn new(vqslod_snp_threshold: f64, vqslod_indel_threshold: f64) -> FilterApplier {
        FilterApplier {
            vqslod_snp_threshold,
            vqslod_indel_threshold,
        }
    }

    pub fn apply(&self, vc: &mut VariantContext, entries: Option<&[FilterMapEntry]>) {
        let alt_count = vc.get_n_alleles() - 1;
        let mut vqslods: Vec<Option<f64>> = vec![None; alt_count];
        let mut yngs: Vec<Option<YngStatus>> = vec![None; alt_count];

        if let Some(entries) = entries {
            let merged_ref = vc.get_reference().get_bases().to_vec();
            for entry in entries {
                let target_alt = match remap_alt(&merged_ref, entry) {
                    Some(alt) => alt,
                    None => continue,
                };
                if let Some(alt_index) = vc
                    .get_alternate_alleles()
                    .iter()
                    .position(|a| a.get_bases() == target_alt.as_slice())
                {
                    if !entry.vqslod.is_nan() {
                        vqslods[alt_index] = Some(entry.vqslod);
                    }
                    yngs[alt_index] = Some(entry.yng);
                }
            }
        }

        vc.set_attribute(AS_VQSLOD_KEY, AttributeObject::VecFloatOpt(vqslods.clone()));
        vc.set_attribute(
            AS_YNG_STATUS_KEY,
            AttributeObject::VecString(
                yngs.iter()
                    .map(|y| y.map(|y| y.to_string()).unwrap_or_else(|| ".".to_string()))
                    .collect(),
            ),
        );

        vc.filters.clear();
        if yngs.iter().any(|y| *y == Some(YngStatus::Yay)) {
            vc.filter(PASS_FILTER_NAME);
        } else if yngs.iter().any(|y| *y == Some(YngStatus::Nay)) {
            vc.filter(NAY_FILTER_NAME);
        } else if yngs.iter().any(|y| *y == Some(YngStatus::Gray)) {
            self.apply_tranche_filters(vc, &vqslods);
        } else {
            // VQSR never saw this site
            vc.filter(NAY_FILTER_NAME);
        }
    }

    fn apply_tranche_filters(&self, vc: &mut VariantContext, vqslods: &[Option<f64>]) {
        let snp_max = self.class_max(vc, vqslods, true);
        let indel_max = self.class_max(vc, vqslods, false);

        let mut filtered = false;
        if let Some(snp_max) = snp_max {
            if snp_max < self.vqslod_snp_threshold {
                vc.filter(VQSR_TRANCHE_SNP_FILTER_NAME);
                filtered = true;
            }
        }
        if let Some(indel_max) = indel_max {
            if indel_max < self.vqslod_indel_threshold {
                vc.filter(VQSR_TRANCHE_INDEL_FILTER_NAME);
                filtered = true;
            }
        }
        if !filtered {
            vc.filter(PASS_FILTER_NAME);
        }
    }

    /// Max scored VQSLOD over the SNP-length or indel-length alternates.
    fn class_max(&self, vc: &VariantContext, vqslods: &[Option<f64>], snp: bool) -> Option<f64> {
        vc.get_alternate_alleles()
            .iter()
            .zip(vqslods.iter())
            .filter(|(alt, _)| alt.is_concrete() && vc.is_snp_alt(alt) == snp)
            .filter_map(|(_, v)| *v)
            .max_by_key(|v| OrderedFloat(*v))
    }
}

/**
 * Re-express a filter entry's alt in the call's reference frame. An entry
 * with a shorter reference gets the call's reference suffix appended; an
 * entry with a longer reference describes a deletion the cohort no longer
 * carries and is discarded.
 */
fn remap_alt(merged_ref: &[u8], entry: &FilterMapEntry) -> Option<Vec<u8>> {
    let entry_ref = entry.ref_allele.as_bytes();
    let entry_alt = entry.alt_allele.as_bytes();
    if entry_ref.len() > merged_ref.len() {
        return None;
    }
    if &merged_ref[..entry_ref.len()] != entry_ref {
        return None;
    }
    if entry_ref.len() == merged_ref.len() {
        return Some(entry_alt.to_vec());
    }
    if entry_alt == b"*" {
        return Some(entry_alt.to_vec());
    }
    let mut padded = entry_alt.to_vec();
    padded.extend_from_slice(&merged_ref[entry_ref.len()..]);
    Some(padded)
}
