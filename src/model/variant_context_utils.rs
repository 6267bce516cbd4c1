use std::collections::HashMap;

use crate::genotype::genotype_builder::{AttributeObject, Genotype, GenotypesContext};
use crate::model::byte_array_allele::{ByteArrayAllele, NON_REF_ALLELE};
use crate::model::variant_context::VariantContext;
use crate::utils::math_utils::MathUtils;
use crate::utils::vcf_constants::AS_QUAL_APPROX_KEY;

/**
 * One sample's contribution to a locus before merging: the sample's own
 * allele representation (reference first, `<NON_REF>` last) and its single
 * genotype expressed against those alleles.
 */
#[derive(Debug, Clone)]
pub struct PerSampleCall {
    pub alleles: Vec<ByteArrayAllele>,
    pub genotype: Genotype,
    /// Per-allele QUALapprox components aligned to `alleles`; empty for ref
    /// blocks and synthesized samples.
    pub as_qual_approx: Vec<Option<f64>>,
}

impl PerSampleCall {
    pub fn new(alleles: Vec<ByteArrayAllele>, genotype: Genotype) -> PerSampleCall {
        PerSampleCall {
            alleles,
            genotype,
            as_qual_approx: Vec::new(),
        }
    }

    fn reference(&self) -> &ByteArrayAllele {
        &self.alleles[0]
    }

    /// Re-express this call against a longer reference by appending the
    /// missing reference suffix to every concrete allele, genotype included.
    fn pad_to_reference(&mut self, merged_ref: &[u8]) {
        let own_len = self.reference().length();
        if own_len >= merged_ref.len() {
            return;
        }
        let suffix = &merged_ref[own_len..];
        for allele in self.alleles.iter_mut() {
            *allele = allele.extended(suffix);
        }
        for allele in self.genotype.alleles.iter_mut() {
            *allele = allele.extended(suffix);
        }
    }
}

/**
 * Merge per-sample calls into one multi-sample context.
 *
 * The merged reference is the longest per-sample reference; every shorter
 * representation is left-anchored and padded out to it. The merged alt list
 * is the union in first-seen order, keeping `*` only when some genotype
 * references it, with `<NON_REF>` always last. Each sample's PL array is
 * remapped into the merged allele space, routing alleles the sample never
 * saw through its `<NON_REF>` likelihoods; AD components for such alleles
 * are dense zeros.
 *
 * Samples whose reference disagrees with the merged reference prefix are
 * demoted to no-calls rather than aborting the locus.
 */
pub fn merge_calls(contig: usize, start: u64, mut calls: Vec<PerSampleCall>) -> VariantContext {
    assert!(!calls.is_empty(), "cannot merge an empty locus");

    let merged_ref = calls
        .iter()
        .map(|c| c.reference())
        .max_by_key(|r| r.length())
        .cloned()
        .map(|mut r| {
            r.is_ref = true;
            r
        })
        .unwrap();

    for call in calls.iter_mut() {
        let own = call.reference().get_bases().to_vec();
        if merged_ref.get_bases()[..own.len().min(merged_ref.length())] != own[..] {
            warn!(
                "Sample {} reference {} disagrees with locus reference {}; genotype set to no-call",
                call.genotype.sample_name,
                String::from_utf8_lossy(&own),
                merged_ref,
            );
            let ploidy = call.genotype.get_ploidy().max(2);
            call.genotype.no_call_alleles(ploidy);
            call.alleles = vec![merged_ref.clone(), NON_REF_ALLELE.clone()];
            call.genotype.ad = Vec::new();
            call.genotype.pl = Vec::new();
            call.as_qual_approx = Vec::new();
            continue;
        }
        call.pad_to_reference(merged_ref.get_bases());
    }

    // union of alternates in first-seen order; star retention decided below
    let mut alts: Vec<ByteArrayAllele> = Vec::new();
    for call in calls.iter() {
        for allele in call.alleles.iter().skip(1) {
            if allele.is_non_ref() {
                continue;
            }
            if !alts.contains(allele) {
                alts.push(allele.clone());
            }
        }
    }
    let star_referenced = calls.iter().any(|c| {
        c.genotype
            .alleles
            .iter()
            .any(|a| a.is_span_del())
    });
    if !star_referenced {
        alts.retain(|a| !a.is_span_del());
    }

    let mut merged_alleles = Vec::with_capacity(alts.len() + 2);
    merged_alleles.push(merged_ref.clone());
    merged_alleles.extend(alts);
    merged_alleles.push(NON_REF_ALLELE.clone());

    // accumulate per-alt QUALapprox components in the merged allele frame
    let mut alt_qual_sums: Vec<Option<f64>> = vec![None; merged_alleles.len()];
    for call in calls.iter() {
        for (i, component) in call.as_qual_approx.iter().enumerate() {
            let component = match component {
                Some(c) => *c,
                None => continue,
            };
            let allele = match call.alleles.get(i) {
                Some(a) if !a.is_reference() && !a.is_non_ref() && !a.is_span_del() => a,
                _ => continue,
            };
            if let Some(target) = merged_alleles.iter().position(|a| a == allele) {
                *alt_qual_sums[target].get_or_insert(0.0) += component;
            }
        }
    }

    let mut genotypes = GenotypesContext::create(calls.len());
    for call in calls.into_iter() {
        genotypes.add(remap_genotype(call, &merged_alleles));
    }

    let alt_components: Vec<Option<f64>> =
        alt_qual_sums[1..merged_alleles.len() - 1].to_vec();
    let mut vc = VariantContext::build(contig, start, merged_alleles);
    vc.genotypes = genotypes;
    if alt_components.iter().any(|c| c.is_some()) {
        vc.set_attribute(
            AS_QUAL_APPROX_KEY,
            AttributeObject::VecFloatOpt(alt_components),
        );
    }
    vc
}

/// Rewrite one padded call's PL and AD arrays into the merged allele space.
fn remap_genotype(call: PerSampleCall, merged_alleles: &[ByteArrayAllele]) -> Genotype {
    let mut genotype = call.genotype;

    let sample_index: HashMap<&ByteArrayAllele, usize> = call
        .alleles
        .iter()
        .enumerate()
        .map(|(i, a)| (a, i))
        .collect();
    let non_ref_index = call
        .alleles
        .iter()
        .position(|a| a.is_non_ref())
        .unwrap_or(call.alleles.len() - 1);

    let merged_to_sample: Vec<usize> = merged_alleles
        .iter()
        .map(|a| sample_index.get(a).copied().unwrap_or(non_ref_index))
        .collect();

    if genotype.pl.len() == MathUtils::num_diploid_genotypes(call.alleles.len()) {
        let n = merged_alleles.len();
        let mut remapped = vec![0i64; MathUtils::num_diploid_genotypes(n)];
        for k in 0..n {
            for j in 0..=k {
                let source = MathUtils::diploid_gl_index(merged_to_sample[j], merged_to_sample[k]);
                remapped[MathUtils::diploid_gl_index(j, k)] = genotype.pl[source];
            }
        }
        genotype.pl = remapped;
    } else {
        genotype.pl = Vec::new();
    }

    if genotype.ad.len() == call.alleles.len() {
        let remapped: Vec<i64> = merged_alleles
            .iter()
            .map(|a| sample_index.get(a).map(|&s| genotype.ad[s]).unwrap_or(0))
            .collect();
        genotype.ad = remapped;
    } else {
        genotype.ad = Vec::new();
    }

    genotype
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::byte_array_allele::NON_REF_ALLELE;

    fn variant_call(sample: &str, ref_bases: &[u8], alts: &[&[u8]], gt: (usize, usize)) -> PerSampleCall {
        let mut alleles = vec![ByteArrayAllele::new(ref_bases, true)];
        for alt in alts {
            alleles.push(ByteArrayAllele::new(alt, false));
        }
        alleles.push(NON_REF_ALLELE.clone());
        let genotype = Genotype::build_from_alleles(
            sample.to_string(),
            vec![alleles[gt.0].clone(), alleles[gt.1].clone()],
        );
        PerSampleCall::new(alleles, genotype)
    }

    #[test]
    fn merges_disjoint_alts_in_first_seen_order() {
        let a = variant_call("a", b"A", &[b"C"], (0, 1));
        let b = variant_call("b", b"A", &[b"G"], (1, 1));
        let vc = merge_calls(0, 100, vec![a, b]);

        let alleles: Vec<String> = vc.alleles.iter().map(|a| a.to_string()).collect();
        assert_eq!(alleles, vec!["A", "C", "G", "<NON_REF>"]);
        assert_eq!(vc.genotypes.len(), 2);
    }

    #[test]
    fn pads_shorter_references() {
        // deletion sample defines the longer reference
        let del = variant_call("a", b"AT", &[b"A"], (0, 1));
        let snp = variant_call("b", b"A", &[b"C"], (0, 1));
        let vc = merge_calls(0, 100, vec![del, snp]);

        let alleles: Vec<String> = vc.alleles.iter().map(|a| a.to_string()).collect();
        assert_eq!(alleles, vec!["AT", "A", "CT", "<NON_REF>"]);

        // the SNP sample's genotype now points at the padded allele
        let gt = &vc.genotypes.genotypes()[1];
        assert_eq!(gt.alleles[1].get_bases(), b"CT");
    }

    #[test]
    fn unreferenced_star_is_dropped() {
        let a = variant_call("a", b"A", &[b"C", b"*"], (0, 1));
        let vc = merge_calls(0, 100, vec![a]);
        assert!(vc.alleles.iter().all(|al| !al.is_span_del()));
    }

    #[test]
    fn referenced_star_is_kept() {
        let a = variant_call("a", b"A", &[b"C", b"*"], (1, 2));
        let vc = merge_calls(0, 100, vec![a]);
        assert!(vc.alleles.iter().any(|al| al.is_span_del()));
    }

    #[test]
    fn pl_remap_routes_unseen_alleles_through_non_ref() {
        // sample saw only C; locus also carries G from another sample
        let mut a = variant_call("a", b"A", &[b"C"], (0, 1));
        // alleles: A, C, <NON_REF> -> 6 likelihoods
        a.genotype.pl = vec![50, 0, 90, 60, 95, 99];
        let b = variant_call("b", b"A", &[b"G"], (1, 1));
        let vc = merge_calls(0, 100, vec![a, b]);

        // merged alleles: A, C, G, <NON_REF> -> G maps to sample a's NON_REF
        let pl = &vc.genotypes.genotypes()[0].pl;
        assert_eq!(pl.len(), 10);
        // (A,A), (A,C), (C,C) preserved
        assert_eq!(pl[0], 50);
        assert_eq!(pl[1], 0);
        assert_eq!(pl[2], 90);
        // (A,G) takes the (A,NON_REF) value
        assert_eq!(pl[3], 60);
        // (G,G) takes the (NON_REF,NON_REF) value
        assert_eq!(pl[5], 99);
    }
}
