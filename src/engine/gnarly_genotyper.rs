use itertools::Itertools;

use crate::genotype::genotype_builder::{AttributeObject, Genotype};
use crate::model::byte_array_allele::ByteArrayAllele;
use crate::model::variant_context::VariantContext;
use crate::utils::math_utils::MathUtils;
use crate::utils::vcf_constants::*;

const MAX_GQ: i64 = 99;

/**
 * Deterministic finalization of a merged call: re-derives GT/GQ from the
 * remapped likelihoods, strips the `<NON_REF>` pseudo-allele, and attaches
 * the site-level allele accounting. Returns None to suppress the call when
 * nothing concrete remains to report.
 */
pub struct GnarlyGenotyper {
    emit_pls: bool,
}

impl GnarlyGenotyper {
    pub fn new(emit_pls: bool) -> GnarlyGenotyper {
        GnarlyGenotyper { emit_pls }
    }

    pub fn finalize(&self, mut vc: VariantContext) -> Option<VariantContext> {
        let merged_count = vc.alleles.len();
        let non_ref_index = vc.alleles.iter().position(|a| a.is_non_ref());

        let final_alleles: Vec<ByteArrayAllele> = vc
            .alleles
            .iter()
            .filter(|a| !a.is_non_ref())
            .cloned()
            .collect();
        // nothing concrete to report: reference plus pseudo-allele only, or
        // alts that are all spanning deletions
        if final_alleles.len() <= 1
            || final_alleles.iter().skip(1).all(|a| a.is_span_del())
        {
            return None;
        }

        let expected_pls = MathUtils::num_diploid_genotypes(merged_count);
        for genotype in vc.genotypes.genotypes_mut() {
            if genotype.pl.len() == expected_pls {
                Self::assign_from_likelihoods(genotype, &vc.alleles, non_ref_index);
                Self::subset_arrays(genotype, merged_count, non_ref_index, self.emit_pls);
            } else {
                genotype.pl = Vec::new();
                // a parsed genotype may still point at the pseudo-allele
                if genotype.alleles.iter().any(|a| a.is_non_ref()) {
                    let ploidy = genotype.get_ploidy().max(2);
                    genotype.no_call_alleles(ploidy);
                    genotype.gq = Genotype::MISSING;
                }
                if genotype.ad.len() == merged_count {
                    if let Some(idx) = non_ref_index {
                        genotype.ad.remove(idx);
                    }
                }
            }
        }

        vc.alleles = final_alleles;

        let alt_count = vc.alleles.len() - 1;
        let an = vc.genotypes.called_allele_number();
        let counts = vc.genotypes.allele_counts(&vc.alleles);
        let ac: Vec<i64> = counts.iter().skip(1).copied().collect();
        let af: Vec<f64> = ac
            .iter()
            .map(|&c| if an > 0 { c as f64 / an as f64 } else { 0.0 })
            .collect();
        debug_assert_eq!(ac.len(), alt_count);

        // per-alt QUALapprox components render as the pipe-joined raw string
        if let Some(AttributeObject::VecFloatOpt(components)) =
            vc.attributes.remove(AS_QUAL_APPROX_KEY)
        {
            let rendered = components
                .iter()
                .take(alt_count)
                .map(|c| match c {
                    Some(v) => format!("{}", v.round() as i64),
                    None => ".".to_string(),
                })
                .join("|");
            vc.set_attribute(AS_QUAL_APPROX_KEY, AttributeObject::String(rendered));
        }

        vc.set_attribute(ALLELE_COUNT_KEY, AttributeObject::VecInteger(ac.clone()));
        vc.set_attribute(ALLELE_NUMBER_KEY, AttributeObject::Integer(an));
        vc.set_attribute(ALLELE_FREQUENCY_KEY, AttributeObject::VecFloat(af.clone()));
        vc.set_attribute(MLE_ALLELE_COUNT_KEY, AttributeObject::VecInteger(ac));
        vc.set_attribute(MLE_ALLELE_FREQUENCY_KEY, AttributeObject::VecFloat(af));

        Some(vc)
    }

    /**
     * Pick the maximum-likelihood genotype from the PL array. A winning
     * genotype that references the pseudo-allele is forced to a no-call, as
     * the evidence says "some other allele" that the cohort never resolved.
     */
    fn assign_from_likelihoods(
        genotype: &mut Genotype,
        merged_alleles: &[ByteArrayAllele],
        non_ref_index: Option<usize>,
    ) {
        let best = MathUtils::min_element_index(&genotype.pl);
        let (j, k) = MathUtils::diploid_gl_pair(best);
        if Some(j) == non_ref_index || Some(k) == non_ref_index {
            genotype.no_call_alleles(2);
            genotype.gq = Genotype::MISSING;
            return;
        }
        genotype.alleles = vec![merged_alleles[j].clone(), merged_alleles[k].clone()];
        let second = MathUtils::min_element_excluding(&genotype.pl, best);
        if second < i64::MAX {
            genotype.gq = (second - genotype.pl[best]).min(MAX_GQ);
        }
    }

    /// Drop the pseudo-allele components from PL and AD, renormalizing PLs.
    fn subset_arrays(
        genotype: &mut Genotype,
        merged_count: usize,
        non_ref_index: Option<usize>,
        emit_pls: bool,
    ) {
        let non_ref_index = match non_ref_index {
            Some(idx) => idx,
            None => return,
        };
        if !emit_pls {
            genotype.pl = Vec::new();
        } else {
            let mut subset = Vec::with_capacity(MathUtils::num_diploid_genotypes(merged_count - 1));
            for k in 0..merged_count {
                if k == non_ref_index {
                    continue;
                }
                for j in 0..=k {
                    if j == non_ref_index {
                        continue;
                    }
                    subset.push(genotype.pl[MathUtils::diploid_gl_index(j, k)]);
                }
            }
            let min = subset.iter().copied().min().unwrap_or(0);
            for pl in subset.iter_mut() {
                *pl -= min;
            }
            genotype.pl = subset;
        }
        if genotype.ad.len() == merged_count {
            genotype.ad.remove(non_ref_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::genotype_builder::GenotypesContext;
    use crate::model::byte_array_allele::NON_REF_ALLELE;

    fn merged_snp() -> VariantContext {
        let alleles = vec![
            ByteArrayAllele::new(b"A", true),
            ByteArrayAllele::new(b"C", false),
            NON_REF_ALLELE.clone(),
        ];
        let mut vc = VariantContext::build(0, 100, alleles);
        vc.qual = 500.0;
        vc
    }

    fn het_genotype(vc: &VariantContext) -> Genotype {
        let mut g = Genotype::build_from_alleles(
            "s1".to_string(),
            vec![vc.alleles[0].clone(), vc.alleles[1].clone()],
        );
        // PLs over A, C, <NON_REF>: het A/C is best
        g.pl = vec![40, 0, 60, 45, 70, 90];
        g
    }

    #[test]
    fn reassigns_genotype_from_likelihoods() {
        let mut vc = merged_snp();
        let g = het_genotype(&vc);
        vc.genotypes = GenotypesContext::new(vec![g]);

        let out = GnarlyGenotyper::new(false).finalize(vc).unwrap();
        assert_eq!(out.alleles.len(), 2);
        let g = &out.genotypes.genotypes()[0];
        assert_eq!(g.alleles[0].get_bases(), b"A");
        assert_eq!(g.alleles[1].get_bases(), b"C");
        assert_eq!(g.gq, 40);
        assert!(g.pl.is_empty());
    }

    #[test]
    fn non_ref_winner_becomes_no_call() {
        let mut vc = merged_snp();
        let mut g = het_genotype(&vc);
        // best likelihood is (A, <NON_REF>)
        g.pl = vec![40, 30, 60, 0, 70, 90];
        vc.genotypes = GenotypesContext::new(vec![g]);

        let out = GnarlyGenotyper::new(false).finalize(vc).unwrap();
        let g = &out.genotypes.genotypes()[0];
        assert!(g.alleles.iter().all(|a| a.is_no_call()));
    }

    #[test]
    fn suppresses_ref_only_sites() {
        let alleles = vec![ByteArrayAllele::new(b"A", true), NON_REF_ALLELE.clone()];
        let mut vc = VariantContext::build(0, 100, alleles);
        vc.genotypes = GenotypesContext::new(vec![Genotype::ref_block(
            "s1".to_string(),
            ByteArrayAllele::new(b"A", true),
            Some(60),
        )]);
        assert!(GnarlyGenotyper::new(false).finalize(vc).is_none());
    }

    #[test]
    fn computes_allele_accounting() {
        let mut vc = merged_snp();
        let g = het_genotype(&vc);
        let mut hom_ref = Genotype::ref_block(
            "s2".to_string(),
            vc.alleles[0].clone(),
            Some(60),
        );
        hom_ref.pl = Vec::new();
        vc.genotypes = GenotypesContext::new(vec![g, hom_ref]);

        let out = GnarlyGenotyper::new(false).finalize(vc).unwrap();
        match out.get_attribute(ALLELE_COUNT_KEY) {
            Some(AttributeObject::VecInteger(ac)) => assert_eq!(ac, &vec![1]),
            other => panic!("unexpected AC {:?}", other),
        }
        match out.get_attribute(ALLELE_NUMBER_KEY) {
            Some(AttributeObject::Integer(an)) => assert_eq!(*an, 4),
            other => panic!("unexpected AN {:?}", other),
        }
    }

    #[test]
    fn emit_pls_subsets_and_normalizes() {
        let mut vc = merged_snp();
        let g = het_genotype(&vc);
        vc.genotypes = GenotypesContext::new(vec![g]);

        let out = GnarlyGenotyper::new(true).finalize(vc).unwrap();
        let g = &out.genotypes.genotypes()[0];
        assert_eq!(g.pl, vec![40, 0, 60]);
    }
}
