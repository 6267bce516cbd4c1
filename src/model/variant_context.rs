use std::collections::{BTreeSet, HashMap};

use crate::genotype::genotype_builder::{AttributeObject, GenotypesContext};
use crate::model::byte_array_allele::ByteArrayAllele;

/**
 * A multi-sample call at one locus: reference allele, ordered alternates,
 * one genotype per cohort sample and the site-level attributes accumulated
 * along the pipeline. Also used single-sample as the unit the locus
 * assembler builds per record before merging.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct VariantContext {
    /// Contig index in the reference dictionary.
    pub contig: usize,
    /// 1-based start position.
    pub start: u64,
    /// Alleles with the reference at index 0.
    pub alleles: Vec<ByteArrayAllele>,
    pub genotypes: GenotypesContext,
    /// Phred-scaled site quality; NaN when unset.
    pub qual: f64,
    pub filters: BTreeSet<String>,
    pub attributes: HashMap<String, AttributeObject>,
}

impl VariantContext {
    pub fn build(
        contig: usize,
        start: u64,
        alleles: Vec<ByteArrayAllele>,
    ) -> VariantContext {
        VariantContext {
            contig,
            start,
            alleles,
            genotypes: GenotypesContext::empty(),
            qual: f64::NAN,
            filters: BTreeSet::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn get_reference(&self) -> &ByteArrayAllele {
        &self.alleles[0]
    }

    pub fn get_alternate_alleles(&self) -> &[ByteArrayAllele] {
        &self.alleles[1..]
    }

    pub fn get_n_alleles(&self) -> usize {
        self.alleles.len()
    }

    pub fn get_n_samples(&self) -> usize {
        self.genotypes.len()
    }

    /// 1-based inclusive stop; `start + len(ref) - 1`.
    pub fn end(&self) -> u64 {
        self.start + self.get_reference().length() as u64 - 1
    }

    pub fn allele_index(&self, allele: &ByteArrayAllele) -> Option<usize> {
        self.alleles.iter().position(|a| a == allele)
    }

    pub fn has_non_ref_allele(&self) -> bool {
        self.alleles.iter().any(|a| a.is_non_ref())
    }

    /// A SNP-class alternate: concrete bases of the same length as the reference.
    pub fn is_snp_alt(&self, alt: &ByteArrayAllele) -> bool {
        alt.is_concrete() && alt.length() == self.get_reference().length()
    }

    pub fn set_attribute(&mut self, key: &str, value: AttributeObject) {
        self.attributes.insert(key.to_string(), value);
    }

    pub fn get_attribute(&self, key: &str) -> Option<&AttributeObject> {
        self.attributes.get(key)
    }

    pub fn filter(&mut self, name: &str) {
        self.filters.insert(name.to_string());
    }

    pub fn is_filtered(&self) -> bool {
        !self.filters.is_empty()
    }
}
