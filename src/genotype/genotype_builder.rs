use std::collections::HashMap;

use crate::model::byte_array_allele::ByteArrayAllele;

/// Site-level attribute payloads attached to a merged call.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeObject {
    Integer(i64),
    Float(f64),
    String(String),
    VecInteger(Vec<i64>),
    VecFloat(Vec<f64>),
    VecString(Vec<String>),
    /// Per-alt float array where absent entries must survive as missing.
    VecFloatOpt(Vec<Option<f64>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Genotype {
    pub sample_name: String,
    /// Called alleles in the representation of the enclosing context. Length
    /// is the ploidy; no-call slots hold the no-call allele.
    pub alleles: Vec<ByteArrayAllele>,
    pub is_phased: bool,
    pub gq: i64,
    pub dp: i64,
    pub rgq: i64,
    pub ad: Vec<i64>,
    pub pl: Vec<i64>,
}

impl Genotype {
    pub const MISSING: i64 = -1;

    pub fn build_from_alleles(sample_name: String, alleles: Vec<ByteArrayAllele>) -> Genotype {
        Genotype {
            sample_name,
            alleles,
            is_phased: false,
            gq: Genotype::MISSING,
            dp: Genotype::MISSING,
            rgq: Genotype::MISSING,
            ad: Vec::new(),
            pl: Vec::new(),
        }
    }

    /// Homozygous-reference genotype used for ref blocks and synthesized
    /// samples. `gq` of None encodes GQ-absent (array data).
    pub fn ref_block(sample_name: String, ref_allele: ByteArrayAllele, gq: Option<i64>) -> Genotype {
        let mut gt =
            Genotype::build_from_alleles(sample_name, vec![ref_allele.clone(), ref_allele]);
        if let Some(gq) = gq {
            gt.gq = gq;
        }
        gt
    }

    pub fn no_call(sample_name: String) -> Genotype {
        Genotype::build_from_alleles(
            sample_name,
            vec![ByteArrayAllele::no_call(), ByteArrayAllele::no_call()],
        )
    }

    pub fn get_ploidy(&self) -> usize {
        self.alleles.len()
    }

    pub fn has_gq(&self) -> bool {
        self.gq != Genotype::MISSING
    }

    pub fn has_likelihoods(&self) -> bool {
        !self.pl.is_empty()
    }

    pub fn has_ad(&self) -> bool {
        !self.ad.is_empty()
    }

    pub fn is_called(&self) -> bool {
        !self.alleles.is_empty() && self.alleles.iter().all(|a| !a.is_no_call())
    }

    pub fn no_call_alleles(&mut self, ploidy: usize) {
        self.alleles = vec![ByteArrayAllele::no_call(); ploidy];
    }
}

/// Ordered multi-sample genotype container. Order is the cohort order and is
/// preserved through every transformation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenotypesContext {
    genotypes: Vec<Genotype>,
}

impl GenotypesContext {
    pub fn empty() -> GenotypesContext {
        GenotypesContext {
            genotypes: Vec::new(),
        }
    }

    pub fn create(size: usize) -> GenotypesContext {
        GenotypesContext {
            genotypes: Vec::with_capacity(size),
        }
    }

    pub fn new(genotypes: Vec<Genotype>) -> GenotypesContext {
        GenotypesContext { genotypes }
    }

    pub fn add(&mut self, genotype: Genotype) {
        self.genotypes.push(genotype)
    }

    pub fn is_empty(&self) -> bool {
        self.genotypes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.genotypes.len()
    }

    pub fn genotypes(&self) -> &Vec<Genotype> {
        &self.genotypes
    }

    pub fn genotypes_mut(&mut self) -> &mut Vec<Genotype> {
        &mut self.genotypes
    }

    /// Count of called allele copies, the AN of the site.
    pub fn called_allele_number(&self) -> i64 {
        self.genotypes
            .iter()
            .flat_map(|g| g.alleles.iter())
            .filter(|a| !a.is_no_call())
            .count() as i64
    }

    /// Per-allele called copy counts against `alleles`.
    pub fn allele_counts(&self, alleles: &[ByteArrayAllele]) -> Vec<i64> {
        let mut counts = vec![0i64; alleles.len()];
        let index: HashMap<&ByteArrayAllele, usize> =
            alleles.iter().enumerate().map(|(i, a)| (a, i)).collect();
        for genotype in &self.genotypes {
            for allele in &genotype.alleles {
                if allele.is_no_call() {
                    continue;
                }
                if let Some(&i) = index.get(allele) {
                    counts[i] += 1;
                }
            }
        }
        counts
    }
}
