use rust_htslib::bcf::record::{GenotypeAllele, Numeric};
use rust_htslib::bcf::{Format, Header, Writer};

use crate::genotype::genotype_builder::{AttributeObject, Genotype};
use crate::model::variant_context::VariantContext;
use crate::reference::reference_reader::ContigDictionary;
use crate::utils::errors::ExtractError;
use crate::utils::vcf_constants::*;

/// INFO keys written in declaration order.
const INFO_LINES: &[&[u8]] = &[
    br#"##INFO=<ID=QUALapprox,Number=1,Type=Integer,Description="Sum of PL[0] values; used to approximate the QUAL score">"#,
    br#"##INFO=<ID=AS_QUALapprox,Number=1,Type=String,Description="Allele-specific QUAL approximations">"#,
    br#"##INFO=<ID=AC,Number=A,Type=Integer,Description="Allele count in genotypes, for each ALT allele">"#,
    br#"##INFO=<ID=AF,Number=A,Type=Float,Description="Allele Frequency, for each ALT allele">"#,
    br#"##INFO=<ID=AN,Number=1,Type=Integer,Description="Total number of alleles in called genotypes">"#,
    br#"##INFO=<ID=MLEAC,Number=A,Type=Integer,Description="Maximum likelihood expectation (MLE) for the allele counts">"#,
    br#"##INFO=<ID=MLEAF,Number=A,Type=Float,Description="Maximum likelihood expectation (MLE) for the allele frequency">"#,
    br#"##INFO=<ID=AS_VQSLOD,Number=A,Type=Float,Description="Allele-specific log-odds score from the filtering model">"#,
    br#"##INFO=<ID=AS_YNG_STATUS,Number=A,Type=String,Description="Allele-specific YNG filtering label">"#,
];

const FORMAT_LINES: &[&[u8]] = &[
    br#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#,
    br#"##FORMAT=<ID=GQ,Number=1,Type=Integer,Description="Genotype Quality">"#,
    br#"##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Approximate read depth">"#,
    br#"##FORMAT=<ID=AD,Number=R,Type=Integer,Description="Allelic depths for the ref and alt alleles">"#,
    br#"##FORMAT=<ID=PL,Number=G,Type=Integer,Description="Normalized, phred-scaled genotype likelihoods">"#,
    br#"##FORMAT=<ID=RGQ,Number=1,Type=Integer,Description="Unconditional reference genotype confidence">"#,
];

const FILTER_LINES: &[&[u8]] = &[
    br#"##FILTER=<ID=NAY,Description="Site failed or was never scored by the filtering model">"#,
    br#"##FILTER=<ID=VQSRTrancheSNP,Description="Best SNP VQSLOD below the SNP sensitivity threshold">"#,
    br#"##FILTER=<ID=VQSRTrancheINDEL,Description="Best indel VQSLOD below the indel sensitivity threshold">"#,
];

/**
 * Streaming VCF writer: header assembled from the contig dictionary and the
 * cohort sample list, records appended in (contig, position) order as the
 * engine emits them.
 */
pub struct VcfSink {
    writer: Writer,
    contig_names: Vec<String>,
    emit_pls: bool,
}

impl VcfSink {
    pub fn create(
        output_path: &str,
        dict: &ContigDictionary,
        cohort: &[String],
        emit_pls: bool,
    ) -> Result<VcfSink, ExtractError> {
        let mut header = Header::new();
        for (name, length) in dict.iter() {
            header.push_record(format!(r#"##contig=<ID={},length={}>"#, name, length).as_bytes());
        }
        for line in INFO_LINES {
            header.push_record(line);
        }
        for line in FORMAT_LINES {
            header.push_record(line);
        }
        for line in FILTER_LINES {
            header.push_record(line);
        }
        for sample in cohort {
            header.push_sample(sample.as_bytes());
        }

        let writer = if output_path == "-" {
            Writer::from_stdout(&header, true, Format::Vcf)
        } else {
            Writer::from_path(output_path, &header, true, Format::Vcf)
        }
        .map_err(|e| ExtractError::VcfWrite(e.to_string()))?;

        Ok(VcfSink {
            writer,
            contig_names: dict.iter().map(|(name, _)| name.to_string()).collect(),
            emit_pls,
        })
    }

    pub fn write(&mut self, vc: &VariantContext) -> Result<(), ExtractError> {
        let vcf_err = |e: rust_htslib::errors::Error| ExtractError::VcfWrite(e.to_string());

        let mut record = self.writer.empty_record();
        let contig_name = self
            .contig_names
            .get(vc.contig)
            .ok_or_else(|| ExtractError::VcfWrite(format!("contig index {}", vc.contig)))?;
        let rid = self
            .writer
            .header()
            .name2rid(contig_name.as_bytes())
            .map_err(vcf_err)?;
        record.set_rid(Some(rid));
        record.set_pos(vc.start as i64 - 1);

        let alleles: Vec<&[u8]> = vc.alleles.iter().map(|a| a.get_bases()).collect();
        record.set_alleles(&alleles).map_err(vcf_err)?;
        if vc.qual.is_finite() {
            record.set_qual(vc.qual as f32);
        }

        for filter in &vc.filters {
            record.push_filter(filter.as_bytes()).map_err(vcf_err)?;
        }

        self.write_info(&mut record, vc).map_err(vcf_err)?;
        self.write_formats(&mut record, vc).map_err(vcf_err)?;

        self.writer.write(&record).map_err(vcf_err)
    }

    fn write_info(
        &self,
        record: &mut rust_htslib::bcf::Record,
        vc: &VariantContext,
    ) -> Result<(), rust_htslib::errors::Error> {
        for key in [
            QUAL_APPROX_KEY,
            AS_QUAL_APPROX_KEY,
            ALLELE_COUNT_KEY,
            ALLELE_FREQUENCY_KEY,
            ALLELE_NUMBER_KEY,
            MLE_ALLELE_COUNT_KEY,
            MLE_ALLELE_FREQUENCY_KEY,
            AS_VQSLOD_KEY,
            AS_YNG_STATUS_KEY,
        ] {
            let value = match vc.get_attribute(key) {
                Some(v) => v,
                None => continue,
            };
            let tag = key.as_bytes();
            match value {
                AttributeObject::Integer(v) => {
                    record.push_info_integer(tag, &[*v as i32])?;
                }
                AttributeObject::Float(v) => {
                    record.push_info_float(tag, &[*v as f32])?;
                }
                AttributeObject::String(v) => {
                    record.push_info_string(tag, &[v.as_bytes()])?;
                }
                AttributeObject::VecInteger(v) => {
                    let values: Vec<i32> = v.iter().map(|x| *x as i32).collect();
                    record.push_info_integer(tag, &values)?;
                }
                AttributeObject::VecFloat(v) => {
                    let values: Vec<f32> = v.iter().map(|x| *x as f32).collect();
                    record.push_info_float(tag, &values)?;
                }
                AttributeObject::VecFloatOpt(v) => {
                    let values: Vec<f32> = v
                        .iter()
                        .map(|x| x.map(|x| x as f32).unwrap_or_else(f32::missing))
                        .collect();
                    record.push_info_float(tag, &values)?;
                }
                AttributeObject::VecString(v) => {
                    let values: Vec<&[u8]> = v.iter().map(|s| s.as_bytes()).collect();
                    record.push_info_string(tag, &values)?;
                }
            }
        }
        Ok(())
    }

    fn write_formats(
        &self,
        record: &mut rust_htslib::bcf::Record,
        vc: &VariantContext,
    ) -> Result<(), rust_htslib::errors::Error> {
        let genotypes = vc.genotypes.genotypes();
        let n_alleles = vc.alleles.len();

        let mut gt_alleles = Vec::with_capacity(genotypes.len() * 2);
        for genotype in genotypes {
            let mut slots = Vec::with_capacity(2);
            for allele in &genotype.alleles {
                if allele.is_no_call() {
                    slots.push(None);
                } else {
                    slots.push(vc.allele_index(allele).map(|i| i as i32));
                }
            }
            slots.resize(2, None);
            for (i, slot) in slots.into_iter().take(2).enumerate() {
                let phased = genotype.is_phased && i > 0;
                gt_alleles.push(match (slot, phased) {
                    (Some(index), false) => GenotypeAllele::Unphased(index),
                    (Some(index), true) => GenotypeAllele::Phased(index),
                    (None, false) => GenotypeAllele::UnphasedMissing,
                    (None, true) => GenotypeAllele::PhasedMissing,
                });
            }
        }
        record.push_genotypes(&gt_alleles)?;

        let int_or_missing = |v: i64| {
            if v == Genotype::MISSING {
                i32::missing()
            } else {
                v as i32
            }
        };

        let gqs: Vec<i32> = genotypes.iter().map(|g| int_or_missing(g.gq)).collect();
        record.push_format_integer(b"GQ", &gqs)?;

        if genotypes.iter().any(|g| g.dp != Genotype::MISSING) {
            let dps: Vec<i32> = genotypes.iter().map(|g| int_or_missing(g.dp)).collect();
            record.push_format_integer(b"DP", &dps)?;
        }
        if genotypes.iter().any(|g| g.rgq != Genotype::MISSING) {
            let rgqs: Vec<i32> = genotypes.iter().map(|g| int_or_missing(g.rgq)).collect();
            record.push_format_integer(b"RGQ", &rgqs)?;
        }

        if genotypes.iter().any(|g| g.has_ad()) {
            let mut ads = Vec::with_capacity(genotypes.len() * n_alleles);
            for genotype in genotypes {
                if genotype.ad.len() == n_alleles {
                    ads.extend(genotype.ad.iter().map(|v| *v as i32));
                } else {
                    ads.extend(std::iter::repeat(i32::missing()).take(n_alleles));
                }
            }
            record.push_format_integer(b"AD", &ads)?;
        }

        if self.emit_pls {
            let n_likelihoods = n_alleles * (n_alleles + 1) / 2;
            if genotypes.iter().any(|g| g.has_likelihoods()) {
                let mut pls = Vec::with_capacity(genotypes.len() * n_likelihoods);
                for genotype in genotypes {
                    if genotype.pl.len() == n_likelihoods {
                        pls.extend(genotype.pl.iter().map(|v| *v as i32));
                    } else {
                        pls.extend(std::iter::repeat(i32::missing()).take(n_likelihoods));
                    }
                }
                record.push_format_integer(b"PL", &pls)?;
            }
        }

        Ok(())
    }
}
