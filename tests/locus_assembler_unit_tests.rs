extern crate cohort_extract;

use cohort_extract::engine::extract_engine::{ExtractMode, ExtractStats};
use cohort_extract::engine::gnarly_genotyper::GnarlyGenotyper;
use cohort_extract::engine::locus_assembler::LocusAssembler;
use cohort_extract::genotype::genotype_builder::AttributeObject;
use cohort_extract::model::sample_record::{CallState, SampleRecord};
use cohort_extract::model::variant_context::VariantContext;
use cohort_extract::reference::reference_reader::InMemoryReference;

const LOCUS: u64 = 1_000_000_000_005; // contig 1 of the dictionary, position 5

fn reference() -> InMemoryReference {
    // position 5 is 'A'
    InMemoryReference::new(vec![b"CCGTATTACG".to_vec()])
}

fn record(sample: &str, state: CallState) -> SampleRecord {
    SampleRecord {
        location: LOCUS,
        sample_name: sample.to_string(),
        state,
        ref_allele: None,
        alt_alleles: None,
        call_gt: None,
        call_gq: None,
        call_ad: None,
        call_pl: None,
        call_dp: None,
        call_rgq: None,
        qual_approx: None,
        as_qual_approx: None,
        passthrough: Vec::new(),
    }
}

fn snp_record(sample: &str, alt: &str, gt: &str, as_qual: &str) -> SampleRecord {
    let mut r = record(sample, CallState::Variant);
    r.ref_allele = Some("A".to_string());
    r.alt_alleles = Some(alt.to_string());
    r.call_gt = Some(gt.to_string());
    r.as_qual_approx = Some(as_qual.to_string());
    r
}

fn assemble(
    cohort: &[&str],
    records: Vec<SampleRecord>,
    mode: ExtractMode,
) -> (Option<VariantContext>, ExtractStats) {
    let assembler = LocusAssembler::new(mode, cohort.iter().map(|s| s.to_string()).collect());
    let mut stats = ExtractStats::default();
    let vc = assembler
        .assemble(LOCUS, records, &mut reference(), &mut stats)
        .unwrap();
    (vc, stats)
}

fn sample_names(vc: &VariantContext) -> Vec<&str> {
    vc.genotypes
        .genotypes()
        .iter()
        .map(|g| g.sample_name.as_str())
        .collect()
}

#[test]
fn single_snp_two_samples() {
    let (vc, _) = assemble(
        &["A", "B"],
        vec![
            snp_record("A", "C", "0/1", "|500"),
            record("B", CallState::RefBlock(2)),
        ],
        ExtractMode::Genomes,
    );
    let vc = GnarlyGenotyper::new(false).finalize(vc.unwrap()).unwrap();

    assert_eq!(vc.start, 5);
    let alleles: Vec<String> = vc.alleles.iter().map(|a| a.to_string()).collect();
    assert_eq!(alleles, vec!["A", "C"]);

    assert_eq!(sample_names(&vc), vec!["A", "B"]);
    let a = &vc.genotypes.genotypes()[0];
    assert_eq!(a.alleles[0].get_bases(), b"A");
    assert_eq!(a.alleles[1].get_bases(), b"C");
    let b = &vc.genotypes.genotypes()[1];
    assert!(b.alleles.iter().all(|al| al.is_reference()));
    assert_eq!(b.gq, 20);

    match vc.get_attribute("QUALapprox") {
        Some(AttributeObject::Integer(q)) => assert_eq!(*q, 500),
        other => panic!("unexpected QUALapprox {:?}", other),
    }
    assert!(vc.filters.is_empty());
}

#[test]
fn spanning_deletion_loses_to_ref_block() {
    // sample A has both a spanning-deletion marker and a ref block at the
    // locus; the concrete ref block wins
    let (vc, _) = assemble(
        &["A", "B"],
        vec![
            record("A", CallState::SpanningDeletion),
            record("A", CallState::RefBlock(1)),
            snp_record("B", "C", "0/1", "|500"),
        ],
        ExtractMode::Genomes,
    );
    let vc = GnarlyGenotyper::new(false).finalize(vc.unwrap()).unwrap();

    let a = &vc.genotypes.genotypes()[0];
    assert_eq!(a.sample_name, "A");
    assert!(a.alleles.iter().all(|al| al.is_reference()));
    assert_eq!(a.gq, 10);
}

#[test]
fn ref_block_gq_comes_from_state_band_not_call_gq() {
    // the export sometimes carries call_GQ on band rows; the digit wins
    let mut band = record("B", CallState::RefBlock(3));
    band.call_gq = Some(55);
    let (vc, _) = assemble(
        &["A", "B"],
        vec![snp_record("A", "C", "0/1", "|500"), band],
        ExtractMode::Genomes,
    );
    let vc = GnarlyGenotyper::new(false).finalize(vc.unwrap()).unwrap();
    assert_eq!(vc.genotypes.genotypes()[1].gq, 30);
}

#[test]
fn missing_cohort_sample_gets_synthesized_ref_block() {
    let (vc, _) = assemble(
        &["A", "B", "C"],
        vec![
            snp_record("A", "C", "0/1", "|500"),
            record("B", CallState::RefBlock(0)),
        ],
        ExtractMode::Genomes,
    );
    let vc = GnarlyGenotyper::new(false).finalize(vc.unwrap()).unwrap();

    // every cohort sample appears exactly once, in cohort order
    assert_eq!(sample_names(&vc), vec!["A", "B", "C"]);
    let c = &vc.genotypes.genotypes()[2];
    assert!(c.alleles.iter().all(|al| al.is_reference()));
    assert_eq!(c.gq, 60);
}

#[test]
fn arrays_mode_synthesizes_without_gq() {
    let (vc, _) = assemble(
        &["A", "B"],
        vec![snp_record("A", "C", "0/1", "|500")],
        ExtractMode::Arrays,
    );
    let vc = GnarlyGenotyper::new(false).finalize(vc.unwrap()).unwrap();
    let b = &vc.genotypes.genotypes()[1];
    assert!(!b.has_gq());
}

#[test]
fn qual_approx_gate_rejects_weak_indel() {
    // T_indel = 30 - 10*log10(1.25e-4) ~ 69.03; a lone insertion at 5 fails
    let mut insertion = record("A", CallState::Variant);
    insertion.ref_allele = Some("A".to_string());
    insertion.alt_alleles = Some("AT".to_string());
    insertion.call_gt = Some("0/1".to_string());
    insertion.as_qual_approx = Some("|5".to_string());

    let (vc, stats) = assemble(&["A"], vec![insertion], ExtractMode::Genomes);
    assert!(vc.is_none());
    assert_eq!(stats.loci_below_qual_threshold, 1);
}

#[test]
fn qual_approx_gate_uses_snp_threshold_for_snps() {
    // T_snp = 60; a SNP at 65 passes where an indel at 65 would fail
    let (vc, _) = assemble(
        &["A"],
        vec![snp_record("A", "C", "0/1", "|65")],
        ExtractMode::Genomes,
    );
    assert!(vc.is_some());
}

#[test]
fn explicit_qual_approx_column_is_preferred() {
    // the AS components would fail the gate, the QUALapprox column passes it
    let mut r = snp_record("A", "C", "0/1", "|5");
    r.qual_approx = Some(500.0);
    let (vc, _) = assemble(&["A"], vec![r], ExtractMode::Genomes);
    assert!(vc.is_some());
}

#[test]
fn ref_block_only_locus_is_suppressed() {
    let (vc, stats) = assemble(
        &["A", "B"],
        vec![
            record("A", CallState::RefBlock(4)),
            record("B", CallState::RefBlock(6)),
        ],
        ExtractMode::Genomes,
    );
    assert!(vc.is_none());
    assert_eq!(stats.loci_suppressed_no_variant, 1);
}

#[test]
fn unknown_gq_state_builds_ref_block_without_gq() {
    let (vc, _) = assemble(
        &["A", "B"],
        vec![
            snp_record("A", "C", "0/1", "|500"),
            record("B", CallState::UnknownGq),
        ],
        ExtractMode::Genomes,
    );
    let vc = GnarlyGenotyper::new(false).finalize(vc.unwrap()).unwrap();
    let b = &vc.genotypes.genotypes()[1];
    assert!(b.alleles.iter().all(|al| al.is_reference()));
    assert!(!b.has_gq());
}

#[test]
fn missing_marker_sample_is_emitted_as_no_call() {
    let (vc, _) = assemble(
        &["A", "B"],
        vec![
            snp_record("A", "C", "0/1", "|500"),
            record("B", CallState::Missing),
        ],
        ExtractMode::Genomes,
    );
    let vc = GnarlyGenotyper::new(false).finalize(vc.unwrap()).unwrap();
    let b = &vc.genotypes.genotypes()[1];
    assert!(b.alleles.iter().all(|al| al.is_no_call()));
}

#[test]
fn record_with_wrong_reference_base_is_dropped() {
    // reference position 5 is 'A' but the record claims 'G'
    let mut bad = snp_record("A", "C", "0/1", "|500");
    bad.ref_allele = Some("G".to_string());
    let (vc, stats) = assemble(&["A"], vec![bad], ExtractMode::Genomes);
    assert!(vc.is_none());
    assert_eq!(stats.malformed_records, 1);
}
