extern crate cohort_extract;

use cohort_extract::model::location::{self, CHROMOSOME_MULTIPLIER};
use cohort_extract::reference::reference_reader::ContigDictionary;
use cohort_extract::utils::errors::ExtractError;

fn dictionary() -> ContigDictionary {
    let mut dict = ContigDictionary::default();
    dict.push("chr1".to_string(), 248_956_422);
    dict.push("chr2".to_string(), 242_193_529);
    dict.push("chrX".to_string(), 156_040_895);
    dict
}

#[test]
fn encode_packs_contig_and_position() {
    let dict = dictionary();
    let key = location::encode(&dict, "chr1", 100_000).unwrap();
    assert_eq!(key, CHROMOSOME_MULTIPLIER + 100_000);

    let key = location::encode(&dict, "chrX", 1).unwrap();
    assert_eq!(key, 3 * CHROMOSOME_MULTIPLIER + 1);
}

#[test]
fn encode_orders_by_dictionary_then_position() {
    let dict = dictionary();
    let chr1_late = location::encode(&dict, "chr1", 248_956_422).unwrap();
    let chr2_early = location::encode(&dict, "chr2", 1).unwrap();
    assert!(chr1_late < chr2_early);
}

#[test]
fn round_trip_recovers_contig_and_position() {
    let dict = dictionary();
    for contig in ["chr1", "chr2", "chrX"] {
        for position in [1u64, 2, 999, 100_000, 248_956_422] {
            let key = location::encode(&dict, contig, position).unwrap();
            let (name, decoded_position) = location::decode_named(&dict, key).unwrap();
            assert_eq!(name, contig);
            assert_eq!(decoded_position, position);
        }
    }
}

#[test]
fn unknown_contig_is_rejected() {
    let dict = dictionary();
    match location::encode(&dict, "chr17_random", 100) {
        Err(ExtractError::UnknownContig(name)) => assert_eq!(name, "chr17_random"),
        other => panic!("expected UnknownContig, got {:?}", other),
    }
}

#[test]
fn position_overflow_is_rejected() {
    let dict = dictionary();
    match location::encode(&dict, "chr1", 1_000_000_000_000) {
        Err(ExtractError::PositionOutOfRange(p)) => assert_eq!(p, 1_000_000_000_000),
        other => panic!("expected PositionOutOfRange, got {:?}", other),
    }
    assert!(location::encode(&dict, "chr1", 0).is_err());
    assert!(location::encode(&dict, "chr1", 999_999_999_999).is_ok());
}
