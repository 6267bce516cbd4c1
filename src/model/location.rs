use crate::reference::reference_reader::ContigDictionary;
use crate::utils::errors::ExtractError;

/// Positions are packed as `contig_index * 10^12 + position`, so a single
/// u64 comparison orders records by (contig, position).
pub const CHROMOSOME_MULTIPLIER: u64 = 1_000_000_000_000;

pub const MAX_POSITION: u64 = CHROMOSOME_MULTIPLIER - 1;

/// Packed (contig index, 1-based position) sort key for all streaming stages.
pub type LocationKey = u64;

/**
 * Encode a contig name and 1-based position into a LocationKey. The contig
 * index comes from the reference dictionary load order, so keys compare in
 * dictionary order across contigs and position order within one.
 */
pub fn encode(dict: &ContigDictionary, contig_name: &str, position: u64) -> Result<LocationKey, ExtractError> {
    let contig_index = dict
        .index_of(contig_name)
        .ok_or_else(|| ExtractError::UnknownContig(contig_name.to_string()))?;
    if position == 0 || position > MAX_POSITION {
        return Err(ExtractError::PositionOutOfRange(position));
    }
    // the packed contig number is 1-based: the first dictionary contig is 1
    Ok((contig_index as u64 + 1) * CHROMOSOME_MULTIPLIER + position)
}

/// Unpack a LocationKey into (contig dictionary index, 1-based position).
pub fn decode(key: LocationKey) -> (usize, u64) {
    let contig_number = key / CHROMOSOME_MULTIPLIER;
    debug_assert!(contig_number >= 1, "location key {} has no contig part", key);
    (
        contig_number.saturating_sub(1) as usize,
        key % CHROMOSOME_MULTIPLIER,
    )
}

/// Decode through the dictionary, failing if the contig index is out of range.
pub fn decode_named(dict: &ContigDictionary, key: LocationKey) -> Result<(&str, u64), ExtractError> {
    let (contig_index, position) = decode(key);
    let name = dict
        .name_of(contig_index)
        .ok_or_else(|| ExtractError::UnknownContig(format!("index {}", contig_index)))?;
    Ok((name, position))
}
