use crate::model::sample_record::{CallState, SampleRecord};

/**
 * Collapse two records for the same (sample, location) into one.
 *
 * Concrete calls win over spanning deletions, and anything wins over an
 * explicit missing marker; otherwise the later record replaces the earlier
 * one.
 */
pub fn resolve_duplicate(a: SampleRecord, b: SampleRecord) -> SampleRecord {
    match (a.state, b.state) {
        (CallState::SpanningDeletion, CallState::Missing) => a,
        (CallState::SpanningDeletion, _) => b,
        (CallState::Missing, _) => b,
        (_, CallState::SpanningDeletion) => a,
        (_, CallState::Missing) => a,
        (_, _) => b,
    }
}
