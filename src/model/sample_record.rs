use serde_derive::{Deserialize, Serialize};

use crate::model::location::LocationKey;
use crate::utils::errors::ExtractError;

/**
 * The per-sample call state recorded in the cohort table.
 *
 * Reference bands carry the GQ decade as a digit: state `3` is a ref block
 * with GQ in [30, 40). State `6` (GQ >= 60) is typically dropped by the
 * ingest side and re-synthesized here for samples with no row at a locus.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    Variant,
    RefBlock(u8),
    UnknownGq,
    SpanningDeletion,
    Missing,
}

impl CallState {
    pub fn parse(tag: &str) -> Result<CallState, ExtractError> {
        match tag {
            "v" => Ok(CallState::Variant),
            "u" => Ok(CallState::UnknownGq),
            "*" => Ok(CallState::SpanningDeletion),
            "m" => Ok(CallState::Missing),
            "0" | "1" | "2" | "3" | "4" | "5" | "6" => {
                Ok(CallState::RefBlock(tag.as_bytes()[0] - b'0'))
            }
            other => Err(ExtractError::UnknownState(other.to_string())),
        }
    }

    pub fn is_variant(&self) -> bool {
        matches!(self, CallState::Variant)
    }
}

/// One decoded row of the cohort record table. Columns the pipeline does not
/// interpret are carried in `passthrough` and forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub location: LocationKey,
    pub sample_name: String,
    pub state: CallState,
    pub ref_allele: Option<String>,
    pub alt_alleles: Option<String>,
    pub call_gt: Option<String>,
    pub call_gq: Option<i64>,
    pub call_ad: Option<String>,
    pub call_pl: Option<String>,
    pub call_dp: Option<i64>,
    pub call_rgq: Option<i64>,
    pub qual_approx: Option<f64>,
    pub as_qual_approx: Option<String>,
    pub passthrough: Vec<(String, String)>,
}

impl SampleRecord {
    /// Parsed GT as allele indices, `None` per slot for no-calls. The bool is
    /// the phasing flag.
    pub fn parse_gt(&self) -> Option<(Vec<Option<usize>>, bool)> {
        let gt = self.call_gt.as_deref()?;
        let phased = gt.contains('|');
        let mut indices = Vec::new();
        for part in gt.split(['/', '|']) {
            if part == "." || part.is_empty() {
                indices.push(None);
            } else {
                indices.push(Some(part.parse::<usize>().ok()?));
            }
        }
        if indices.is_empty() {
            return None;
        }
        Some((indices, phased))
    }

    /// Comma-separated integer field (AD, PL).
    pub fn parse_int_list(field: &Option<String>) -> Option<Vec<i64>> {
        let raw = field.as_deref()?;
        if raw.is_empty() {
            return None;
        }
        raw.split(',')
            .map(|p| p.trim().parse::<i64>().ok())
            .collect::<Option<Vec<i64>>>()
    }

    /// Comma-separated alt allele strings; empty when the field is absent.
    pub fn alt_allele_list(&self) -> Vec<String> {
        match self.alt_alleles.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => raw.split(',').map(|s| s.trim().to_string()).collect(),
        }
    }

    /**
     * Pipe-separated AS_QUALapprox components, aligned to the allele list
     * (leading component for the reference is empty). Non-numeric or empty
     * components decode to None.
     */
    pub fn as_qual_approx_components(&self) -> Vec<Option<f64>> {
        match self.as_qual_approx.as_deref() {
            None => Vec::new(),
            Some(raw) => raw
                .split('|')
                .map(|p| {
                    let p = p.trim();
                    if p.is_empty() {
                        None
                    } else {
                        p.parse::<f64>().ok()
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(call_gt: Option<&str>, as_qa: Option<&str>) -> SampleRecord {
        SampleRecord {
            location: 1_000_000_100_000,
            sample_name: "s1".to_string(),
            state: CallState::Variant,
            ref_allele: Some("A".to_string()),
            alt_alleles: Some("C".to_string()),
            call_gt: call_gt.map(|s| s.to_string()),
            call_gq: None,
            call_ad: None,
            call_pl: None,
            call_dp: None,
            call_rgq: None,
            qual_approx: None,
            as_qual_approx: as_qa.map(|s| s.to_string()),
            passthrough: Vec::new(),
        }
    }

    #[test]
    fn state_parsing() {
        assert_eq!(CallState::parse("v").unwrap(), CallState::Variant);
        assert_eq!(CallState::parse("4").unwrap(), CallState::RefBlock(4));
        assert_eq!(CallState::parse("*").unwrap(), CallState::SpanningDeletion);
        assert!(matches!(
            CallState::parse("x"),
            Err(ExtractError::UnknownState(_))
        ));
    }

    #[test]
    fn gt_parsing() {
        let (gt, phased) = record_with(Some("0/1"), None).parse_gt().unwrap();
        assert_eq!(gt, vec![Some(0), Some(1)]);
        assert!(!phased);

        let (gt, phased) = record_with(Some("1|2"), None).parse_gt().unwrap();
        assert_eq!(gt, vec![Some(1), Some(2)]);
        assert!(phased);

        let (gt, _) = record_with(Some("./."), None).parse_gt().unwrap();
        assert_eq!(gt, vec![None, None]);
    }

    #[test]
    fn as_qual_approx_components_align_to_alleles() {
        let rec = record_with(None, Some("|500"));
        assert_eq!(rec.as_qual_approx_components(), vec![None, Some(500.0)]);

        let rec = record_with(None, Some("0|234|120"));
        assert_eq!(
            rec.as_qual_approx_components(),
            vec![Some(0.0), Some(234.0), Some(120.0)]
        );
    }
}
