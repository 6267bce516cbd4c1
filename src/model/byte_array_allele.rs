use std::fmt;

lazy_static! {
    pub static ref NON_REF_ALLELE: ByteArrayAllele = ByteArrayAllele::new(b"<NON_REF>", false);
    pub static ref SPAN_DEL_ALLELE: ByteArrayAllele = ByteArrayAllele::new(b"*", false);
    pub static ref NO_CALL_ALLELE: ByteArrayAllele = ByteArrayAllele::new(b".", false);
}

pub const NON_REF_STRING: &str = "<NON_REF>";
pub const SPAN_DEL_STRING: &str = "*";

/**
 * An allele as a raw byte sequence plus reference flag. Symbolic alleles
 * (angle-bracketed) and the spanning deletion `*` never take part in
 * base-level padding or length comparisons.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ByteArrayAllele {
    pub bases: Vec<u8>,
    pub is_ref: bool,
    pub is_symbolic: bool,
}

impl ByteArrayAllele {
    pub fn new(bases: &[u8], is_ref: bool) -> ByteArrayAllele {
        let is_symbolic = bases.first() == Some(&b'<');
        ByteArrayAllele {
            bases: bases.to_ascii_uppercase(),
            is_ref,
            is_symbolic,
        }
    }

    pub fn no_call() -> ByteArrayAllele {
        NO_CALL_ALLELE.clone()
    }

    pub fn is_reference(&self) -> bool {
        self.is_ref
    }

    pub fn is_non_ref(&self) -> bool {
        self.is_symbolic && self.bases == NON_REF_ALLELE.bases
    }

    pub fn is_span_del(&self) -> bool {
        self.bases == b"*"
    }

    pub fn is_no_call(&self) -> bool {
        self.bases == b"."
    }

    /// True for alleles that carry concrete bases which can be padded to a
    /// longer reference representation.
    pub fn is_concrete(&self) -> bool {
        !self.is_symbolic && !self.is_span_del() && !self.is_no_call()
    }

    pub fn length(&self) -> usize {
        self.bases.len()
    }

    pub fn get_bases(&self) -> &[u8] {
        &self.bases
    }

    /// Same allele extended by `suffix`, used when re-expressing alleles
    /// against a longer reference. Symbolic and `*` alleles are unchanged.
    pub fn extended(&self, suffix: &[u8]) -> ByteArrayAllele {
        if !self.is_concrete() {
            return self.clone();
        }
        let mut bases = self.bases.clone();
        bases.extend_from_slice(suffix);
        ByteArrayAllele {
            bases,
            is_ref: self.is_ref,
            is_symbolic: false,
        }
    }
}

impl fmt::Display for ByteArrayAllele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_detection() {
        assert!(ByteArrayAllele::new(b"<NON_REF>", false).is_non_ref());
        assert!(!ByteArrayAllele::new(b"A", false).is_symbolic);
        assert!(ByteArrayAllele::new(b"*", false).is_span_del());
    }

    #[test]
    fn extension_skips_symbolic() {
        let a = ByteArrayAllele::new(b"AG", false);
        assert_eq!(a.extended(b"T").get_bases(), b"AGT");
        let star = ByteArrayAllele::new(b"*", false);
        assert_eq!(star.extended(b"T").get_bases(), b"*");
        let non_ref = ByteArrayAllele::new(b"<NON_REF>", false);
        assert_eq!(non_ref.extended(b"T"), non_ref);
    }

    #[test]
    fn bases_are_uppercased() {
        assert_eq!(ByteArrayAllele::new(b"acGt", true).get_bases(), b"ACGT");
    }
}
