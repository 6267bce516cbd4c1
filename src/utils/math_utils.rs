pub struct MathUtils {}

impl MathUtils {
    /**
     * Index of the diploid genotype (j, k), j <= k, in the canonical VCF
     * likelihood ordering: for k in 0..n_alleles, for j in 0..=k.
     */
    pub fn diploid_gl_index(j: usize, k: usize) -> usize {
        let (j, k) = if j <= k { (j, k) } else { (k, j) };
        k * (k + 1) / 2 + j
    }

    /// Inverse of `diploid_gl_index`: the allele pair (j, k) for a likelihood index.
    pub fn diploid_gl_pair(index: usize) -> (usize, usize) {
        let mut k = 0usize;
        while (k + 1) * (k + 2) / 2 <= index {
            k += 1;
        }
        let j = index - k * (k + 1) / 2;
        (j, k)
    }

    /// Number of diploid genotypes over `n_alleles` alleles.
    pub fn num_diploid_genotypes(n_alleles: usize) -> usize {
        n_alleles * (n_alleles + 1) / 2
    }

    pub fn min_element_index(values: &[i64]) -> usize {
        let mut best = 0;
        for (i, v) in values.iter().enumerate() {
            if *v < values[best] {
                best = i;
            }
        }
        best
    }

    /// Smallest value in `values` excluding index `skip`.
    pub fn min_element_excluding(values: &[i64], skip: usize) -> i64 {
        let mut best = i64::MAX;
        for (i, v) in values.iter().enumerate() {
            if i != skip && *v < best {
                best = *v;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::MathUtils;

    #[test]
    fn gl_index_round_trips() {
        let mut index = 0;
        for k in 0..6 {
            for j in 0..=k {
                assert_eq!(MathUtils::diploid_gl_index(j, k), index);
                assert_eq!(MathUtils::diploid_gl_pair(index), (j, k));
                index += 1;
            }
        }
        assert_eq!(MathUtils::num_diploid_genotypes(6), index);
    }

    #[test]
    fn gl_index_is_symmetric() {
        assert_eq!(
            MathUtils::diploid_gl_index(2, 0),
            MathUtils::diploid_gl_index(0, 2)
        );
    }
}
