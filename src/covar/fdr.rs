//! Multiple-testing correction and covarying site sets.

use std::{
    io::{self, Write},
    ops::Range,
};
use crate::algo::bisect;
use super::{
    tally::PositionTally,
    tests_table::TestResults,
};

/// Sorted set of covarying reference positions.
#[derive(Clone, Debug, Default)]
pub struct CovaryingSites {
    sites: Vec<u32>,
    flags: Vec<bool>,
}

impl CovaryingSites {
    /// Creates the set from arbitrary positions. Positions closer than `end_correction` to either end
    /// of the reference are discarded, as well as positions outside of the reference.
    pub fn new(ref_len: u32, sites: impl IntoIterator<Item = u32>, end_correction: u32) -> Self {
        let end = ref_len.saturating_sub(end_correction);
        let mut sites: Vec<u32> = sites.into_iter()
            .filter(|&site| end_correction <= site && site < end)
            .collect();
        sites.sort_unstable();
        sites.dedup();
        let mut flags = vec![false; ref_len as usize];
        for &site in sites.iter() {
            flags[site as usize] = true;
        }
        Self { sites, flags }
    }

    /// Sites in increasing order.
    pub fn sites(&self) -> &[u32] {
        &self.sites
    }

    #[inline]
    pub fn contains(&self, pos: u32) -> bool {
        self.flags.get(pos as usize).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Sites within `[start, end)`.
    pub fn in_range(&self, start: u32, end: u32) -> &[u32] {
        let Range { start: i, end: j } = bisect::subrange(&self.sites, &start, &end);
        &self.sites[i..j]
    }

    /// Writes sites, one per line.
    pub fn write(&self, mut writer: impl Write) -> io::Result<()> {
        for site in self.sites.iter() {
            writeln!(writer, "{}", site)?;
        }
        Ok(())
    }
}

/// Given p-values in increasing order, returns the number of leading values that pass
/// the Benjamini-Hochberg procedure: scanning from rank 1, stops at the first rank with `p > fdr * rank / m`.
pub fn bh_cutoff(pvalues: impl IntoIterator<Item = f64>, m: usize, fdr: f64) -> usize {
    let m = m as f64;
    pvalues.into_iter().enumerate()
        .position(|(i, p)| p > fdr * (i + 1) as f64 / m)
        .unwrap_or(m as usize)
}

/// Applies the Benjamini-Hochberg procedure to the sorted test rows;
/// both positions of every passing row are covarying.
pub fn benjamini_hochberg(tests: &TestResults, fdr: f64, ref_len: u32, end_correction: u32) -> CovaryingSites {
    let rows = tests.rows();
    let n_pass = bh_cutoff(rows.iter().map(|row| row.p_value), rows.len(), fdr);
    let sites = CovaryingSites::new(ref_len,
        rows[..n_pass].iter().flat_map(|row| [row.col_i, row.col_j]), end_correction);
    log::info!("    {} / {} tests pass FDR {}: {} covarying sites", n_pass, rows.len(), fdr, sites.len());
    sites
}

/// Calls a site covarying if at least two nucleotides have frequencies over the threshold.
pub fn threshold_sites(tally: &PositionTally, freq_threshold: f64, end_correction: u32) -> CovaryingSites {
    let sites = tally.counts().iter().enumerate()
        .filter(|(_, counts)| counts.sorted_frequencies()[1] > freq_threshold)
        .map(|(pos, _)| pos as u32);
    let sites = CovaryingSites::new(tally.ref_len(), sites, end_correction);
    log::info!("    {} sites with at least two nucleotides over frequency {}", sites.len(), freq_threshold);
    sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        covar::tests_table::TestRow,
        math::fisher::Table,
        reads::mem::MemSource,
    };

    fn results(pvalues: &[(u32, u32, f64)]) -> TestResults {
        TestResults::from_unsorted(pvalues.iter()
            .map(|&(col_i, col_j, p_value)| TestRow {
                col_i, col_j, i_char: b'A', j_char: b'C', table: Table::default(), p_value,
            })
            .collect())
    }

    #[test]
    fn first_violation() {
        // Thresholds: 0.01, 0.02, 0.03, 0.04.
        assert_eq!(bh_cutoff([0.001, 0.03, 0.01, 0.0], 4, 0.04), 1);
        assert_eq!(bh_cutoff([0.001, 0.015, 0.03, 0.035], 4, 0.04), 4);
        assert_eq!(bh_cutoff([0.5, 0.5], 2, 0.04), 0);
        assert_eq!(bh_cutoff([], 0, 0.04), 0);
    }

    #[test]
    fn bh_sites() {
        let tests = results(&[(10, 20, 1e-10), (20, 30, 1e-8), (40, 50, 0.9), (5, 6, 0.3)]);
        let sites = benjamini_hochberg(&tests, 0.01, 100, 0);
        assert_eq!(sites.sites(), &[10, 20, 30]);
        assert!(sites.contains(30) && !sites.contains(40) && !sites.contains(1000));

        // Every passing row satisfies p <= q * rank / m.
        let m = tests.len();
        let n_pass = bh_cutoff(tests.rows().iter().map(|r| r.p_value), m, 0.01);
        for (rank, row) in tests.rows()[..n_pass].iter().enumerate() {
            assert!(row.p_value <= 0.01 * (rank + 1) as f64 / m as f64);
        }
        assert!(benjamini_hochberg(&TestResults::default(), 0.01, 100, 0).is_empty());
    }

    #[test]
    fn end_trimming() {
        let sites = CovaryingSites::new(100, [2, 20, 97, 20, 95, 94, 5, 4], 5);
        assert_eq!(sites.sites(), &[5, 20, 94]);
        let sites = CovaryingSites::new(100, [0, 99, 100, 150], 0);
        assert_eq!(sites.sites(), &[0, 99]);
        // Correction longer than half of the reference removes everything.
        assert!(CovaryingSites::new(10, [3, 5, 7], 6).is_empty());
    }

    #[test]
    fn sites_in_range() {
        let sites = CovaryingSites::new(100, [3, 10, 11, 50], 0);
        assert_eq!(sites.in_range(0, 100), &[3, 10, 11, 50]);
        assert_eq!(sites.in_range(10, 50), &[10, 11]);
        assert_eq!(sites.in_range(12, 50), &[] as &[u32]);
        let mut out = Vec::new();
        sites.write(&mut out).unwrap();
        assert_eq!(out, b"3\n10\n11\n50\n".to_vec());
    }

    #[test]
    fn frequency_threshold() {
        let reads = (0..100).map(|k| {
            let mut calls = b"AAAAAA".to_vec();
            if k < 30 {
                calls[1] = b'C';
            }
            if k == 0 {
                calls[3] = b'G';
            }
            if k < 5 {
                calls[4] = b'T';
            }
            (0, calls)
        });
        let tally = PositionTally::build(&MemSource::from_calls(6, reads)).unwrap();
        // Frequencies: pos 1 -> 0.3, pos 3 -> 0.01 (not above the threshold), pos 4 -> 0.05.
        assert_eq!(threshold_sites(&tally, 0.01, 0).sites(), &[1, 4]);
        assert_eq!(threshold_sites(&tally, 0.1, 0).sites(), &[1]);
        assert!(threshold_sites(&tally, 0.01, 2).is_empty());
    }
}
