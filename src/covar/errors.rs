//! Background error rate and significance of covarying alleles.

use std::io::{self, Write};
use crate::{
    math::binom::CachedQuantiles,
    seq::NUCLEOTIDES,
};
use super::{
    tally::PositionTally,
    fdr::CovaryingSites,
};

/// Estimates the background error rate from non-covarying positions:
/// `|sum(coverage) - sum(max count)| / sum(max count)`, clamped to [0, 1].
pub fn background_error_rate(tally: &PositionTally, sites: &CovaryingSites) -> f64 {
    let mut sum_cov = 0_u64;
    let mut sum_max = 0_u64;
    for (pos, counts) in tally.counts().iter().enumerate() {
        if !sites.contains(pos as u32) {
            sum_cov += u64::from(counts.coverage());
            sum_max += u64::from(counts.max_count());
        }
    }
    if sum_max == 0 {
        0.0
    } else {
        (sum_cov.abs_diff(sum_max) as f64 / sum_max as f64).clamp(0.0, 1.0)
    }
}

/// Count of a single nucleotide at a covarying site, compared against the error threshold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CovaryingError {
    pub site: u32,
    pub allele: u8,
    pub count: u32,
    /// Largest number of errors, expected at this coverage.
    pub n_error: u32,
    /// Allele is observed, but not more often than expected from errors.
    pub significant: bool,
}

/// Binomial error model: error rate and per-position error count thresholds.
pub struct ErrorModel {
    rate: f64,
    n_errors: Vec<u32>,
    records: Vec<CovaryingError>,
}

pub const ERRORS_HEADER: &'static str = "site\tallele\tcount\tn_error\tsignificant";

impl ErrorModel {
    /// Estimates the error rate, `n_error` for every position
    /// (the `1 - error_threshold` quantile of Binomial(coverage, rate)),
    /// and produces one record for every covarying site and every nucleotide.
    pub fn estimate(tally: &PositionTally, sites: &CovaryingSites, error_threshold: f64) -> crate::Result<Self> {
        log::info!("Estimating error model");
        let rate = background_error_rate(tally, sites);
        let mut quantiles = CachedQuantiles::new(rate, 1.0 - error_threshold);
        let n_errors = tally.counts().iter()
            .map(|counts| quantiles.get(counts.coverage()))
            .collect::<crate::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(4 * sites.len());
        for &site in sites.sites() {
            let counts = tally.at(site);
            let n_error = n_errors[site as usize];
            for &allele in NUCLEOTIDES.iter() {
                let count = counts.get(allele);
                records.push(CovaryingError {
                    site, allele, count, n_error,
                    significant: count > 0 && count <= n_error,
                });
            }
        }
        log::info!("    Error rate {:.6}, {} / {} covarying alleles with counts within the error level",
            rate, records.iter().filter(|rec| rec.significant).count(), records.len());
        Ok(Self { rate, n_errors, records })
    }

    /// Background error rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Error count threshold at the position.
    pub fn n_error(&self, pos: u32) -> u32 {
        self.n_errors[pos as usize]
    }

    pub fn covarying_errors(&self) -> &[CovaryingError] {
        &self.records
    }

    /// Writes covarying error records in a tab-separated format.
    pub fn write(&self, mut writer: impl Write) -> io::Result<()> {
        writeln!(writer, "{}", ERRORS_HEADER)?;
        for rec in self.records.iter() {
            writeln!(writer, "{}\t{}\t{}\t{}\t{}", rec.site, char::from(rec.allele), rec.count, rec.n_error,
                if rec.significant { "T" } else { "F" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reads::mem::MemSource;

    /// 100 reads over 10 positions: one error at position 3, polymorphism 60/40 at position 6.
    fn tally() -> PositionTally {
        let reads = (0..100).map(|k| {
            let mut calls = b"ACGTACGTAC".to_vec();
            if k == 0 {
                calls[3] = b'A';
            }
            if k < 40 {
                calls[6] = b'T';
            }
            (0, calls)
        });
        PositionTally::build(&MemSource::from_calls(10, reads)).unwrap()
    }

    #[test]
    fn error_rate() {
        let tally = tally();
        let sites = CovaryingSites::new(10, [6], 0);
        // Coverage 900, max counts 899.
        assert!((background_error_rate(&tally, &sites) - 1.0 / 899.0).abs() < 1e-12);
        // Without covarying sites, the polymorphism is counted as an error.
        let no_sites = CovaryingSites::new(10, [], 0);
        assert!((background_error_rate(&tally, &no_sites) - 41.0 / 959.0).abs() < 1e-12);
        // No coverage outside of covarying sites.
        let all_sites = CovaryingSites::new(10, 0..10, 0);
        assert_eq!(background_error_rate(&tally, &all_sites), 0.0);
    }

    #[test]
    fn covarying_records() {
        let tally = tally();
        let sites = CovaryingSites::new(10, [6], 0);
        let model = ErrorModel::estimate(&tally, &sites, 1e-3).unwrap();
        let n_error = model.n_error(6);
        // Binomial(100, 1/899): the 0.999 quantile is small, but positive.
        assert!(n_error >= 1 && n_error < 10, "n_error = {}", n_error);
        let records = model.covarying_errors();
        assert_eq!(records.len(), 4);
        assert_eq!(records.iter().map(|r| (r.allele, r.count)).collect::<Vec<_>>(),
            vec![(b'A', 0), (b'C', 0), (b'G', 60), (b'T', 40)]);
        // Zero counts and counts above the error level are not significant.
        assert!(records.iter().all(|r| !r.significant));

        let mut out = Vec::new();
        model.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().next().unwrap(), ERRORS_HEADER);
        assert_eq!(text.lines().nth(3).unwrap(), format!("6\tG\t60\t{}\tF", n_error));
    }

    #[test]
    fn low_counts_significant() {
        // Position 4: 2 out of 400 reads carry C, which is within the error level.
        let reads = (0..400).map(|k| {
            let mut calls = b"AAAAAAAA".to_vec();
            if k % 50 == 0 {
                calls[1] = b'G';
            }
            if k < 2 {
                calls[4] = b'C';
            }
            (0, calls)
        });
        let tally = PositionTally::build(&MemSource::from_calls(8, reads)).unwrap();
        let sites = CovaryingSites::new(8, [4], 0);
        let model = ErrorModel::estimate(&tally, &sites, 1e-3).unwrap();
        let c_rec = model.covarying_errors().iter().find(|r| r.allele == b'C').unwrap();
        assert_eq!(c_rec.count, 2);
        assert!(c_rec.n_error >= 2);
        assert!(c_rec.significant);
        let a_rec = model.covarying_errors().iter().find(|r| r.allele == b'A').unwrap();
        assert!(!a_rec.significant);
    }
}
