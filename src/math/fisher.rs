//! Fisher's exact test for 2x2 contingency tables.

use statrs::function::factorial::ln_binomial;
use super::Ln;

/// Tables with probability at most `observed * (1 + REL_TOL)` are considered as extreme as the observed one.
const REL_TOL: f64 = 1e-7;

/// 2x2 contingency table of two binary indicators across reads:
/// ```text
///            j matches   j differs
/// i matches     x11         x12
/// i differs     x21         x22
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub x11: u32,
    pub x12: u32,
    pub x21: u32,
    pub x22: u32,
}

impl Table {
    pub fn new(x11: u32, x12: u32, x21: u32, x22: u32) -> Self {
        Self { x11, x12, x21, x22 }
    }

    /// Total number of observations.
    pub fn total(&self) -> u32 {
        self.x11 + self.x12 + self.x21 + self.x22
    }

    /// Two-sided p-value of the Fisher's exact test:
    /// sum of hypergeometric probabilities of all tables with the same margins,
    /// that are not more probable than the observed table.
    pub fn fisher_pvalue(&self) -> f64 {
        let n = u64::from(self.total());
        let row1 = u64::from(self.x11 + self.x12);
        let col1 = u64::from(self.x11 + self.x21);
        let low = (row1 + col1).saturating_sub(n);
        let high = row1.min(col1);
        if low == high {
            // Only one table is possible with these margins (this includes empty tables).
            return 1.0;
        }

        let ln_denom = ln_binomial(n, row1);
        let ln_pmf = |x: u64| ln_binomial(col1, x) + ln_binomial(n - col1, row1 - x) - ln_denom;
        let threshold = ln_pmf(u64::from(self.x11)) + REL_TOL.ln_1p();
        let extreme: Vec<f64> = (low..=high).map(ln_pmf).filter(|&lprob| lprob <= threshold).collect();
        Ln::sum(&extreme).exp().min(1.0)
    }
}
