//! Binomial quantiles.

use statrs::distribution::{Binomial, DiscreteCDF};
use nohash::IntMap;
use crate::err::error;

/// Returns the smallest `k` such that `P(X <= k) >= q` for `X ~ Binomial(n, p)`.
/// Zero trials or zero probability always produce 0.
pub fn quantile(n: u32, p: f64, q: f64) -> crate::Result<u32> {
    if n == 0 || p <= 0.0 || q <= 0.0 {
        return Ok(0);
    }
    if q >= 1.0 || p >= 1.0 {
        return Ok(n);
    }
    let distr = Binomial::new(p, u64::from(n))
        .map_err(|e| error!(RuntimeError, "Cannot create Binomial({}, {}) distribution: {:?}", n, p, e))?;
    // Binary search over [0, n]; cdf(n) = 1 >= q.
    let mut low = 0;
    let mut high = n;
    while low < high {
        let mid = low + (high - low) / 2;
        if distr.cdf(u64::from(mid)) >= q {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    Ok(low)
}

/// Binomial quantiles for a fixed success probability and quantile level, memoized by the number of trials.
pub struct CachedQuantiles {
    p: f64,
    q: f64,
    cache: IntMap<u32, u32>,
}

impl CachedQuantiles {
    pub fn new(p: f64, q: f64) -> Self {
        Self {
            p, q,
            cache: IntMap::default(),
        }
    }

    /// Returns the quantile for `n` trials.
    pub fn get(&mut self, n: u32) -> crate::Result<u32> {
        if let Some(&k) = self.cache.get(&n) {
            return Ok(k);
        }
        let k = quantile(n, self.p, self.q)?;
        self.cache.insert(n, k);
        Ok(k)
    }
}
