pub mod fisher;
pub mod binom;

pub struct Ln;

impl Ln {
    /// Calculates logsumexp: *log(sum(exp(values)))*.
    pub fn sum(values: &[f64]) -> f64 {
        Ln::map_sum(values, f64::clone)
    }

    /// Calculates logsumexp, but applies function `f` to each element of `a` before calculating sum.
    /// WARNING: Function `f` is applied to each element twice!
    pub fn map_sum<T, F: FnMut(&T) -> f64>(a: &[T], mut f: F) -> f64 {
        match a.len() {
            0 => f64::NEG_INFINITY,
            1 => f(&a[0]),
            _ => {
                // Shift by the maximum so that no exponent overflows.
                let m = a.iter().map(|v| f(v)).fold(f64::NEG_INFINITY, f64::max);
                if m == f64::NEG_INFINITY || m == f64::INFINITY {
                    return m;
                }
                let s = a.iter().fold(0.0_f64, |acc, el| acc + (f(&el) - m).exp());
                m + s.ln()
            },
        }
    }
}

pub trait RoundDiv {
    /// Calculates ceil(self / other).
    fn fast_ceil_div(self, other: Self) -> Self;
}

impl RoundDiv for usize {
    #[inline]
    fn fast_ceil_div(self, other: usize) -> usize {
        (self + other - 1) / other
    }
}
