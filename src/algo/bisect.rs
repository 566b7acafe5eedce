//! Binary search over sorted slices.

use std::{
    cmp::Ordering,
    ops::Range,
};

/// Performs binary search and finds index `i` such that `a[i-1] < target <= a[i]`.
#[inline]
pub fn left<T: PartialOrd>(a: &[T], target: &T) -> usize {
    left_by(a, |v| v.partial_cmp(target).expect("Bisect failed: elements are not comparable"))
}

/// Performs binary search between indices `lo` and `hi`
/// and finds index `i` such that `a[i-1] < target <= a[i]`.
#[inline]
pub fn left_at<T: PartialOrd>(a: &[T], target: &T, lo: usize, hi: usize) -> usize {
    left_by_at(a, |v| v.partial_cmp(target).expect("Bisect failed: elements are not comparable"), lo, hi)
}

/// Performs binary search
/// and finds the index `i` such that `f(a[i-1]) -> Less` and `f(a[i]) -> Equal | Greater`.
#[inline]
pub fn left_by<T, F: FnMut(&T) -> Ordering>(a: &[T], f: F) -> usize {
    left_by_at(a, f, 0, a.len())
}

/// Performs binary search between indices `lo` and `hi`
/// and finds the index `i` such that `f(a[i-1]) -> Less` and `f(a[i]) -> Equal | Greater`.
pub fn left_by_at<T, F: FnMut(&T) -> Ordering>(a: &[T], mut f: F, mut lo: usize, mut hi: usize) -> usize {
    assert!(lo <= hi && hi <= a.len(), "Cannot perform binary search on indices {}, {} (len: {})", lo, hi, a.len());
    while lo < hi {
        let mid = (lo + hi) / 2;
        if f(unsafe { a.get_unchecked(mid) }) == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// For a sorted slice, returns the range of indices `i` such that `start <= a[i] < end`.
pub fn subrange<T: PartialOrd>(a: &[T], start: &T, end: &T) -> Range<usize> {
    let i = left(a, start);
    let j = left_at(a, end, i, a.len());
    i..j
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search() {
        let a = [3_u32, 5, 5, 9, 12];
        assert_eq!(left(&a, &0), 0);
        assert_eq!(left(&a, &5), 1);
        assert_eq!(left(&a, &6), 3);
        assert_eq!(left(&a, &13), 5);
        assert_eq!(subrange(&a, &4, &12), 1..4);
        assert_eq!(subrange(&a, &12, &20), 4..5);
        assert_eq!(subrange(&a, &20, &30), 5..5);
        assert_eq!(subrange(&a, &0, &1), 0..0);
    }
}
