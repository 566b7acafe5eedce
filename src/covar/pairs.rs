/// Generates all pairs `(i, j)` of interesting positions with `i < j` and `j - i <= max_dist`.
/// Input positions must be sorted in increasing order; output is sorted lexicographically.
pub fn candidate_pairs(interesting: &[u32], max_dist: u32) -> Vec<(u32, u32)> {
    debug_assert!(interesting.windows(2).all(|w| w[0] < w[1]), "Positions must be sorted and unique");
    let mut pairs = Vec::new();
    for (k, &i) in interesting.iter().enumerate() {
        pairs.extend(interesting[k + 1..].iter()
            .take_while(|&&j| j - i <= max_dist)
            .map(|&j| (i, j)));
    }
    log::debug!("    {} candidate pairs across {} interesting positions", pairs.len(), interesting.len());
    pairs
}
