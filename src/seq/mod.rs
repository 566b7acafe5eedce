pub mod cigar;
pub mod fastx;

pub use fastx::write_fasta;

/// Four nucleotides in the canonical order.
pub const NUCLEOTIDES: [u8; 4] = *b"ACGT";
/// Deletion within a read.
pub const GAP: u8 = b'-';
/// Any query base other than A, C, G, T.
pub const UNKNOWN: u8 = b'N';
/// The read does not observe this reference position (reference skip, or outside of the read).
pub const MISSING: u8 = b'~';
/// Characters, counted at each position: four nucleotides and a gap.
pub const TALLIED: [u8; 5] = *b"ACGT-";

/// Converts a query base into a call: uppercase A, C, G, T or N.
#[inline]
pub fn standardize_nt(nt: u8) -> u8 {
    match nt {
        b'A' | b'a' => b'A',
        b'C' | b'c' => b'C',
        b'G' | b'g' => b'G',
        b'T' | b't' => b'T',
        _ => UNKNOWN,
    }
}

/// Returns index of the call in `TALLIED` (A, C, G, T, -), or None for N and missing calls.
#[inline]
pub fn tally_ix(call: u8) -> Option<usize> {
    match call {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        GAP => Some(4),
        _ => None,
    }
}

/// Order in which alleles are listed: tallied characters first, then anything else.
#[inline]
pub fn allele_order(call: u8) -> usize {
    tally_ix(call).unwrap_or(TALLIED.len())
}
