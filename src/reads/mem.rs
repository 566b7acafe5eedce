//! In-memory alignment source.

use std::sync::Arc;
use super::{AlignedSeq, AlnSource, BaseMatrix, ReadView};

#[derive(Clone)]
pub struct MemRead {
    pub name: Vec<u8>,
    pub query_len: u32,
    pub aln: AlignedSeq,
}

/// Alignment source, storing all reads in memory.
#[derive(Clone)]
pub struct MemSource {
    ref_len: u32,
    reads: Arc<Vec<MemRead>>,
}

impl MemSource {
    pub fn new(ref_len: u32, reads: Vec<MemRead>) -> Self {
        Self { ref_len, reads: Arc::new(reads) }
    }

    /// Creates a source from `(start, calls)` pairs; reads are named `r0`, `r1`, ...
    /// and their query length equals the number of calls.
    pub fn from_calls(ref_len: u32, reads: impl IntoIterator<Item = (u32, Vec<u8>)>) -> Self {
        Self::new(ref_len, reads.into_iter().enumerate()
            .map(|(i, (start, calls))| MemRead {
                name: format!("r{}", i).into_bytes(),
                query_len: calls.len() as u32,
                aln: AlignedSeq::new(start, calls),
            })
            .collect())
    }

    pub fn reads(&self) -> &[MemRead] {
        &self.reads
    }
}

impl AlnSource for MemSource {
    fn ref_len(&self) -> u32 {
        self.ref_len
    }

    fn for_each_read<F>(&self, mut f: F) -> crate::Result<()>
    where F: FnMut(&ReadView) -> crate::Result<()>,
    {
        for read in self.reads.iter() {
            f(&ReadView {
                name: &read.name,
                query_len: read.query_len,
                aln: &read.aln,
            })?;
        }
        Ok(())
    }

    fn base_matrix(&self, start: u32, end: u32) -> crate::Result<BaseMatrix> {
        let mut matrix = BaseMatrix::new(start, end);
        for read in self.reads.iter() {
            matrix.push_read(&read.aln);
        }
        Ok(matrix)
    }
}

/// Creates a mapped record on the first reference sequence, all base qualities are 30.
pub fn record(name: &str, pos: i64, cigar: Vec<htslib::bam::record::Cigar>, seq: &[u8]) -> htslib::bam::Record {
    let mut record = htslib::bam::Record::new();
    let cigar = htslib::bam::record::CigarString(cigar);
    record.set(name.as_bytes(), Some(&cigar), seq, &vec![30; seq.len()]);
    record.set_tid(0);
    record.set_pos(pos);
    record.unset_unmapped();
    record
}

/// Writes records to a BAM file with a single reference sequence `ref`, without an index.
pub fn write_unindexed_bam(
    path: &std::path::Path,
    ref_len: u32,
    records: &[htslib::bam::Record],
) -> crate::Result<()> {
    use htslib::bam;
    let mut header = bam::Header::new();
    let mut sq = bam::header::HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", "ref").push_tag(b"LN", ref_len);
    header.push_record(&sq);
    let mut writer = bam::Writer::from_path(path, &header, bam::Format::Bam)?;
    for record in records {
        writer.write(record)?;
    }
    Ok(())
}

/// Writes records (sorted by position) to an indexed BAM file with a single reference sequence.
pub fn write_bam(
    path: &std::path::Path,
    ref_len: u32,
    records: &[htslib::bam::Record],
) -> crate::Result<super::BamLocation> {
    write_unindexed_bam(path, ref_len, records)?;
    htslib::bam::index::build(path, None, htslib::bam::index::Type::Bai, 1)?;
    super::BamLocation::new(path, None)
}

/// Loads the same reads as the BAM file, but keeps them in memory.
pub fn from_records(ref_len: u32, records: &[htslib::bam::Record]) -> crate::Result<MemSource> {
    let mut reads = Vec::new();
    for record in records {
        let read = super::AlignedRead::from_record(record.clone())?;
        reads.push(MemRead {
            name: read.name().to_vec(),
            query_len: read.query_len(),
            aln: read.aln().clone(),
        });
    }
    Ok(MemSource::new(ref_len, reads))
}

/// Creates a new empty temporary directory, unique for the test.
pub fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("quasicov-{}-{}", name, std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    crate::ext::sys::mkdir(&dir).unwrap();
    dir
}
