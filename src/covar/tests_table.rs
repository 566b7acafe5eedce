//! Covariation test results: ordering, export and import.

use std::{
    cmp::Ordering,
    io::{self, BufRead, Write},
    path::Path,
};
use crate::{
    Error,
    err::{error, add_path},
    ext,
    math::fisher::Table,
    seq,
};

/// Header of the covariation test table.
pub const HEADER: &'static str = "col_i,col_j,i_char,j_char,x_11,x_12,x_21,x_22,p_value";

/// Result of testing a single allele combination at a pair of positions.
#[derive(Clone, Debug, PartialEq)]
pub struct TestRow {
    pub col_i: u32,
    pub col_j: u32,
    pub i_char: u8,
    pub j_char: u8,
    pub table: Table,
    pub p_value: f64,
}

impl TestRow {
    /// Creates a new row and calculates the p-value.
    pub fn new(col_i: u32, col_j: u32, i_char: u8, j_char: u8, table: Table) -> Self {
        Self {
            col_i, col_j, i_char, j_char, table,
            p_value: table.fisher_pvalue(),
        }
    }

    /// Order: increasing p-value, then positions, then alleles.
    fn cmp(&self, other: &Self) -> Ordering {
        self.p_value.total_cmp(&other.p_value)
            .then(self.col_i.cmp(&other.col_i))
            .then(self.col_j.cmp(&other.col_j))
            .then(seq::allele_order(self.i_char).cmp(&seq::allele_order(other.i_char)))
            .then(seq::allele_order(self.j_char).cmp(&seq::allele_order(other.j_char)))
    }

    fn write(&self, mut writer: impl Write) -> io::Result<()> {
        let t = &self.table;
        writeln!(writer, "{},{},{},{},{},{},{},{},{}", self.col_i, self.col_j,
            char::from(self.i_char), char::from(self.j_char), t.x11, t.x12, t.x21, t.x22, self.p_value)
    }
}

/// Covariation test rows, sorted by increasing p-value.
#[derive(Clone, Debug, Default)]
pub struct TestResults {
    rows: Vec<TestRow>,
}

impl TestResults {
    /// Sorts rows; the resulting order does not depend on the input order.
    pub fn from_unsorted(mut rows: Vec<TestRow>) -> Self {
        rows.sort_unstable_by(TestRow::cmp);
        Self { rows }
    }

    pub fn rows(&self) -> &[TestRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes comma-separated table with a header.
    pub fn write(&self, mut writer: impl Write) -> io::Result<()> {
        writeln!(writer, "{}", HEADER)?;
        for row in self.rows.iter() {
            row.write(&mut writer)?;
        }
        Ok(())
    }

    /// Writes the table to a file, gzip-compressed if the filename ends with `.gz`.
    pub fn save(&self, filename: &Path) -> crate::Result<()> {
        let mut writer = ext::sys::create(filename).map_err(add_path!(filename))?;
        self.write(&mut writer).map_err(add_path!(filename))?;
        writer.flush().map_err(add_path!(filename))
    }

    /// Loads a previously saved table (plain or gzip-compressed).
    pub fn load(filename: &Path) -> crate::Result<Self> {
        log::info!("Loading covariation tests from {}", ext::fmt::path(filename));
        let reader = ext::sys::open(filename).map_err(add_path!(filename))?;
        let res = Self::read(reader, filename)?;
        log::info!("    Loaded {} rows", res.len());
        Ok(res)
    }

    /// Parses a comma-separated table. Columns are found by their names, so additional columns
    /// (for example, a leading unnamed row index) are allowed.
    pub fn read(reader: impl BufRead, filename: &Path) -> crate::Result<Self> {
        let mut lines = reader.lines();
        let header = lines.next()
            .ok_or_else(|| error!(InvalidData, "Covariation table {} is empty", ext::fmt::path(filename)))?
            .map_err(add_path!(filename))?;
        let columns: Vec<&str> = header.trim_end().split(',').collect();
        let expected: Vec<&str> = HEADER.split(',').collect();
        let mut ixs = [0; 9];
        for (ix, &name) in ixs.iter_mut().zip(&expected) {
            *ix = columns.iter().position(|&col| col == name)
                .ok_or_else(|| error!(InvalidData, "Covariation table {} has no column `{}`",
                    ext::fmt::path(filename), name))?;
        }

        let mut rows = Vec::new();
        for (i, line) in lines.enumerate() {
            let line = line.map_err(add_path!(filename))?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let split: Vec<&str> = line.split(',').collect();
            let field = |k: usize| split.get(ixs[k]).copied()
                .ok_or_else(|| error!(ParsingError, "Not enough columns in line {} of {}: `{}`",
                    i + 2, ext::fmt::path(filename), line));
            rows.push(TestRow {
                col_i: parse_num(field(0)?)?,
                col_j: parse_num(field(1)?)?,
                i_char: parse_allele(field(2)?)?,
                j_char: parse_allele(field(3)?)?,
                table: Table::new(parse_num(field(4)?)?, parse_num(field(5)?)?,
                    parse_num(field(6)?)?, parse_num(field(7)?)?),
                p_value: field(8)?.parse::<f64>()
                    .map_err(|_| error!(ParsingError, "Cannot parse p-value `{}`", split[ixs[8]]))?,
            });
        }
        Ok(Self::from_unsorted(rows))
    }
}

fn parse_num(s: &str) -> crate::Result<u32> {
    // Positions and counts may be stored as floats (`10.0`).
    s.parse::<u32>().or_else(|_| match s.parse::<f64>() {
        Ok(x) if x >= 0.0 && x.fract() == 0.0 && x <= f64::from(u32::MAX) => Ok(x as u32),
        _ => Err(error!(ParsingError, "Cannot parse non-negative integer `{}`", s)),
    })
}

fn parse_allele(s: &str) -> crate::Result<u8> {
    match s.as_bytes() {
        &[c] => Ok(c),
        _ => Err(Error::Utf8("allele", s.as_bytes().to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn row(col_i: u32, col_j: u32, i_char: u8, j_char: u8, p_value: f64) -> TestRow {
        TestRow { col_i, col_j, i_char, j_char, table: Table::new(1, 2, 3, 4), p_value }
    }

    #[test]
    fn deterministic_order() {
        let rows = vec![
            row(5, 9, b'T', b'A', 0.5),
            row(1, 9, b'-', b'A', 0.01),
            row(1, 9, b'A', b'A', 0.01),
            row(0, 3, b'C', b'G', 1e-20),
        ];
        let mut rev_rows = rows.clone();
        rev_rows.reverse();
        let res1 = TestResults::from_unsorted(rows);
        let res2 = TestResults::from_unsorted(rev_rows);
        assert_eq!(res1.rows(), res2.rows());
        let order: Vec<_> = res1.rows().iter().map(|r| (r.col_i, r.i_char)).collect();
        assert_eq!(order, vec![(0, b'C'), (1, b'A'), (1, b'-'), (5, b'T')]);
    }

    #[test]
    fn write_and_read() {
        let res = TestResults::from_unsorted(vec![
            TestRow::new(10, 20, b'A', b'G', Table::new(100, 0, 0, 100)),
            TestRow::new(10, 20, b'A', b'-', Table::new(3, 5, 7, 11)),
        ]);
        let mut out = Vec::new();
        res.write(&mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.starts_with(HEADER));
        assert!(text.lines().nth(1).unwrap().starts_with("10,20,A,G,100,0,0,100,"));

        let loaded = TestResults::read(&out[..], &PathBuf::from("tests.csv")).unwrap();
        assert_eq!(loaded.rows(), res.rows());
    }

    #[test]
    fn read_with_index_column() {
        let text = ",col_i,col_j,i_char,j_char,x_11,x_12,x_21,x_22,p_value\n\
            0,3.0,8.0,C,T,4,0,1,5,0.0238\n\
            1,3.0,8.0,C,A,4,1,1,4,0.2063\n";
        let loaded = TestResults::read(text.as_bytes(), &PathBuf::from("tests.csv")).unwrap();
        assert_eq!(loaded.len(), 2);
        let first = &loaded.rows()[0];
        assert_eq!((first.col_i, first.col_j, first.i_char, first.j_char), (3, 8, b'C', b'T'));
        assert_eq!(first.table, Table::new(4, 0, 1, 5));
        assert_eq!(first.p_value, 0.0238);
    }

    #[test]
    fn malformed() {
        let path = PathBuf::from("tests.csv");
        assert!(TestResults::read("".as_bytes(), &path).is_err());
        assert!(TestResults::read("col_i,col_j\n1,2\n".as_bytes(), &path).is_err());
        let bad_pval = format!("{}\n1,2,A,C,1,1,1,1,abc\n", HEADER);
        assert!(TestResults::read(bad_pval.as_bytes(), &path).is_err());
    }
}
