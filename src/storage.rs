//! Chain persistence.
//!
//! The sampler appends one row per walker per iteration through the
//! [`ChainStore`] trait. The CSV backend keeps the file readable by the
//! usual dataframe tools: non-finite values are written as `NA`, `Inf` and
//! `-Inf`, and the reader streams rows back so post-processing never has to
//! hold a full chain in memory.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::error::StorageError;
use crate::params::KickParams;

/// Sink for completed ensemble iterations.
pub trait ChainStore {
    /// Drop any previously stored chain and start fresh for `walkers`
    /// walkers.
    fn reset(&mut self, walkers: usize) -> Result<(), StorageError>;

    /// Append one completed iteration of the whole ensemble.
    ///
    /// Iterations must arrive in strictly increasing order; rows are never
    /// rewritten.
    fn append_iteration(
        &mut self,
        iteration: u64,
        positions: &[Vec<f64>],
        log_probs: &[f64],
    ) -> Result<(), StorageError>;

    fn flush(&mut self) -> Result<(), StorageError>;
}

/// One stored sample: a walker's position and score at one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRow {
    pub iteration: u64,
    pub walker: usize,
    pub position: Vec<f64>,
    pub log_prob: f64,
}

/// Format one value for CSV output.
///
/// `NaN` becomes `NA` and infinities become `Inf` / `-Inf`; with no
/// precision set, finite values round-trip exactly through their shortest
/// decimal representation.
pub(crate) fn format_value(value: f64, precision: Option<usize>) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Inf" } else { "-Inf" }.to_string()
    } else {
        match precision {
            Some(precision) => format!("{value:.precision$e}"),
            None => format!("{value}"),
        }
    }
}

/// Inverse of [`format_value`]; `None` for anything unparseable.
pub(crate) fn parse_value(token: &str) -> Option<f64> {
    match token {
        "NA" => Some(f64::NAN),
        "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        _ => token.parse().ok(),
    }
}

fn header() -> String {
    let mut columns = vec!["iteration", "walker"];
    columns.extend(KickParams::NAMES);
    columns.push("log_prob");
    columns.join(",")
}

/// CSV-backed chain store writing one file per run.
pub struct CsvChainStore {
    path: PathBuf,
    precision: Option<usize>,
    writer: Option<BufWriter<File>>,
    last_iteration: Option<u64>,
}

impl CsvChainStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            precision: None,
            writer: None,
            last_iteration: None,
        }
    }

    /// Write finite values with a fixed scientific precision instead of the
    /// default shortest round-trip representation.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChainStore for CsvChainStore {
    fn reset(&mut self, _walkers: usize) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        let file = File::create(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", header()).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.writer = Some(writer);
        self.last_iteration = None;
        Ok(())
    }

    fn append_iteration(
        &mut self,
        iteration: u64,
        positions: &[Vec<f64>],
        log_probs: &[f64],
    ) -> Result<(), StorageError> {
        debug_assert_eq!(positions.len(), log_probs.len());
        if let Some(last) = self.last_iteration {
            if iteration <= last {
                return Err(StorageError::OutOfOrder { iteration, last });
            }
        }
        let path = self.path.clone();
        let precision = self.precision;
        let writer = self.writer.as_mut().ok_or(StorageError::NotReset)?;
        for (walker, (position, log_prob)) in positions.iter().zip(log_probs).enumerate() {
            let values = position
                .iter()
                .map(|&v| format_value(v, precision))
                .join(",");
            writeln!(
                writer,
                "{iteration},{walker},{values},{}",
                format_value(*log_prob, precision)
            )
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        }
        self.last_iteration = Some(iteration);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Streaming reader over a stored chain file.
#[derive(Debug)]
pub struct ChainReader {
    lines: Lines<BufReader<File>>,
    line: usize,
    columns: usize,
}

impl ChainReader {
    /// Open a chain file and validate its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut lines = BufReader::new(file).lines();
        let header_line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(source)) => {
                return Err(StorageError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
            None => String::new(),
        };
        let fields: Vec<&str> = header_line.split(',').collect();
        let well_formed = fields.len() >= 4
            && fields[0] == "iteration"
            && fields[1] == "walker"
            && fields.last() == Some(&"log_prob");
        if !well_formed {
            return Err(StorageError::BadHeader {
                path: path.to_path_buf(),
                header: header_line,
            });
        }
        Ok(Self {
            lines,
            line: 1,
            columns: fields.len(),
        })
    }

    fn parse_row(&self, line: &str) -> Result<ChainRow, StorageError> {
        let bad = |reason: &str| StorageError::BadRow {
            line: self.line,
            reason: reason.to_string(),
        };
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != self.columns {
            return Err(bad("wrong number of columns"));
        }
        let iteration = fields[0].parse().map_err(|_| bad("bad iteration index"))?;
        let walker = fields[1].parse().map_err(|_| bad("bad walker index"))?;
        let mut position = Vec::with_capacity(self.columns - 3);
        for token in &fields[2..self.columns - 1] {
            position.push(parse_value(token).ok_or_else(|| bad("bad parameter value"))?);
        }
        let log_prob =
            parse_value(fields[self.columns - 1]).ok_or_else(|| bad("bad log-probability"))?;
        Ok(ChainRow {
            iteration,
            walker,
            position,
            log_prob,
        })
    }
}

impl Iterator for ChainReader {
    type Item = Result<ChainRow, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(source) => {
                    return Some(Err(StorageError::BadRow {
                        line: self.line + 1,
                        reason: source.to_string(),
                    }))
                }
            };
            self.line += 1;
            if line.is_empty() {
                continue;
            }
            return Some(self.parse_row(&line));
        }
    }
}

/// Read a chain back with its first `discard` iterations dropped.
///
/// Iterations are numbered from 1, so `discard = n` drops exactly the first
/// `n` recorded iterations.
pub fn flat_samples<P: AsRef<Path>>(path: P, discard: u64) -> Result<Vec<ChainRow>, StorageError> {
    let mut rows = Vec::new();
    for row in ChainReader::open(path)? {
        let row = row?;
        if row.iteration > discard {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// In-memory store for tests and benchmarks.
#[derive(Debug, Clone, Default)]
pub struct MemoryChainStore {
    rows: Vec<ChainRow>,
    last_iteration: Option<u64>,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[ChainRow] {
        &self.rows
    }

    pub fn flat_samples(&self, discard: u64) -> Vec<ChainRow> {
        self.rows
            .iter()
            .filter(|row| row.iteration > discard)
            .cloned()
            .collect()
    }
}

impl ChainStore for MemoryChainStore {
    fn reset(&mut self, _walkers: usize) -> Result<(), StorageError> {
        self.rows.clear();
        self.last_iteration = None;
        Ok(())
    }

    fn append_iteration(
        &mut self,
        iteration: u64,
        positions: &[Vec<f64>],
        log_probs: &[f64],
    ) -> Result<(), StorageError> {
        if let Some(last) = self.last_iteration {
            if iteration <= last {
                return Err(StorageError::OutOfOrder { iteration, last });
            }
        }
        for (walker, (position, log_prob)) in positions.iter().zip(log_probs).enumerate() {
            self.rows.push(ChainRow {
                iteration,
                walker,
                position: position.clone(),
                log_prob: *log_prob,
            });
        }
        self.last_iteration = Some(iteration);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    fn positions() -> Vec<Vec<f64>> {
        vec![
            vec![5.6, 30.0, 40.0, 25.0, 1.5, 3.0],
            vec![6.1, 28.5, 41.2, 60.0, 0.9, 5.5],
        ]
    }

    #[test]
    fn chain_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        let mut store = CsvChainStore::new(&path);
        store.reset(2).unwrap();
        store
            .append_iteration(1, &positions(), &[-3.25, f64::NEG_INFINITY])
            .unwrap();
        store
            .append_iteration(2, &positions(), &[-2.5, -4.75])
            .unwrap();
        store.flush().unwrap();

        let rows: Vec<ChainRow> = ChainReader::open(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].iteration, 1);
        assert_eq!(rows[0].walker, 0);
        assert_eq!(rows[0].position, positions()[0]);
        assert_eq!(rows[0].log_prob, -3.25);
        assert_eq!(rows[1].walker, 1);
        assert_eq!(rows[1].log_prob, f64::NEG_INFINITY);
        assert_eq!(rows[3].iteration, 2);
    }

    #[test]
    fn header_names_every_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        let mut store = CsvChainStore::new(&path);
        store.reset(2).unwrap();
        store.flush().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().next().unwrap(),
            "iteration,walker,porb_pre,m1_pre,m2,w,theta,phi,log_prob"
        );
    }

    #[test]
    fn format_value_uses_readable_tokens() {
        assert_eq!(format_value(f64::NAN, None), "NA");
        assert_eq!(format_value(f64::INFINITY, None), "Inf");
        assert_eq!(format_value(f64::NEG_INFINITY, None), "-Inf");
        assert_eq!(format_value(-1.5, None), "-1.5");
        assert_eq!(format_value(1234.5678, Some(3)), "1.235e3");
    }

    #[test]
    fn parse_value_inverts_the_tokens() {
        assert!(parse_value("NA").unwrap().is_nan());
        assert_eq!(parse_value("Inf"), Some(f64::INFINITY));
        assert_eq!(parse_value("-Inf"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_value("-1.5"), Some(-1.5));
        assert_eq!(parse_value("1.235e3"), Some(1235.0));
        assert_eq!(parse_value("walker"), None);
    }

    #[test]
    fn fixed_precision_rows_parse_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        let mut store = CsvChainStore::new(&path).with_precision(6);
        store.reset(2).unwrap();
        store
            .append_iteration(1, &positions(), &[-3.25, -4.5])
            .unwrap();
        store.flush().unwrap();
        let rows: Vec<ChainRow> = ChainReader::open(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for (row, expected) in rows.iter().zip(positions()) {
            for (got, want) in row.position.iter().zip(expected) {
                assert!((got - want).abs() < 1e-5, "{got} vs {want}");
            }
        }
    }

    #[test]
    fn append_without_reset_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvChainStore::new(dir.path().join("chain.csv"));
        let err = store
            .append_iteration(1, &positions(), &[-1.0, -2.0])
            .unwrap_err();
        assert!(matches!(err, StorageError::NotReset));
    }

    #[test]
    fn out_of_order_iterations_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvChainStore::new(dir.path().join("chain.csv"));
        store.reset(2).unwrap();
        store
            .append_iteration(2, &positions(), &[-1.0, -2.0])
            .unwrap();
        let err = store
            .append_iteration(2, &positions(), &[-1.0, -2.0])
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::OutOfOrder { iteration: 2, last: 2 }
        ));
    }

    #[test]
    fn reset_truncates_an_existing_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        let mut store = CsvChainStore::new(&path);
        store.reset(2).unwrap();
        store
            .append_iteration(1, &positions(), &[-1.0, -2.0])
            .unwrap();
        store.flush().unwrap();
        store.reset(2).unwrap();
        store.flush().unwrap();
        let rows: Vec<_> = ChainReader::open(&path).unwrap().collect();
        assert!(rows.is_empty());
    }

    #[test]
    fn reset_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs/a/chain.csv");
        let mut store = CsvChainStore::new(&path);
        store.reset(2).unwrap();
        store.flush().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn flat_samples_discards_burn_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        let mut store = CsvChainStore::new(&path);
        store.reset(2).unwrap();
        for iteration in 1..=10 {
            store
                .append_iteration(iteration, &positions(), &[-1.0, -2.0])
                .unwrap();
        }
        store.flush().unwrap();
        let rows = flat_samples(&path, 4).unwrap();
        assert_eq!(rows.len(), 12);
        assert!(rows.iter().all(|row| row.iteration > 4));
    }

    #[test]
    fn memory_store_matches_csv_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        let mut csv = CsvChainStore::new(&path);
        let mut memory = MemoryChainStore::new();
        csv.reset(2).unwrap();
        memory.reset(2).unwrap();
        for iteration in 1..=3 {
            csv.append_iteration(iteration, &positions(), &[-1.0, f64::NEG_INFINITY])
                .unwrap();
            memory
                .append_iteration(iteration, &positions(), &[-1.0, f64::NEG_INFINITY])
                .unwrap();
        }
        csv.flush().unwrap();
        let from_csv: Vec<ChainRow> = ChainReader::open(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(from_csv, memory.rows());
    }

    #[test]
    fn unrelated_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.csv");
        fs::write(&path, "a,b,c\n1,2,3\n").unwrap();
        let err = ChainReader::open(&path).unwrap_err();
        assert!(matches!(err, StorageError::BadHeader { .. }));
    }

    #[test]
    fn truncated_rows_are_reported_with_their_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        let mut store = CsvChainStore::new(&path);
        store.reset(2).unwrap();
        store
            .append_iteration(1, &positions(), &[-1.0, -2.0])
            .unwrap();
        store.flush().unwrap();
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("2,0,5.6\n");
        fs::write(&path, content).unwrap();
        let rows: Vec<_> = ChainReader::open(&path).unwrap().collect();
        assert_eq!(rows.len(), 3);
        assert!(matches!(
            rows[2],
            Err(StorageError::BadRow { line: 4, .. })
        ));
    }
}
