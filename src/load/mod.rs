// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The generalised Madrigal file loader.

[load] reconciles the three archive formats into one in-memory
representation: a flat time-indexed [Frame] when no (non-trivial) coordinate
schema is supplied, or a coordinate-labelled [Dataset](crate::Dataset) when
one is. Files are routed to a per-format reader by filename substring; files
matching no known format are skipped.
 */

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::warn;
use thiserror::Error;

use crate::dataset::{CoordValues, Dataset, DatasetError};
use crate::metadata::Meta;
use crate::table::{Column, ColumnLengthError, Table};

pub(crate) mod hdf5;
pub(crate) mod netcdf;
mod reshape;
pub(crate) mod simple;

pub use reshape::{CoordSchema, DimGroup};

/// The on-disk formats Madrigal serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Dense binary table container (`Data/Table Layout`).
    Hdf5,
    /// Self-describing array container.
    NetCdf4,
    /// Gzipped whitespace-delimited text with a one-line header.
    SimpleGz,
}

impl FileType {
    /// All known formats, in routing order (first substring match wins).
    pub const ALL: [FileType; 3] = [FileType::Hdf5, FileType::NetCdf4, FileType::SimpleGz];

    /// The short name used in filenames and download requests.
    pub fn name(self) -> &'static str {
        match self {
            FileType::Hdf5 => "hdf5",
            FileType::NetCdf4 => "netCDF4",
            FileType::SimpleGz => "simple",
        }
    }

    /// The filename extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Hdf5 => "hdf5",
            FileType::NetCdf4 => "netCDF4",
            FileType::SimpleGz => "simple.gz",
        }
    }

    /// Parse a short file-type name.
    pub fn from_name(name: &str) -> Result<FileType, LoadError> {
        FileType::ALL
            .iter()
            .copied()
            .find(|ft| ft.name() == name)
            .ok_or_else(|| LoadError::UnknownFileType {
                got: name.to_string(),
                known: ["hdf5", "netCDF4", "simple"],
            })
    }

    /// Route a filename to a format by substring match.
    pub fn matching(fname: &str) -> Option<FileType> {
        FileType::ALL.iter().copied().find(|ft| fname.contains(ft.name()))
    }
}

/// A flat, time-indexed table: one row per time sample, rows in time order
/// after a multi-file load (duplicate timestamps are preserved).
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// The constructed datetime index, one entry per row.
    pub index: Vec<NaiveDateTime>,
    /// The data columns.
    pub table: Table,
}

impl Frame {
    /// An empty frame: no rows, no columns.
    pub fn new() -> Frame {
        Frame::default()
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Row-wise concatenation. Columns are the union of the inputs' columns
    /// in first-seen order; rows from a frame lacking a column are filled
    /// with NaN (numeric) or the empty string (text).
    pub fn concat(frames: Vec<Frame>) -> Result<Frame, ColumnLengthError> {
        let mut index = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for frame in &frames {
            for name in frame.table.column_names() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            index.extend_from_slice(&frame.index);
        }

        let mut table = Table::new();
        for name in &names {
            // Use the first frame that has the column to fix its type.
            let is_text = frames
                .iter()
                .find_map(|f| f.table.column(name))
                .is_some_and(|c| matches!(c, Column::Text(_)));
            if is_text {
                let mut values = Vec::with_capacity(index.len());
                for frame in &frames {
                    match frame.table.column(name) {
                        Some(Column::Text(v)) => values.extend_from_slice(v),
                        Some(other) => values.extend(
                            other
                                .as_floats()
                                .unwrap_or_default()
                                .iter()
                                .map(f64::to_string),
                        ),
                        None => values.extend(std::iter::repeat_with(String::new).take(frame.n_rows())),
                    }
                }
                table.insert(name, Column::Text(values))?;
            } else {
                let mut values = Vec::with_capacity(index.len());
                for frame in &frames {
                    match frame.table.column(name).and_then(Column::as_floats) {
                        Some(v) => values.extend_from_slice(&v),
                        None => values.extend(std::iter::repeat(f64::NAN).take(frame.n_rows())),
                    }
                }
                table.insert(name, Column::Float(values))?;
            }
        }
        Ok(Frame { index, table })
    }

    /// Stable sort of the rows by timestamp.
    pub fn sort_by_time(&mut self) {
        let mut order: Vec<usize> = (0..self.index.len()).collect();
        order.sort_by_key(|&i| self.index[i]);
        self.index = order.iter().map(|&i| self.index[i]).collect();
        let mut sorted = Table::new();
        for (name, column) in self.table.iter() {
            // take() preserves lengths, so reinsertion cannot fail.
            let _ = sorted.insert(name, column.take(&order));
        }
        self.table = sorted;
    }

    /// Recast as a coordinate-labelled dataset with `time` as the only
    /// dimension. Text columns cannot be represented and are fatal here.
    pub fn to_dataset(&self) -> Result<Dataset, LoadError> {
        let mut ds = Dataset::new();
        ds.insert_coord("time", CoordValues::Time(self.index.clone()));
        for (name, column) in self.table.iter() {
            let values = column
                .as_floats()
                .ok_or_else(|| LoadError::TextDataVariable(name.to_string()))?;
            ds.insert_variable(
                name,
                vec!["time".to_string()],
                ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[values.len()]), values)
                    .expect("1-D shape always matches"),
            )?;
        }
        Ok(ds)
    }
}

/// What a load hands back: the shape depends on whether a coordinate schema
/// was supplied.
#[derive(Debug, Clone)]
pub enum LoadedData {
    /// A flat time-indexed table (no schema, or the trivial `(time,)` one).
    Flat(Frame),
    /// A coordinate-labelled multi-dimensional dataset.
    Labeled(Dataset),
}

/// Errors from the file loader and reshaper.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unable to construct time index, missing {missing:?}")]
    MissingTimeColumns { missing: Vec<String> },

    #[error("invalid timestamp at row {row}: {year:04}-{month:02}-{day:02}")]
    InvalidTimestamp {
        row: usize,
        year: i64,
        month: i64,
        day: i64,
    },

    #[error("unknown coordinate key in {unknown:?}, use only: {available:?}")]
    UnknownCoordinateKey {
        unknown: Vec<String>,
        available: Vec<String>,
    },

    #[error("all data variables {0:?} are unknown")]
    AllVariablesUnknown(Vec<String>),

    #[error("column {0} holds text; text columns can only serve as coordinate dimensions")]
    TextDataVariable(String),

    #[error("coordinates not supplied for all data columns: {recovered} != {declared}; {detail}")]
    VariableCountMismatch {
        recovered: usize,
        declared: usize,
        detail: String,
    },

    #[error("unknown file format {got}, accepts {known:?}")]
    UnknownFileType {
        got: String,
        known: [&'static str; 3],
    },

    #[error("{0}")]
    Dataset(#[from] DatasetError),

    #[error("{0}")]
    Column(#[from] ColumnLengthError),

    #[error("error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} line {line}: cannot parse {token:?} as a number")]
    ParseFloat {
        path: String,
        line: usize,
        token: String,
    },

    #[error("{path}: header names {header} columns but line {line} has {got}")]
    RaggedRow {
        path: String,
        header: usize,
        line: usize,
        got: usize,
    },

    #[error("hdf5 error in {path}: {source}")]
    Hdf5 {
        path: String,
        #[source]
        source: ::hdf5::Error,
    },

    #[error("{path} has no {name}")]
    MissingHdf5Object { path: String, name: String },

    #[error("netcdf error in {path}: {source}")]
    NetCdf {
        path: String,
        #[source]
        source: ::netcdf::Error,
    },

    #[error("{path} has no usable time coordinate")]
    MissingTimeDimension { path: String },

    #[error("{path} row {row}: {seconds} is not a valid epoch time")]
    InvalidEpoch {
        path: String,
        row: usize,
        seconds: f64,
    },
}

pub(crate) fn path_str(path: &Path) -> String {
    path.display().to_string()
}

/// Load one or more Madrigal files into a common representation.
///
/// Filenames are routed to a format reader by substring match against the
/// known format names; a filename matching none of them is skipped. With no
/// schema (or the trivial time-only one) the result is [LoadedData::Flat];
/// otherwise the tables are reshaped against the schema into a
/// [LoadedData::Labeled] dataset. Zero input files produce an empty result
/// of the matching flavour, with an empty (but valid) [Meta].
pub fn load(fnames: &[PathBuf], schema: Option<&CoordSchema>) -> Result<(LoadedData, Meta), LoadError> {
    // Sort the inputs into per-format buckets.
    let mut hdf5_files: Vec<&PathBuf> = Vec::new();
    let mut netcdf_files: Vec<&PathBuf> = Vec::new();
    let mut simple_files: Vec<&PathBuf> = Vec::new();
    for fname in fnames {
        match FileType::matching(&path_str(fname)) {
            Some(FileType::Hdf5) => hdf5_files.push(fname),
            Some(FileType::NetCdf4) => netcdf_files.push(fname),
            Some(FileType::SimpleGz) => simple_files.push(fname),
            None => warn!(
                "skipping {}: does not match any known Madrigal file type",
                path_str(fname)
            ),
        }
    }

    let mut meta = Meta::new();
    let trivial = schema.map_or(true, CoordSchema::is_trivial);

    // netCDF files arrive natively coordinate-labelled.
    let mut nc_data: Option<Dataset> = if netcdf_files.is_empty() {
        None
    } else {
        Some(netcdf::read_files(&netcdf_files, &mut meta)?)
    };

    // HDF5 and simple files share the table-then-reshape path.
    let mut frames: Vec<Frame> = Vec::new();
    let mut labelled: Vec<Dataset> = Vec::new();
    for (fname, ftype) in hdf5_files
        .iter()
        .map(|f| (*f, FileType::Hdf5))
        .chain(simple_files.iter().map(|f| (*f, FileType::SimpleGz)))
    {
        let table = match ftype {
            FileType::Hdf5 => hdf5::read_table(fname, &mut meta)?,
            FileType::SimpleGz => simple::read_table(fname, &mut meta)?,
            FileType::NetCdf4 => unreachable!("netCDF files are handled above"),
        };
        let times = reshape::build_time_index(&table)?;
        if trivial {
            frames.push(reshape::flat(table, times));
        } else {
            // A non-trivial schema is always Some here.
            labelled.push(reshape::reshape(&table, &times, schema.expect("non-trivial schema"))?);
        }
    }

    // Combine per-file results.
    if trivial {
        let mut frame = Frame::concat(frames)?;
        frame.sort_by_time();
        match nc_data {
            None => Ok((LoadedData::Flat(frame), meta)),
            Some(mut ds) => {
                // Mixing a labelled netCDF result with flat fragments only
                // works when everything stays time-indexed; anything else is
                // fatal rather than silently dropped.
                if frame.n_rows() > 0 {
                    ds.merge(frame.to_dataset()?)?;
                }
                let (index, table) = ds.to_frame()?;
                Ok((LoadedData::Flat(Frame { index, table }), meta))
            }
        }
    } else {
        let mut merged: Option<Dataset> = None;
        for ds in labelled {
            match merged.as_mut() {
                None => merged = Some(ds),
                Some(acc) => acc.merge(ds)?,
            }
        }
        let data = match (nc_data.take(), merged) {
            (Some(mut nc), Some(rest)) => {
                nc.merge(rest)?;
                nc
            }
            (Some(nc), None) => nc,
            (None, Some(rest)) => rest,
            (None, None) => Dataset::new(),
        };
        Ok((LoadedData::Labeled(data), meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_load_flat() {
        let (data, meta) = load(&[], None).unwrap();
        match data {
            LoadedData::Flat(frame) => {
                assert_eq!(frame.n_rows(), 0);
                assert!(frame.table.is_empty());
            }
            LoadedData::Labeled(_) => panic!("expected a flat result"),
        }
        assert!(meta.is_empty());
    }

    #[test]
    fn empty_load_labeled() {
        let schema = CoordSchema::new().with_group(&["time", "gdalt"], &["ne"]);
        let (data, meta) = load(&[], Some(&schema)).unwrap();
        match data {
            LoadedData::Labeled(ds) => assert!(ds.is_empty()),
            LoadedData::Flat(_) => panic!("expected a labelled result"),
        }
        assert!(meta.is_empty());
    }

    #[test]
    fn unknown_file_type_is_skipped() {
        // A bogus extension is skipped, leaving an empty (valid) result.
        let (data, _) = load(&[PathBuf::from("jro20210314.bin")], None).unwrap();
        match data {
            LoadedData::Flat(frame) => assert_eq!(frame.n_rows(), 0),
            LoadedData::Labeled(_) => panic!("expected a flat result"),
        }
    }

    #[test]
    fn file_type_names() {
        assert_eq!(FileType::from_name("hdf5").unwrap(), FileType::Hdf5);
        assert_eq!(FileType::from_name("netCDF4").unwrap(), FileType::NetCdf4);
        assert_eq!(FileType::from_name("simple").unwrap(), FileType::SimpleGz);
        assert!(matches!(
            FileType::from_name("ascii"),
            Err(LoadError::UnknownFileType { .. })
        ));
        assert_eq!(FileType::SimpleGz.extension(), "simple.gz");
    }

    #[test]
    fn routing_first_match_wins() {
        assert_eq!(
            FileType::matching("dms_ut_20140101.002.hdf5"),
            Some(FileType::Hdf5)
        );
        assert_eq!(
            FileType::matching("gps210314g.002.netCDF4"),
            Some(FileType::NetCdf4)
        );
        assert_eq!(
            FileType::matching("jro20210314.001.simple.gz"),
            Some(FileType::SimpleGz)
        );
        assert_eq!(FileType::matching("jro20210314.001.txt"), None);
    }
}
