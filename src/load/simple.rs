// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reader for Madrigal "simple" files: gzip-compressed whitespace-delimited
//! text with a one-line header naming the columns.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::load::{path_str, LoadError};
use crate::metadata::{Meta, MetaEntry};
use crate::table::{Column, Table};

/// Read one `.simple.gz` file into a record table.
///
/// The format carries no units or descriptions, so metadata entries hold the
/// column name only.
pub(crate) fn read_table(fname: &Path, meta: &mut Meta) -> Result<Table, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path_str(fname),
        source,
    };
    let file = File::open(fname).map_err(io_err)?;
    let reader = BufReader::new(GzDecoder::new(file));

    let mut lines = reader.lines().enumerate();
    let header: Vec<String> = match lines.next() {
        Some((_, line)) => line
            .map_err(io_err)?
            .split_whitespace()
            .map(|name| name.to_lowercase())
            .collect(),
        None => Vec::new(),
    };

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); header.len()];
    for (line_no, line) in lines {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != header.len() {
            return Err(LoadError::RaggedRow {
                path: path_str(fname),
                header: header.len(),
                line: line_no + 1,
                got: tokens.len(),
            });
        }
        for (column, token) in columns.iter_mut().zip(&tokens) {
            let value: f64 = token.parse().map_err(|_| LoadError::ParseFloat {
                path: path_str(fname),
                line: line_no + 1,
                token: token.to_string(),
            })?;
            column.push(value);
        }
    }

    let mut table = Table::new();
    for (name, values) in header.iter().zip(columns) {
        table.insert(name, Column::Float(values))?;
        meta.insert_if_absent(name, MetaEntry::named(name.clone()));
    }
    Ok(table)
}
