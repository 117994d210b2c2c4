// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Schema-driven reshaping of flat record tables.

A [CoordSchema] groups data-variable columns by the tuple of dimension-key
columns that index them. The reshaper builds the datetime index, projects
each dimension group out of the table, de-duplicates, and scatters the
values into a coordinate-labelled [Dataset]. Groups are processed from most
dimensions to fewest so that deep groups fix the coordinate sets before
shallower subsets of the same dimensions are projected; ties keep the
schema's declaration order.

Missing declared data variables degrade gracefully (warn and drop): archive
files grow and lose data columns across versions while their coordinate
structure stays put. Unknown dimension keys, and any mismatch between the
declared and recovered variable sets after the merge, are fatal.
 */

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::warn;
use ndarray::{ArrayD, IxDyn};

use crate::dataset::{CoordValues, Dataset};
use crate::load::{Frame, LoadError};
use crate::table::{Column, Table};

/// The columns every Madrigal table must carry to build a time index.
const TIME_KEYS: [&str; 6] = ["year", "month", "day", "hour", "min", "sec"];

/// One dimension group: the data variables indexed by exactly this tuple of
/// dimension keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimGroup {
    /// Dimension-key column names (lowercase), e.g. `["time", "gdalt"]`.
    pub dims: Vec<String>,
    /// Data-variable column names living on those dimensions. An empty list
    /// means "every column not claimed elsewhere".
    pub vars: Vec<String>,
}

/// A caller-declared coordinate schema: an ordered set of dimension groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordSchema {
    groups: Vec<DimGroup>,
}

impl CoordSchema {
    /// An empty schema; loading with it produces a flat table.
    pub fn new() -> CoordSchema {
        CoordSchema::default()
    }

    /// Add a dimension group. Names are lowercased to match table columns.
    pub fn with_group(mut self, dims: &[&str], vars: &[&str]) -> CoordSchema {
        self.groups.push(DimGroup {
            dims: dims.iter().map(|d| d.to_lowercase()).collect(),
            vars: vars.iter().map(|v| v.to_lowercase()).collect(),
        });
        self
    }

    /// The list form of the original API: one group of dimension keys whose
    /// data variables are every remaining column.
    pub fn from_dims(dims: &[&str]) -> CoordSchema {
        CoordSchema::new().with_group(dims, &[])
    }

    /// The declared groups, in declaration order.
    pub fn groups(&self) -> &[DimGroup] {
        &self.groups
    }

    /// A schema that collapses to plain time indexing: either empty, or the
    /// single group `(time,)` with no explicit variables.
    pub fn is_trivial(&self) -> bool {
        match self.groups.as_slice() {
            [] => true,
            [only] => only.dims == ["time"] && only.vars.is_empty(),
            _ => false,
        }
    }
}

/// Build the per-row datetime index from the integer time columns.
///
/// Seconds-of-day are `3600·hour + 60·min + sec`, with fractional seconds
/// preserved.
pub(crate) fn build_time_index(table: &Table) -> Result<Vec<NaiveDateTime>, LoadError> {
    let missing: Vec<String> = TIME_KEYS
        .iter()
        .filter(|k| !table.contains(k))
        .map(|k| k.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingTimeColumns { missing });
    }

    // Presence was checked above; text time columns count as missing too.
    let numeric = |key: &str| -> Result<Vec<f64>, LoadError> {
        table.floats(key).ok_or_else(|| LoadError::MissingTimeColumns {
            missing: vec![key.to_string()],
        })
    };
    let years = numeric("year")?;
    let months = numeric("month")?;
    let days = numeric("day")?;
    let hours = numeric("hour")?;
    let mins = numeric("min")?;
    let secs = numeric("sec")?;

    let mut index = Vec::with_capacity(years.len());
    for row in 0..years.len() {
        let (y, m, d) = (years[row] as i64, months[row] as i64, days[row] as i64);
        let date = NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32).ok_or(
            LoadError::InvalidTimestamp {
                row,
                year: y,
                month: m,
                day: d,
            },
        )?;
        let uts = 3600.0 * hours[row] + 60.0 * mins[row] + secs[row];
        let time = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            + Duration::nanoseconds((uts * 1e9).round() as i64);
        index.push(time);
    }
    Ok(index)
}

/// Time-index a table without reshaping. Duplicate timestamps are kept, with
/// a warning suggesting a coordinate-labelled load instead.
pub(crate) fn flat(table: Table, index: Vec<NaiveDateTime>) -> Frame {
    let unique: HashSet<&NaiveDateTime> = index.iter().collect();
    if unique.len() != index.len() {
        warn!(
            "duplicated time indices, consider specifying additional coordinates \
             and storing the data as a coordinate-labelled dataset"
        );
    }
    Frame { index, table }
}

/// A single projected value, comparable and hashable so rows can be
/// de-duplicated and coordinates sorted.
#[derive(Debug, Clone)]
enum Cell {
    Float(f64),
    Time(NaiveDateTime),
    Text(String),
}

impl Cell {
    fn rank(&self) -> u8 {
        match self {
            Cell::Float(_) => 0,
            Cell::Time(_) => 1,
            Cell::Text(_) => 2,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Cell) -> bool {
        match (self, other) {
            (Cell::Float(a), Cell::Float(b)) => a.to_bits() == b.to_bits(),
            (Cell::Time(a), Cell::Time(b)) => a == b,
            (Cell::Text(a), Cell::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Cell::Float(v) => v.to_bits().hash(state),
            Cell::Time(v) => v.hash(state),
            Cell::Text(v) => v.hash(state),
        }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Cell) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Cell) -> std::cmp::Ordering {
        match (self, other) {
            (Cell::Float(a), Cell::Float(b)) => a.total_cmp(b),
            (Cell::Time(a), Cell::Time(b)) => a.cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            // A dimension column never mixes variants; order by kind for
            // totality.
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Reshape one record table against a (non-trivial) coordinate schema.
pub(crate) fn reshape(
    table: &Table,
    times: &[NaiveDateTime],
    schema: &CoordSchema,
) -> Result<Dataset, LoadError> {
    // `time` is available as a dimension key in every group.
    let mut available: Vec<String> = table.column_names().map(str::to_string).collect();
    if !available.iter().any(|c| c == "time") {
        available.push("time".to_string());
    }

    let groups = expand_groups(table, schema);

    // Deepest groups first; ties keep declaration order (stable sort).
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(groups[i].dims.len()));

    // Columns dropped from the declared set (text data variables cannot be
    // stored in an f64-labelled dataset); they are excluded from the final
    // recovered-variable check.
    let mut dropped: HashSet<String> = HashSet::new();

    let mut merged: Option<Dataset> = None;
    for &gi in &order {
        let group = &groups[gi];

        let unknown: Vec<String> = group
            .dims
            .iter()
            .filter(|d| !available.iter().any(|c| &c == d))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(LoadError::UnknownCoordinateKey {
                unknown,
                available,
            });
        }

        // Missing declared data variables: all missing is fatal, some
        // missing degrades with a warning (file-version skew).
        let (good, bad): (Vec<&String>, Vec<&String>) = group
            .vars
            .iter()
            .partition(|v| table.contains(v) || v.as_str() == "time");
        if good.is_empty() && !group.vars.is_empty() {
            return Err(LoadError::AllVariablesUnknown(group.vars.clone()));
        }
        if !bad.is_empty() {
            warn!(
                "unknown data variable(s) {:?}, using only: {:?}",
                bad, good
            );
        }

        // Project the surviving variables as floats; text columns cannot be
        // scattered into the labelled arrays and are dropped with a warning.
        let mut vars: Vec<(String, Vec<f64>)> = Vec::with_capacity(good.len());
        for name in good {
            match table.column(name).and_then(Column::as_floats) {
                Some(values) => vars.push((name.clone(), values)),
                None => {
                    warn!(
                        "text data variable {} cannot be stored in a labelled dataset, dropping",
                        name
                    );
                    dropped.insert(name.clone());
                }
            }
        }

        let dim_cells: Vec<Vec<Cell>> = group
            .dims
            .iter()
            .map(|dim| project_cells(table, times, dim))
            .collect();

        let fragment = build_fragment(&group.dims, &dim_cells, &vars)?;
        match merged.as_mut() {
            None => merged = Some(fragment),
            Some(acc) => acc.merge(fragment)?,
        }
    }

    let merged = merged.unwrap_or_default();

    // Every declared (non-dropped) column must come back out of the merge,
    // and nothing else may appear.
    let recovered: BTreeSet<String> = merged.all_names().into_iter().collect();
    let declared: BTreeSet<String> = available
        .iter()
        .filter(|c| !dropped.contains(c.as_str()))
        .cloned()
        .collect();
    if recovered != declared {
        let missing: Vec<&str> = declared
            .difference(&recovered)
            .map(String::as_str)
            .collect();
        let extra: Vec<&str> = recovered
            .difference(&declared)
            .map(String::as_str)
            .collect();
        let mut detail = String::new();
        if !missing.is_empty() {
            detail.push_str(&format!("missing: {}", missing.join(" ")));
        }
        if !extra.is_empty() {
            if !detail.is_empty() {
                detail.push_str("; ");
            }
            detail.push_str(&format!("have extra: {}", extra.join(" ")));
        }
        return Err(LoadError::VariableCountMismatch {
            recovered: recovered.len(),
            declared: declared.len(),
            detail,
        });
    }

    Ok(merged)
}

/// Resolve empty variable lists: a group declared without variables claims
/// every column not named by any group.
fn expand_groups(table: &Table, schema: &CoordSchema) -> Vec<DimGroup> {
    let claimed: HashSet<&str> = schema
        .groups()
        .iter()
        .flat_map(|g| g.dims.iter().chain(g.vars.iter()))
        .map(String::as_str)
        .collect();
    schema
        .groups()
        .iter()
        .map(|group| {
            if group.vars.is_empty() {
                let vars = table
                    .column_names()
                    .filter(|c| !claimed.contains(c))
                    .map(str::to_string)
                    .collect();
                DimGroup {
                    dims: group.dims.clone(),
                    vars,
                }
            } else {
                group.clone()
            }
        })
        .collect()
}

/// The values of one dimension-key column, as comparable cells.
fn project_cells(table: &Table, times: &[NaiveDateTime], dim: &str) -> Vec<Cell> {
    if dim == "time" {
        return times.iter().map(|&t| Cell::Time(t)).collect();
    }
    match table.column(dim) {
        Some(Column::Text(v)) => v.iter().map(|s| Cell::Text(s.clone())).collect(),
        Some(column) => column
            .as_floats()
            .unwrap_or_default()
            .into_iter()
            .map(Cell::Float)
            .collect(),
        // Checked against `available` by the caller.
        None => Vec::new(),
    }
}

/// De-duplicate the projected rows and scatter them into a labelled
/// fragment over the group's dimensions.
fn build_fragment(
    dims: &[String],
    dim_cells: &[Vec<Cell>],
    vars: &[(String, Vec<f64>)],
) -> Result<Dataset, LoadError> {
    let n_rows = dim_cells.first().map_or(0, Vec::len);

    // Exact duplicate rows (same dimension key *and* same values) collapse;
    // rows that share a key but differ in data are kept and the last wins,
    // matching the source file's order.
    let mut seen: HashSet<(Vec<Cell>, Vec<u64>)> = HashSet::new();
    let mut kept: Vec<usize> = Vec::with_capacity(n_rows);
    for row in 0..n_rows {
        let key: Vec<Cell> = dim_cells.iter().map(|col| col[row].clone()).collect();
        let values: Vec<u64> = vars.iter().map(|(_, v)| v[row].to_bits()).collect();
        if seen.insert((key, values)) {
            kept.push(row);
        }
    }

    // Sorted unique coordinates per dimension, and each row's position.
    let mut coords: Vec<CoordValues> = Vec::with_capacity(dims.len());
    let mut positions: Vec<HashMap<Cell, usize>> = Vec::with_capacity(dims.len());
    for cells in dim_cells {
        let unique: BTreeMap<Cell, usize> = kept
            .iter()
            .map(|&row| (cells[row].clone(), 0))
            .collect();
        let sorted: Vec<Cell> = unique.into_keys().collect();
        positions.push(
            sorted
                .iter()
                .enumerate()
                .map(|(i, c)| (c.clone(), i))
                .collect(),
        );
        coords.push(cells_to_coords(sorted));
    }

    let shape: Vec<usize> = coords.iter().map(CoordValues::len).collect();
    let mut dataset = Dataset::new();
    for (dim, coord) in dims.iter().zip(coords) {
        dataset.insert_coord(dim.clone(), coord);
    }

    for (name, values) in vars {
        let mut array = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
        for &row in &kept {
            let idx: Vec<usize> = dim_cells
                .iter()
                .zip(&positions)
                .map(|(cells, pos)| pos[&cells[row]])
                .collect();
            array[IxDyn(&idx)] = values[row];
        }
        dataset.insert_variable(name.clone(), dims.to_vec(), array)?;
    }
    Ok(dataset)
}

/// Rebuild a typed coordinate array from sorted cells.
fn cells_to_coords(cells: Vec<Cell>) -> CoordValues {
    match cells.first() {
        Some(Cell::Time(_)) => CoordValues::Time(
            cells
                .into_iter()
                .map(|c| match c {
                    Cell::Time(t) => t,
                    _ => unreachable!("mixed-type coordinate column"),
                })
                .collect(),
        ),
        Some(Cell::Text(_)) => CoordValues::Text(
            cells
                .into_iter()
                .map(|c| match c {
                    Cell::Text(s) => s,
                    _ => unreachable!("mixed-type coordinate column"),
                })
                .collect(),
        ),
        _ => CoordValues::Float(
            cells
                .into_iter()
                .map(|c| match c {
                    Cell::Float(f) => f,
                    _ => unreachable!("mixed-type coordinate column"),
                })
                .collect(),
        ),
    }
}
