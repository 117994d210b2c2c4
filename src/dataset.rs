// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The coordinate-labelled, multi-dimensional data representation.

A [Dataset] holds named dimensions, each with a coordinate array, and named
data variables declared over subsets of those dimensions. Merging two
datasets outer-joins each shared dimension: coordinate values become the
sorted union and variables are re-indexed onto the widened axes with NaN
fill. Positions that no input file covered therefore read as NaN.
 */

use std::collections::HashMap;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use ndarray::{ArrayD, Axis, IxDyn};
use thiserror::Error;

use crate::table::{Column, Table};

/// Coordinate values along one named dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordValues {
    /// Numeric coordinates (altitudes, latitudes, codes...).
    Float(Vec<f64>),
    /// The time dimension.
    Time(Vec<NaiveDateTime>),
    /// String-valued coordinates (e.g. GNSS receiver site codes).
    Text(Vec<String>),
}

impl CoordValues {
    /// Number of points along the dimension.
    pub fn len(&self) -> usize {
        match self {
            CoordValues::Float(v) => v.len(),
            CoordValues::Time(v) => v.len(),
            CoordValues::Text(v) => v.len(),
        }
    }

    /// Is the dimension empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn type_name(&self) -> &'static str {
        match self {
            CoordValues::Float(_) => "float",
            CoordValues::Time(_) => "time",
            CoordValues::Text(_) => "text",
        }
    }

    /// Sorted union of two coordinate arrays of the same type.
    fn union(&self, other: &CoordValues) -> Result<CoordValues, DatasetError> {
        match (self, other) {
            (CoordValues::Float(a), CoordValues::Float(b)) => {
                let mut all: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
                all.sort_by(|x, y| x.total_cmp(y));
                all.dedup_by(|x, y| x.to_bits() == y.to_bits());
                Ok(CoordValues::Float(all))
            }
            (CoordValues::Time(a), CoordValues::Time(b)) => {
                let mut all: Vec<NaiveDateTime> = a.iter().chain(b.iter()).copied().collect();
                all.sort();
                all.dedup();
                Ok(CoordValues::Time(all))
            }
            (CoordValues::Text(a), CoordValues::Text(b)) => {
                let mut all: Vec<String> = a.iter().chain(b.iter()).cloned().collect();
                all.sort();
                all.dedup();
                Ok(CoordValues::Text(all))
            }
            _ => Err(DatasetError::MismatchedCoordinateType {
                have: self.type_name(),
                got: other.type_name(),
            }),
        }
    }

    /// The values at `positions`, in that order.
    fn take(&self, positions: &[usize]) -> CoordValues {
        match self {
            CoordValues::Float(v) => {
                CoordValues::Float(positions.iter().map(|&i| v[i]).collect())
            }
            CoordValues::Time(v) => CoordValues::Time(positions.iter().map(|&i| v[i]).collect()),
            CoordValues::Text(v) => {
                CoordValues::Text(positions.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }

    /// For each of our values, its position within `within` (which must be a
    /// superset, as produced by [CoordValues::union]).
    fn positions_in(&self, within: &CoordValues) -> Vec<usize> {
        match (self, within) {
            (CoordValues::Float(a), CoordValues::Float(u)) => {
                let lookup: HashMap<u64, usize> = u
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (v.to_bits(), i))
                    .collect();
                a.iter().map(|v| lookup[&v.to_bits()]).collect()
            }
            (CoordValues::Time(a), CoordValues::Time(u)) => {
                let lookup: HashMap<NaiveDateTime, usize> =
                    u.iter().enumerate().map(|(i, v)| (*v, i)).collect();
                a.iter().map(|v| lookup[v]).collect()
            }
            (CoordValues::Text(a), CoordValues::Text(u)) => {
                let lookup: HashMap<&str, usize> = u
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (v.as_str(), i))
                    .collect();
                a.iter().map(|v| lookup[v.as_str()]).collect()
            }
            // union() has already rejected mixed types.
            _ => unreachable!("coordinate type mismatch survived union"),
        }
    }
}

/// One data variable and the dimensions it is declared over.
#[derive(Debug, Clone)]
pub struct DataVariable {
    /// Dimension names, outermost first; one per axis of `values`.
    pub dims: Vec<String>,
    /// The data, with NaN at positions no input covered.
    pub values: ArrayD<f64>,
}

/// Errors from building or combining coordinate-labelled datasets.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("variable {var} declared over unknown dimension {dim}")]
    UnknownDimension { var: String, dim: String },

    #[error("variable {var} has shape {got:?}, but its dimensions {dims:?} imply {expected:?}")]
    ShapeMismatch {
        var: String,
        dims: Vec<String>,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("variable {0} is defined by more than one input; refusing to merge conflicting data")]
    DuplicateVariable(String),

    #[error("cannot combine {have} coordinates with {got} coordinates")]
    MismatchedCoordinateType {
        have: &'static str,
        got: &'static str,
    },

    #[error("cannot concatenate along time: variable {0} is not present in every file")]
    VariableSetMismatch(String),

    #[error("cannot select along {0}: no such dimension")]
    NoSuchDimension(String),

    #[error("no time dimension present")]
    NoTimeCoordinate,

    #[error(
        "variable {0} is not indexed by time alone; the data cannot be flattened to a time-indexed table"
    )]
    NotTimeIndexed(String),
}

/// A set of named dimensions with coordinate arrays, plus data variables
/// declared over them.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    coords: IndexMap<String, CoordValues>,
    variables: IndexMap<String, DataVariable>,
}

impl Dataset {
    /// An empty dataset: no dimensions, no variables.
    pub fn new() -> Dataset {
        Dataset::default()
    }

    /// True when the dataset has neither coordinates nor variables.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty() && self.variables.is_empty()
    }

    /// Add (or replace) a named dimension and its coordinate values.
    pub fn insert_coord<S: Into<String>>(&mut self, name: S, values: CoordValues) {
        self.coords.insert(name.into(), values);
    }

    /// Add a data variable declared over existing dimensions.
    pub fn insert_variable<S: Into<String>>(
        &mut self,
        name: S,
        dims: Vec<String>,
        values: ArrayD<f64>,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        let mut expected = Vec::with_capacity(dims.len());
        for dim in &dims {
            match self.coords.get(dim) {
                Some(coord) => expected.push(coord.len()),
                None => {
                    return Err(DatasetError::UnknownDimension {
                        var: name,
                        dim: dim.clone(),
                    })
                }
            }
        }
        if values.shape() != expected.as_slice() {
            return Err(DatasetError::ShapeMismatch {
                var: name,
                dims,
                expected,
                got: values.shape().to_vec(),
            });
        }
        self.variables.insert(name, DataVariable { dims, values });
        Ok(())
    }

    /// Borrow a coordinate array by dimension name.
    pub fn coord(&self, name: &str) -> Option<&CoordValues> {
        self.coords.get(name)
    }

    /// Borrow a data variable by name.
    pub fn variable(&self, name: &str) -> Option<&DataVariable> {
        self.variables.get(name)
    }

    /// Dimension names in insertion order.
    pub fn coord_names(&self) -> impl Iterator<Item = &str> {
        self.coords.keys().map(String::as_str)
    }

    /// Data-variable names in insertion order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Iterate `(name, variable)` pairs in insertion order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &DataVariable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every name the dataset knows: coordinates then data variables. This
    /// is the set the reshaper's recovered-variable check runs against.
    pub fn all_names(&self) -> Vec<String> {
        self.coords
            .keys()
            .chain(self.variables.keys())
            .cloned()
            .collect()
    }

    /// Merge another dataset into this one, outer-joining every shared
    /// dimension and NaN-filling positions either side did not cover.
    ///
    /// A data variable defined on both sides is a fatal conflict.
    pub fn merge(&mut self, other: Dataset) -> Result<(), DatasetError> {
        // Widen our own axes first.
        for (dim, theirs) in &other.coords {
            if let Some(ours) = self.coords.get(dim) {
                let union = ours.union(theirs)?;
                if *ours != union {
                    let mapping = ours.positions_in(&union);
                    let new_len = union.len();
                    self.reindex_dim(dim, &mapping, new_len);
                    self.coords.insert(dim.clone(), union);
                }
            } else {
                self.coords.insert(dim.clone(), theirs.clone());
            }
        }

        // Re-index the incoming variables onto the widened axes and adopt
        // them.
        for (name, var) in other.variables {
            if self.variables.contains_key(&name) {
                return Err(DatasetError::DuplicateVariable(name));
            }
            let mut values = var.values;
            for (axis, dim) in var.dims.iter().enumerate() {
                let ours = &self.coords[dim];
                let theirs = &other.coords[dim];
                if ours != theirs {
                    let mapping = theirs.positions_in(ours);
                    values = scatter_axis(&values, axis, &mapping, ours.len());
                }
            }
            self.variables.insert(
                name,
                DataVariable {
                    dims: var.dims,
                    values,
                },
            );
        }
        Ok(())
    }

    /// Re-index every variable along a (possibly shared) dimension whose
    /// coordinate array is being replaced by a superset.
    fn reindex_dim(&mut self, dim: &str, mapping: &[usize], new_len: usize) {
        for var in self.variables.values_mut() {
            for (axis, var_dim) in var.dims.iter().enumerate() {
                if var_dim == dim {
                    var.values = scatter_axis(&var.values, axis, mapping, new_len);
                }
            }
        }
    }

    /// Concatenate another dataset along the time dimension, sorting the
    /// result chronologically. Every variable must exist on both sides and
    /// all non-time coordinates must agree; consecutive files of one
    /// experiment satisfy both.
    pub fn concat_time(&mut self, other: Dataset) -> Result<(), DatasetError> {
        let (our_times, their_times) = match (self.coords.get("time"), other.coords.get("time")) {
            (Some(CoordValues::Time(a)), Some(CoordValues::Time(b))) => (a.clone(), b.clone()),
            _ => return Err(DatasetError::NoTimeCoordinate),
        };

        for (dim, theirs) in &other.coords {
            if dim == "time" {
                continue;
            }
            match self.coords.get(dim) {
                Some(ours) if ours == theirs => (),
                Some(ours) => {
                    return Err(DatasetError::MismatchedCoordinateType {
                        have: ours.type_name(),
                        got: theirs.type_name(),
                    })
                }
                None => {
                    self.coords.insert(dim.clone(), theirs.clone());
                }
            }
        }

        // Chronological order over the concatenated axis.
        let mut all_times: Vec<NaiveDateTime> =
            our_times.iter().chain(their_times.iter()).copied().collect();
        let mut order: Vec<usize> = (0..all_times.len()).collect();
        order.sort_by_key(|&i| all_times[i]);
        all_times.sort();

        for (name, ours) in self.variables.iter_mut() {
            let theirs = other
                .variables
                .get(name)
                .ok_or_else(|| DatasetError::VariableSetMismatch(name.clone()))?;
            let axis = match ours.dims.iter().position(|d| d == "time") {
                Some(axis) => axis,
                // Time-invariant variables must simply agree.
                None => continue,
            };
            let glued = ndarray::concatenate(Axis(axis), &[ours.values.view(), theirs.values.view()])
                .map_err(|_| DatasetError::ShapeMismatch {
                    var: name.clone(),
                    dims: ours.dims.clone(),
                    expected: ours.values.shape().to_vec(),
                    got: theirs.values.shape().to_vec(),
                })?;
            ours.values = glued.select(Axis(axis), &order);
        }
        for name in other.variables.keys() {
            if !self.variables.contains_key(name) {
                return Err(DatasetError::VariableSetMismatch(name.clone()));
            }
        }

        self.coords
            .insert("time".to_string(), CoordValues::Time(all_times));
        Ok(())
    }

    /// Flatten to a time-indexed table, possible only when every variable is
    /// one-dimensional on time and time is the only dimension.
    pub fn to_frame(&self) -> Result<(Vec<NaiveDateTime>, Table), DatasetError> {
        let times = match self.coords.get("time") {
            Some(CoordValues::Time(t)) => t.clone(),
            _ => return Err(DatasetError::NoTimeCoordinate),
        };
        if let Some((name, _)) = self.coords.iter().find(|(name, _)| name.as_str() != "time") {
            return Err(DatasetError::NotTimeIndexed(name.clone()));
        }

        let mut table = Table::new();
        for (name, var) in &self.variables {
            if var.dims != ["time"] {
                return Err(DatasetError::NotTimeIndexed(name.clone()));
            }
            let values = var.values.iter().copied().collect();
            // Equal lengths are guaranteed by the shape checks at insertion.
            table
                .insert(name, Column::Float(values))
                .map_err(|_| DatasetError::NotTimeIndexed(name.clone()))?;
        }
        Ok((times, table))
    }

    /// Drop a length-1 dimension, removing its axis from every variable
    /// declared over it. Longer (or absent) dimensions are left alone.
    pub fn squeeze(&mut self, dim: &str) {
        if self.coords.get(dim).map_or(true, |c| c.len() != 1) {
            return;
        }
        self.coords.shift_remove(dim);
        for var in self.variables.values_mut() {
            if let Some(axis) = var.dims.iter().position(|d| d == dim) {
                var.values = var.values.index_axis(Axis(axis), 0).to_owned();
                var.dims.remove(axis);
            }
        }
    }

    /// Keep only the given positions along `dim`, in the given order,
    /// narrowing every variable declared over it.
    pub fn select(&mut self, dim: &str, positions: &[usize]) -> Result<(), DatasetError> {
        let coord = self
            .coords
            .get(dim)
            .ok_or_else(|| DatasetError::NoSuchDimension(dim.to_string()))?;
        let narrowed = coord.take(positions);
        self.coords.insert(dim.to_string(), narrowed);
        for var in self.variables.values_mut() {
            let axes: Vec<usize> = var
                .dims
                .iter()
                .enumerate()
                .filter(|(_, d)| d.as_str() == dim)
                .map(|(axis, _)| axis)
                .collect();
            for axis in axes {
                var.values = var.values.select(Axis(axis), positions);
            }
        }
        Ok(())
    }
}

/// Place the slices of `values` along `axis` into a longer axis of
/// `new_len`, at the positions given by `mapping`; everything else is NaN.
fn scatter_axis(values: &ArrayD<f64>, axis: usize, mapping: &[usize], new_len: usize) -> ArrayD<f64> {
    let mut shape = values.shape().to_vec();
    shape[axis] = new_len;
    let mut out = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
    for (old_pos, &new_pos) in mapping.iter().enumerate() {
        out.index_axis_mut(Axis(axis), new_pos)
            .assign(&values.index_axis(Axis(axis), old_pos));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::IxDyn;

    fn t(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 14)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn time_dataset(hours: &[u32], name: &str, values: &[f64]) -> Dataset {
        let mut ds = Dataset::new();
        ds.insert_coord(
            "time",
            CoordValues::Time(hours.iter().map(|&h| t(h)).collect()),
        );
        ds.insert_variable(
            name,
            vec!["time".to_string()],
            ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.to_vec()).unwrap(),
        )
        .unwrap();
        ds
    }

    #[test]
    fn merge_outer_joins_time() {
        let mut a = time_dataset(&[0, 1], "ne", &[1.0, 2.0]);
        let b = time_dataset(&[1, 2], "ti", &[10.0, 20.0]);
        a.merge(b).unwrap();

        assert_eq!(a.coord("time").unwrap().len(), 3);
        let ne = &a.variable("ne").unwrap().values;
        assert_eq!(ne[IxDyn(&[0])], 1.0);
        assert_eq!(ne[IxDyn(&[1])], 2.0);
        assert!(ne[IxDyn(&[2])].is_nan());
        let ti = &a.variable("ti").unwrap().values;
        assert!(ti[IxDyn(&[0])].is_nan());
        assert_eq!(ti[IxDyn(&[1])], 10.0);
        assert_eq!(ti[IxDyn(&[2])], 20.0);
    }

    #[test]
    fn merge_rejects_conflicting_variables() {
        let mut a = time_dataset(&[0], "ne", &[1.0]);
        let b = time_dataset(&[1], "ne", &[2.0]);
        assert!(matches!(
            a.merge(b),
            Err(DatasetError::DuplicateVariable(name)) if name == "ne"
        ));
    }

    #[test]
    fn merge_widens_secondary_dimension() {
        let mut a = Dataset::new();
        a.insert_coord("time", CoordValues::Time(vec![t(0)]));
        a.insert_coord("gdalt", CoordValues::Float(vec![100.0, 200.0]));
        a.insert_variable(
            "ne",
            vec!["time".to_string(), "gdalt".to_string()],
            ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![1.0, 2.0]).unwrap(),
        )
        .unwrap();

        let mut b = Dataset::new();
        b.insert_coord("time", CoordValues::Time(vec![t(0)]));
        b.insert_coord("gdalt", CoordValues::Float(vec![200.0, 300.0]));
        b.insert_variable(
            "ti",
            vec!["time".to_string(), "gdalt".to_string()],
            ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![20.0, 30.0]).unwrap(),
        )
        .unwrap();

        a.merge(b).unwrap();
        assert_eq!(
            a.coord("gdalt"),
            Some(&CoordValues::Float(vec![100.0, 200.0, 300.0]))
        );
        let ne = &a.variable("ne").unwrap().values;
        assert_eq!(ne[IxDyn(&[0, 1])], 2.0);
        assert!(ne[IxDyn(&[0, 2])].is_nan());
        let ti = &a.variable("ti").unwrap().values;
        assert!(ti[IxDyn(&[0, 0])].is_nan());
        assert_eq!(ti[IxDyn(&[0, 1])], 20.0);
        assert_eq!(ti[IxDyn(&[0, 2])], 30.0);
    }

    #[test]
    fn concat_time_sorts_chronologically() {
        let mut a = time_dataset(&[2, 3], "ne", &[3.0, 4.0]);
        let b = time_dataset(&[0, 1], "ne", &[1.0, 2.0]);
        a.concat_time(b).unwrap();
        let ne = &a.variable("ne").unwrap().values;
        assert_eq!(
            (0..4).map(|i| ne[IxDyn(&[i])]).collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn to_frame_requires_time_only() {
        let ds = time_dataset(&[0, 1], "ne", &[1.0, 2.0]);
        let (times, table) = ds.to_frame().unwrap();
        assert_eq!(times, vec![t(0), t(1)]);
        assert_eq!(table.floats("ne"), Some(vec![1.0, 2.0]));

        let mut multi = Dataset::new();
        multi.insert_coord("time", CoordValues::Time(vec![t(0)]));
        multi.insert_coord("gdalt", CoordValues::Float(vec![100.0]));
        multi
            .insert_variable(
                "ne",
                vec!["time".to_string(), "gdalt".to_string()],
                ArrayD::from_shape_vec(IxDyn(&[1, 1]), vec![1.0]).unwrap(),
            )
            .unwrap();
        assert!(matches!(
            multi.to_frame(),
            Err(DatasetError::NotTimeIndexed(_))
        ));
    }

    #[test]
    fn squeeze_drops_unit_dimensions_only() {
        let mut ds = Dataset::new();
        ds.insert_coord("time", CoordValues::Time(vec![t(0), t(1)]));
        ds.insert_coord("kindat", CoordValues::Float(vec![3500.0]));
        ds.insert_variable(
            "tec",
            vec!["time".to_string(), "kindat".to_string()],
            ArrayD::from_shape_vec(IxDyn(&[2, 1]), vec![1.0, 2.0]).unwrap(),
        )
        .unwrap();

        ds.squeeze("kindat");
        assert!(ds.coord("kindat").is_none());
        let tec = ds.variable("tec").unwrap();
        assert_eq!(tec.dims, vec!["time"]);
        assert_eq!(tec.values.shape(), &[2]);

        // A dimension longer than one is untouched.
        ds.squeeze("time");
        assert!(ds.coord("time").is_some());
    }

    #[test]
    fn select_narrows_a_dimension() {
        let mut ds = Dataset::new();
        ds.insert_coord("time", CoordValues::Time(vec![t(0), t(1)]));
        ds.insert_coord(
            "gps_site",
            CoordValues::Text(vec!["aaaa".to_string(), "bbbb".to_string(), "cccc".to_string()]),
        );
        ds.insert_variable(
            "los_tec",
            vec!["time".to_string(), "gps_site".to_string()],
            ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
        )
        .unwrap();

        ds.select("gps_site", &[1]).unwrap();
        assert_eq!(
            ds.coord("gps_site"),
            Some(&CoordValues::Text(vec!["bbbb".to_string()]))
        );
        let los = ds.variable("los_tec").unwrap();
        assert_eq!(los.values.shape(), &[2, 1]);
        assert_eq!(los.values[IxDyn(&[0, 0])], 2.0);
        assert_eq!(los.values[IxDyn(&[1, 0])], 5.0);

        assert!(matches!(
            ds.select("glon", &[0]),
            Err(DatasetError::NoSuchDimension(_))
        ));
    }
}
