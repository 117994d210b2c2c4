// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Reader for Madrigal netCDF4 files.

These files arrive natively coordinate-labelled: a `timestamps` root
dimension (Unix seconds) plus data variables carrying `units` and
`description` attributes. The root coordinate is renamed `time` and
reinterpreted as datetimes; multiple files concatenate along it, which
requires every file to carry the same variable set. Variable attributes are
consumed into [Meta] and do not leak into the returned dataset.
 */

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{ArrayD, IxDyn};

use crate::dataset::{CoordValues, Dataset, DatasetError};
use crate::load::{path_str, LoadError};
use crate::metadata::{Meta, MetaEntry};

/// The on-disk name of the root time coordinate.
const TIME_DIM: &str = "timestamps";

/// Per-variable attribute text pulled from one file.
struct VarAttrs {
    units: String,
    description: String,
}

/// Read one or more netCDF files into a single time-concatenated dataset,
/// filling `meta` from the variable attributes. The global `catalog_text`
/// attribute becomes every entry's notes text when all files agree on it;
/// otherwise a placeholder is used.
pub(crate) fn read_files(fnames: &[&PathBuf], meta: &mut Meta) -> Result<Dataset, LoadError> {
    let mut combined: Option<Dataset> = None;
    let mut catalogs: Vec<Option<String>> = Vec::with_capacity(fnames.len());
    let mut attrs: IndexMap<String, VarAttrs> = IndexMap::new();

    for fname in fnames {
        let (ds, catalog, file_attrs) = read_one(fname)?;
        catalogs.push(catalog);
        for (name, var_attrs) in file_attrs {
            attrs.entry(name).or_insert(var_attrs);
        }
        match combined.as_mut() {
            None => combined = Some(ds),
            Some(acc) => acc.concat_time(ds)?,
        }
    }
    let combined = combined.unwrap_or_default();

    // Header text is kept only when every file carries the same catalog.
    let notes = match catalogs.first() {
        Some(Some(text)) if catalogs.iter().all_equal() => text.clone(),
        _ => "No catalog text".to_string(),
    };

    for name in combined.all_names() {
        let (units, description) = attrs
            .get(&name)
            .map(|a| (a.units.clone(), a.description.clone()))
            .unwrap_or_default();
        meta.insert_if_absent(
            &name,
            MetaEntry {
                name: name.clone(),
                units,
                description,
                fill_value: Some(f64::NAN),
                notes: notes.clone(),
                ..Default::default()
            },
        );
    }

    Ok(combined)
}

fn read_one(
    fname: &Path,
) -> Result<(Dataset, Option<String>, IndexMap<String, VarAttrs>), LoadError> {
    let nc_err = |source| LoadError::NetCdf {
        path: path_str(fname),
        source,
    };
    let file = netcdf::open(fname).map_err(nc_err)?;

    let catalog = match file.attribute("catalog_text") {
        Some(attr) => match attr.value().map_err(nc_err)? {
            netcdf::AttributeValue::Str(text) => Some(text),
            _ => None,
        },
        None => None,
    };

    // The root time coordinate, renamed and decoded from Unix seconds.
    let time_var = file
        .variable(TIME_DIM)
        .ok_or_else(|| LoadError::MissingTimeDimension {
            path: path_str(fname),
        })?;
    let seconds: Vec<f64> = time_var.get_values(..).map_err(nc_err)?;
    let times = seconds
        .iter()
        .enumerate()
        .map(|(row, &s)| epoch_to_datetime(s, fname, row))
        .collect::<Result<Vec<NaiveDateTime>, LoadError>>()?;

    let mut ds = Dataset::new();
    ds.insert_coord("time", CoordValues::Time(times));

    // Remaining dimensions: coordinate values from the same-named variable
    // when one exists, positional indices otherwise.
    let dim_names: Vec<String> = file
        .dimensions()
        .map(|d| d.name())
        .filter(|n| n != TIME_DIM)
        .collect();
    for dim in &dim_names {
        let values = match file.variable(dim) {
            Some(var) => var.get_values(..).map_err(nc_err)?,
            None => {
                let len = file
                    .dimension(dim)
                    .map(|d| d.len())
                    .unwrap_or_default();
                (0..len).map(|i| i as f64).collect()
            }
        };
        ds.insert_coord(dim.clone(), CoordValues::Float(values));
    }

    let mut attrs = IndexMap::new();
    for var in file.variables() {
        let name = var.name().to_lowercase();
        if name == TIME_DIM || dim_names.iter().any(|d| d.to_lowercase() == name) {
            continue;
        }
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| {
                let n = d.name();
                if n == TIME_DIM {
                    "time".to_string()
                } else {
                    n
                }
            })
            .collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values: Vec<f64> = var.get_values(..).map_err(nc_err)?;
        let array = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|_| {
            LoadError::Dataset(DatasetError::ShapeMismatch {
                var: name.clone(),
                dims: dims.clone(),
                expected: shape.clone(),
                got: vec![],
            })
        })?;
        attrs.insert(
            name.clone(),
            VarAttrs {
                units: text_attr(&var, "units").unwrap_or_default(),
                description: text_attr(&var, "description").unwrap_or_default(),
            },
        );
        ds.insert_variable(name, dims, array)?;
    }

    // The time coordinate itself gets a metadata entry too.
    attrs.insert(
        "time".to_string(),
        VarAttrs {
            units: text_attr(&time_var, "units").unwrap_or_default(),
            description: text_attr(&time_var, "description").unwrap_or_default(),
        },
    );

    Ok((ds, catalog, attrs))
}

fn epoch_to_datetime(seconds: f64, fname: &Path, row: usize) -> Result<NaiveDateTime, LoadError> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    chrono::DateTime::from_timestamp(whole as i64, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| LoadError::InvalidEpoch {
            path: path_str(fname),
            row,
            seconds,
        })
}

/// A string attribute, when present. Presence is checked first to avoid
/// library error spam for absent attributes.
fn text_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !var.attributes().any(|attr| attr.name() == name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(text) => Some(text),
        _ => None,
    }
}
