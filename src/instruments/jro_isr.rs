// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Jicamarca Radio Observatory incoherent scatter radar adapter.

Drifts and Faraday-rotation products, loaded as coordinate-labelled
datasets over `(time, gdalt)` with the radar site and data codes as
single-valued bookkeeping axes. [calc_measurement_loc] geolocates each
radar beam: for every paired `azdir#`/`eldir#` direction it converts the
pointing plus the range gates into geodetic latitude and longitude
variables `gdlat#`/`gdlon#`.
 */

use log::warn;
use ndarray::ArrayD;

use crate::coords::local_horizontal_to_global_geo;
use crate::dataset::{CoordValues, Dataset};
use crate::instruments::{InstrumentConfig, InstrumentError, TagConfig};
use crate::load::CoordSchema;
use crate::metadata::{Meta, MetaEntry};

pub const REFERENCES: &str = "Depends on the radar experiment; contact PI";

/// JRO sits 520 m above sea level.
const SITE_ALTITUDE_KM: f64 = 0.52;

/// The adapter's declarative configuration: drift and oblique products.
/// The archive's own names for the oblique files differ by one free
/// character, matched by `.` in the template.
pub fn config() -> InstrumentConfig {
    let template = |middle: &str| {
        format!("jro{{year:4d}}{{month:02d}}{{day:02d}}{middle}.{{version:03d}}.{{file_type}}")
    };
    let tags = vec![
        TagConfig {
            inst_id: "",
            tag: "drifts",
            description: "Drifts and wind",
            kindat: 1910,
            template: template("drifts"),
            schema: Some(drift_schema(true)),
        },
        TagConfig {
            inst_id: "",
            tag: "drifts_ave",
            description: "Averaged drifts",
            kindat: 1911,
            template: template("drifts_avg"),
            schema: Some(drift_schema(false)),
        },
        TagConfig {
            inst_id: "",
            tag: "oblique_stan",
            description: "Standard Faraday rotation double-pulse",
            kindat: 1800,
            template: template(""),
            schema: Some(oblique_schema(true)),
        },
        TagConfig {
            inst_id: "",
            tag: "oblique_rand",
            description: "Randomized Faraday rotation double-pulse",
            kindat: 1801,
            template: template("."),
            schema: Some(oblique_schema(false)),
        },
        TagConfig {
            inst_id: "",
            tag: "oblique_long",
            description: "Long pulse Faraday rotation",
            kindat: 1802,
            template: template("."),
            schema: Some(oblique_schema(false)),
        },
    ];
    InstrumentConfig {
        platform: "jro",
        name: "isr",
        inst_code: 10,
        year_pivot: None,
        tags,
    }
}

/// Altitude profiles of the drift products. The full product carries the
/// beam pointing columns; the averaged one does not.
fn drift_schema(full: bool) -> CoordSchema {
    let mut profile = vec![
        "range", "vipn2", "dvipn2", "vipe1", "dvipe1",
    ];
    let mut scalars = vec![
        "year", "month", "day", "hour", "min", "sec", "spcst", "pl", "cbadn", "inttms",
    ];
    if full {
        profile.splice(0..0, ["nwlos"]);
        profile.extend([
            "vi72", "dvi72", "vi82", "dvi82", "paiwl", "pacwl", "pbiwl", "pbcwl", "pciel",
            "pccel", "pdiel", "pdcel", "jro10", "jro11",
        ]);
        scalars.extend([
            "azdir7", "eldir7", "azdir8", "eldir8", "jro14", "jro15", "jro16",
        ]);
    } else {
        profile.splice(0..0, ["altav"]);
    }
    scalars.extend(["ut1_unix", "ut2_unix", "recno"]);
    CoordSchema::new()
        .with_group(
            &["time", "gdalt", "gdlatr", "gdlonr", "kindat", "kinst"],
            &profile,
        )
        .with_group(&["time"], &scalars)
}

/// Altitude profiles of the Faraday-rotation products; the standard pulse
/// resolves electron density, the others resolve raw power.
fn oblique_schema(standard: bool) -> CoordSchema {
    let mut profile = vec!["rgate", "te", "dte", "ti", "dti", "ph+", "dph+", "phe+", "dphe+"];
    if standard {
        profile.splice(1..1, ["ne", "dne"]);
    } else {
        profile.splice(1..1, ["pop", "dpop"]);
    }
    let scalars = [
        "year", "month", "day", "hour", "min", "sec", "azm", "elm", "pl", "inttms", "tfreq",
        "ut1_unix", "ut2_unix", "recno",
    ];
    CoordSchema::new()
        .with_group(
            &["time", "gdalt", "gdlatr", "gdlonr", "kindat", "kinst"],
            &profile,
        )
        .with_group(&["time"], &scalars)
}

/// Remove the single-valued bookkeeping dimensions (data codes and radar
/// site position) left over from the reshape.
pub fn squeeze_codes(ds: &mut Dataset) {
    for dim in ["kindat", "kinst", "gdlatr", "gdlonr"] {
        ds.squeeze(dim);
    }
}

/// The radar site value carried either as a length-1 coordinate or a
/// single-valued variable.
fn site_value(ds: &Dataset, name: &str) -> Result<f64, InstrumentError> {
    if let Some(CoordValues::Float(values)) = ds.coord(name) {
        if let Some(&value) = values.first() {
            return Ok(value);
        }
    }
    if let Some(var) = ds.variable(name) {
        if let Some(&value) = var.values.iter().next() {
            return Ok(value);
        }
    }
    Err(InstrumentError::MissingVariable(name.to_string()))
}

/// Geolocate every radar beam.
///
/// For each direction `#` with both `azdir#` and `eldir#` present, computes
/// `gdlat#`/`gdlon#` over the dimensions of `range` by casting the pointing
/// out to each range gate from the radar site. Directions whose suffix is
/// not a number are skipped with a warning; having no usable pair at all is
/// fatal.
pub fn calc_measurement_loc(ds: &mut Dataset, meta: &mut Meta) -> Result<(), InstrumentError> {
    let az_suffixes: Vec<String> = ds
        .variable_names()
        .filter_map(|name| name.strip_prefix("azdir").map(str::to_string))
        .collect();
    let el_suffixes: Vec<String> = ds
        .variable_names()
        .filter_map(|name| name.strip_prefix("eldir").map(str::to_string))
        .collect();

    let mut directions: Vec<u32> = Vec::new();
    for suffix in &az_suffixes {
        if !el_suffixes.contains(suffix) {
            continue;
        }
        match suffix.parse() {
            Ok(number) => directions.push(number),
            Err(_) => warn!("unknown direction number [{suffix}]"),
        }
    }
    if directions.is_empty() {
        return Err(InstrumentError::NoBeamDirections);
    }

    let site_lat = site_value(ds, "gdlatr")?;
    let site_lon = site_value(ds, "gdlonr")?;

    for direction in directions {
        let az_key = format!("azdir{direction}");
        let el_key = format!("eldir{direction}");

        let range = ds
            .variable("range")
            .ok_or_else(|| InstrumentError::MissingVariable("range".to_string()))?;
        let az = ds
            .variable(&az_key)
            .ok_or_else(|| InstrumentError::MissingVariable(az_key.clone()))?;
        let el = ds
            .variable(&el_key)
            .ok_or_else(|| InstrumentError::MissingVariable(el_key.clone()))?;

        // The pointing is per timestamp; the result spans the range array.
        let time_axis = range
            .dims
            .iter()
            .position(|d| d == "time")
            .ok_or_else(|| InstrumentError::MissingVariable("time".to_string()))?;
        let dims = range.dims.clone();
        let mut lat_out = ArrayD::from_elem(range.values.raw_dim(), f64::NAN);
        let mut lon_out = ArrayD::from_elem(range.values.raw_dim(), f64::NAN);
        for (idx, &dist) in range.values.indexed_iter() {
            let t = idx[time_axis];
            let (lat, lon, _) = local_horizontal_to_global_geo(
                az.values.as_slice().map_or(f64::NAN, |v| v[t]),
                el.values.as_slice().map_or(f64::NAN, |v| v[t]),
                dist,
                site_lat,
                site_lon,
                SITE_ALTITUDE_KM,
                true,
            );
            lat_out[&idx] = lat;
            lon_out[&idx] = lon;
        }

        let lat_key = format!("gdlat{direction}");
        let lon_key = format!("gdlon{direction}");
        ds.insert_variable(lat_key.clone(), dims.clone(), lat_out)?;
        ds.insert_variable(lon_key.clone(), dims, lon_out)?;

        meta.set(
            &lat_key,
            MetaEntry {
                name: format!("Beam {direction} latitude"),
                units: "degrees".to_string(),
                description: format!("Beam {direction} latitude"),
                fill_value: Some(f64::NAN),
                min_value: Some(-90.0),
                max_value: Some(90.0),
                ..Default::default()
            },
        );
        meta.set(
            &lon_key,
            MetaEntry {
                name: format!("Beam {direction} longitude"),
                units: "degrees".to_string(),
                description: format!("Beam {direction} longitude"),
                fill_value: Some(f64::NAN),
                min_value: Some(-180.0),
                max_value: Some(180.0),
                ..Default::default()
            },
        );
    }
    Ok(())
}
