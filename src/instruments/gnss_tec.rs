// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
GNSS Total Electron Content adapter.

Gridded vertical TEC from the worldwide GNSS receiver network, loaded as a
coordinate-labelled dataset over `(time, gdlat, glon)`. The `kindat` and
`kinst` dimension keys are single-valued bookkeeping axes; [squeeze_codes]
removes them after loading. Line-of-sight data is far too large to load
whole, so it is downselected by receiver site.
 */

use crate::dataset::{CoordValues, Dataset};
use crate::instruments::{InstrumentConfig, InstrumentError, TagConfig};
use crate::load::CoordSchema;

pub const ACKNOWLEDGEMENTS: &str =
    "GPS TEC data products and access through the Madrigal distributed data system are \
     provided to the community by the Massachusetts Institute of Technology under support \
     from U.S. National Science Foundation grant AGS-1242204.";

pub const REFERENCES: &str =
    "Rideout and Coster (2006) doi:10.1007/s10291-006-0029-5; \
     Vierinen et al. (2016) doi:10.5194/amt-9-1303-2016";

/// The adapter's declarative configuration: one product, gridded vertical
/// TEC. Filenames carry two-digit years pivoting at 99.
pub fn config() -> InstrumentConfig {
    InstrumentConfig {
        platform: "gnss",
        name: "tec",
        inst_code: 8000,
        year_pivot: Some(99),
        tags: vec![TagConfig {
            inst_id: "",
            tag: "vtec",
            description: "vertical TEC",
            kindat: 3500,
            template: "gps{year:02d}{month:02d}{day:02d}g.{version:03d}.{file_type}".to_string(),
            schema: Some(vtec_schema()),
        }],
    }
}

/// The vertical-TEC coordinate schema: the median filtered TEC map over
/// `(time, gdlat, glon)` plus per-timestamp bookkeeping columns.
pub fn vtec_schema() -> CoordSchema {
    CoordSchema::new()
        .with_group(
            &["time", "gdlat", "glon", "kindat", "kinst"],
            &["gdalt", "tec", "dtec"],
        )
        .with_group(
            &["time"],
            &[
                "year", "month", "day", "hour", "min", "sec", "ut1_unix", "ut2_unix", "recno",
            ],
        )
}

/// Remove the single-valued `kindat`/`kinst` bookkeeping dimensions left
/// over from the reshape.
pub fn squeeze_codes(ds: &mut Dataset) {
    for dim in ["kindat", "kinst"] {
        ds.squeeze(dim);
    }
}

/// How a line-of-sight load is cut down to a loadable subset.
const LOS_METHODS: [&str; 2] = ["site", "receiver_type"];

/// Downselect line-of-sight data along the receiver dimension.
///
/// `method` is `"site"` (a four-character receiver code) or
/// `"receiver_type"`; anything else is fatal before any data is touched.
pub fn select_los(ds: &mut Dataset, method: &str, value: &str) -> Result<(), InstrumentError> {
    let dim = match method {
        "site" => "gps_site",
        "receiver_type" => "rec_type",
        other => {
            return Err(InstrumentError::UnknownSelectionMethod {
                got: other.to_string(),
                known: LOS_METHODS,
            })
        }
    };
    let positions: Vec<usize> = match ds.coord(dim) {
        Some(CoordValues::Text(sites)) => sites
            .iter()
            .enumerate()
            .filter(|(_, site)| site.as_str() == value)
            .map(|(i, _)| i)
            .collect(),
        _ => return Err(InstrumentError::MissingVariable(dim.to_string())),
    };
    Ok(ds.select(dim, &positions)?)
}
