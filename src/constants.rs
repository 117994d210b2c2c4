// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants are double precision; geometry is done entirely in f64 before
any caller decides to narrow.
 */

/// WGS-84 semi-major (equatorial) Earth radius \[km\].
pub const WGS84_EQUATORIAL_RADIUS_KM: f64 = 6378.1370;

/// WGS-84 flattening of the reference ellipsoid.
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257223563;

/// Mean Earth radius \[km\], used when a geocentric origin altitude is
/// supplied relative to the surface.
pub const MEAN_EARTH_RADIUS_KM: f64 = 6371.0;
