// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Coordinate transformations for geolocating radar measurements.

Every transform here is a documented forward/inverse pair: converting a point
forward and then back recovers the input to well below a metre. The scalar
functions are the primitives; each has an `_arr` companion that applies it
element-wise over equal-length arrays, mirroring the scalar output shape.

Angles are degrees and distances kilometres throughout.
 */

use ndarray::{Array1, ArrayView1};

use crate::constants::{WGS84_EQUATORIAL_RADIUS_KM, WGS84_FLATTENING};

/// Convert a latitude between geodetic and geocentric frames on the WGS-84
/// ellipsoid. Longitude passes through unchanged.
///
/// Returns `(lat_out, lon_out, earth_radius_km)`, where the Earth radius is
/// evaluated at the output latitude. `inverse = false` converts geodetic to
/// geocentric; `inverse = true` the reverse.
pub fn geodetic_to_geocentric(lat_in: f64, lon_in: f64, inverse: bool) -> (f64, f64, f64) {
    let rad_eq = WGS84_EQUATORIAL_RADIUS_KM;
    let rad_pol = rad_eq * (1.0 - WGS84_FLATTENING);

    // The ratio between the semi-major and semi-minor axes is used twice.
    let rad_ratio_sq = (rad_eq / rad_pol).powi(2);

    // Square of the second eccentricity (e').
    let eprime_sq = rad_ratio_sq - 1.0;

    let tan_in = lat_in.to_radians().tan();

    // Geodetic to geocentric scales the tangent by the inverse ratio.
    let scale = if inverse { rad_ratio_sq } else { 1.0 / rad_ratio_sq };

    let lat_out = (scale * tan_in).atan().to_degrees();

    // Earth radius at the output latitude.
    let rad_earth = rad_eq / (1.0 + eprime_sq * lat_out.to_radians().sin().powi(2)).sqrt();

    (lat_out, lon_in, rad_earth)
}

/// Element-wise [geodetic_to_geocentric] over equal-length arrays.
///
/// # Panics
///
/// Panics if the input lengths differ.
pub fn geodetic_to_geocentric_arr(
    lat_in: ArrayView1<f64>,
    lon_in: ArrayView1<f64>,
    inverse: bool,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    assert_eq!(lat_in.len(), lon_in.len());
    let mut lat_out = Array1::zeros(lat_in.len());
    let mut lon_out = Array1::zeros(lat_in.len());
    let mut rad_out = Array1::zeros(lat_in.len());
    for (i, (&lat, &lon)) in lat_in.iter().zip(lon_in.iter()).enumerate() {
        let (la, lo, r) = geodetic_to_geocentric(lat, lon, inverse);
        lat_out[i] = la;
        lon_out[i] = lo;
        rad_out[i] = r;
    }
    (lat_out, lon_out, rad_out)
}

/// Convert local-horizontal (azimuth/elevation) look directions between a
/// geodetic and a geocentric frame centred on the same point.
///
/// The az/el pair is rotated about the local east axis by the vertical
/// deviation between the two latitudes. Returns
/// `(lat_out, lon_out, earth_radius_km, az_out, el_out)`.
///
/// The position components round-trip cleanly under forward-then-inverse
/// composition; the az/el components do not in general, because the vertical
/// deviation is evaluated at the input latitude each way.
pub fn geodetic_to_geocentric_horizontal(
    lat_in: f64,
    lon_in: f64,
    az_in: f64,
    el_in: f64,
    inverse: bool,
) -> (f64, f64, f64, f64, f64) {
    let az = az_in.to_radians();
    let el = el_in.to_radians();

    // Move the centre of the local horizontal system between frames.
    let (lat_out, lon_out, rad_earth) = geodetic_to_geocentric(lat_in, lon_in, inverse);

    // Deviation from vertical, in radians.
    let dev_vert = (lat_in - lat_out).to_radians();

    // Unit pointing vector in the local system: x east, y north, z up.
    let x_local = el.cos() * az.sin();
    let y_local = el.cos() * az.cos();
    let z_local = el.sin();

    // Rotate about the local x axis to align the local vertical with the
    // Earth radial vector.
    let x_out = x_local;
    let y_out = y_local * dev_vert.cos() + z_local * dev_vert.sin();
    let z_out = -y_local * dev_vert.sin() + z_local * dev_vert.cos();

    let az_out = x_out.atan2(y_out).to_degrees();
    let el_out = (z_out / (x_out.powi(2) + y_out.powi(2)).sqrt())
        .atan()
        .to_degrees();

    (lat_out, lon_out, rad_earth, az_out, el_out)
}

/// Element-wise [geodetic_to_geocentric_horizontal] over equal-length arrays.
///
/// # Panics
///
/// Panics if the input lengths differ.
#[allow(clippy::type_complexity)]
pub fn geodetic_to_geocentric_horizontal_arr(
    lat_in: ArrayView1<f64>,
    lon_in: ArrayView1<f64>,
    az_in: ArrayView1<f64>,
    el_in: ArrayView1<f64>,
    inverse: bool,
) -> (
    Array1<f64>,
    Array1<f64>,
    Array1<f64>,
    Array1<f64>,
    Array1<f64>,
) {
    assert!(lat_in.len() == lon_in.len() && lat_in.len() == az_in.len());
    assert_eq!(lat_in.len(), el_in.len());
    let n = lat_in.len();
    let mut out = (
        Array1::zeros(n),
        Array1::zeros(n),
        Array1::zeros(n),
        Array1::zeros(n),
        Array1::zeros(n),
    );
    for i in 0..n {
        let (lat, lon, rad, az, el) =
            geodetic_to_geocentric_horizontal(lat_in[i], lon_in[i], az_in[i], el_in[i], inverse);
        out.0[i] = lat;
        out.1[i] = lon;
        out.2[i] = rad;
        out.3[i] = az;
        out.4[i] = el;
    }
    out
}

/// Convert between spherical and cartesian coordinates.
///
/// Forward (`inverse = false`): `(az, el, r)` in degrees/km to `(x, y, z)` in
/// km. Inverse: `(x, y, z)` to `(az, el, r)`. The spherical angles use
/// *elevation* above the x-y plane, not zenith angle; the zenith conversion
/// happens internally. The same transform serves local and global frames.
pub fn spherical_to_cartesian(az_in: f64, el_in: f64, r_in: f64, inverse: bool) -> (f64, f64, f64) {
    if inverse {
        // Cartesian to spherical: inputs are really (x, y, z).
        let xy_sq = az_in.powi(2) + el_in.powi(2);
        let r = (xy_sq + r_in.powi(2)).sqrt();
        let el = 90.0 - xy_sq.sqrt().atan2(r_in).to_degrees();
        let az = el_in.atan2(az_in).to_degrees();
        (az, el, r)
    } else {
        // Work from the zenith angle (degrees from the z axis).
        let zen = (90.0 - el_in).to_radians();
        let x = r_in * zen.sin() * az_in.to_radians().cos();
        let y = r_in * zen.sin() * az_in.to_radians().sin();
        let z = r_in * zen.cos();
        (x, y, z)
    }
}

/// Element-wise [spherical_to_cartesian] over equal-length arrays.
///
/// # Panics
///
/// Panics if the input lengths differ.
pub fn spherical_to_cartesian_arr(
    az_in: ArrayView1<f64>,
    el_in: ArrayView1<f64>,
    r_in: ArrayView1<f64>,
    inverse: bool,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    assert!(az_in.len() == el_in.len() && az_in.len() == r_in.len());
    let n = az_in.len();
    let mut out = (Array1::zeros(n), Array1::zeros(n), Array1::zeros(n));
    for i in 0..n {
        let (x, y, z) = spherical_to_cartesian(az_in[i], el_in[i], r_in[i], inverse);
        out.0[i] = x;
        out.1[i] = y;
        out.2[i] = z;
    }
    out
}

/// Convert a position between the Earth-centred cartesian frame and a local
/// East-North-Up cartesian frame centred on a geocentric point.
///
/// The global frame has x through the equator at the prime meridian and z
/// along the rotation axis; the local frame has x east, y north, z up at the
/// centre given by `(lat_cent, lon_cent, rad_cent)`. Forward converts global
/// to local; the inverse applies the rotations in the opposite order before
/// translating back.
pub fn global_to_local_cartesian(
    x_in: f64,
    y_in: f64,
    z_in: f64,
    lat_cent: f64,
    lon_cent: f64,
    rad_cent: f64,
    inverse: bool,
) -> (f64, f64, f64) {
    // Global cartesian position of the local origin.
    let (x_cent, y_cent, z_cent) = spherical_to_cartesian(lon_cent, lat_cent, rad_cent, false);

    // Rotation about the local x axis aligning z with the rotation axis.
    let ax_rot = (90.0 - lat_cent).to_radians();

    // Rotation about the global z axis aligning x with the prime meridian.
    let mer_rot = (lon_cent - 90.0).to_radians();

    if inverse {
        // Local up becomes the radial direction.
        let xrot = x_in;
        let yrot = y_in * ax_rot.cos() - z_in * ax_rot.sin();
        let zrot = y_in * ax_rot.sin() + z_in * ax_rot.cos();

        // Undo the meridian rotation, then translate to the geocentre.
        let x_out = xrot * mer_rot.cos() - yrot * mer_rot.sin() + x_cent;
        let y_out = xrot * mer_rot.sin() + yrot * mer_rot.cos() + y_cent;
        let z_out = zrot + z_cent;
        (x_out, y_out, z_out)
    } else {
        // Translate the global origin onto the local one.
        let xtrans = x_in - x_cent;
        let ytrans = y_in - y_cent;
        let ztrans = z_in - z_cent;

        // Meridian rotation so the local x axis points east.
        let xrot = xtrans * (-mer_rot).cos() - ytrans * (-mer_rot).sin();
        let yrot = xtrans * (-mer_rot).sin() + ytrans * (-mer_rot).cos();
        let zrot = ztrans;

        // Axial-tilt rotation so the local z axis points up.
        let x_out = xrot;
        let y_out = yrot * (-ax_rot).cos() - zrot * (-ax_rot).sin();
        let z_out = yrot * (-ax_rot).sin() + zrot * (-ax_rot).cos();
        (x_out, y_out, z_out)
    }
}

/// Element-wise [global_to_local_cartesian] over equal-length arrays.
///
/// # Panics
///
/// Panics if the input lengths differ.
pub fn global_to_local_cartesian_arr(
    x_in: ArrayView1<f64>,
    y_in: ArrayView1<f64>,
    z_in: ArrayView1<f64>,
    lat_cent: f64,
    lon_cent: f64,
    rad_cent: f64,
    inverse: bool,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    assert!(x_in.len() == y_in.len() && x_in.len() == z_in.len());
    let n = x_in.len();
    let mut out = (Array1::zeros(n), Array1::zeros(n), Array1::zeros(n));
    for i in 0..n {
        let (x, y, z) = global_to_local_cartesian(
            x_in[i], y_in[i], z_in[i], lat_cent, lon_cent, rad_cent, inverse,
        );
        out.0[i] = x;
        out.1[i] = y;
        out.2[i] = z;
    }
    out
}

/// Geolocate a point seen from an origin at a given azimuth, elevation and
/// slant distance.
///
/// The origin is `(lat_orig, lon_orig)` with `alt_orig` km above the surface.
/// With `geodetic = true` the origin coordinates are geodetic and the result
/// is returned in geodetic coordinates too; otherwise everything stays
/// geocentric. Returns `(lat_point, lon_point, radius_point)`, with the
/// radius measured from the centre of the Earth in the geocentric case and
/// from the reference surface in the geodetic case.
pub fn local_horizontal_to_global_geo(
    az: f64,
    el: f64,
    dist: f64,
    lat_orig: f64,
    lon_orig: f64,
    alt_orig: f64,
    geodetic: bool,
) -> (f64, f64, f64) {
    use crate::constants::MEAN_EARTH_RADIUS_KM;

    // Geocentric origin and look direction.
    let (glat, glon, grad, gaz, gel) = if geodetic {
        let (glat, glon, rearth, gaz, gel) =
            geodetic_to_geocentric_horizontal(lat_orig, lon_orig, az, el, false);
        (glat, glon, rearth + alt_orig, gaz, gel)
    } else {
        (
            lat_orig,
            lon_orig,
            alt_orig + MEAN_EARTH_RADIUS_KM,
            az,
            el,
        )
    };

    // Local horizontal to local cartesian.
    let (x_loc, y_loc, z_loc) = spherical_to_cartesian(gaz, gel, dist, false);

    // Local to global cartesian.
    let (x_glob, y_glob, z_glob) =
        global_to_local_cartesian(x_loc, y_loc, z_loc, glat, glon, grad, true);

    // Global cartesian to geocentric spherical.
    let (lon_pnt, lat_pnt, rad_pnt) = spherical_to_cartesian(x_glob, y_glob, z_glob, true);

    if geodetic {
        let (lat_pnt, lon_pnt, rearth) = geodetic_to_geocentric(lat_pnt, lon_pnt, true);
        (lat_pnt, lon_pnt, rearth + rad_pnt - MEAN_EARTH_RADIUS_KM)
    } else {
        (lat_pnt, lon_pnt, rad_pnt)
    }
}

/// Element-wise [local_horizontal_to_global_geo] over equal-length arrays.
///
/// # Panics
///
/// Panics if the input lengths differ.
pub fn local_horizontal_to_global_geo_arr(
    az: ArrayView1<f64>,
    el: ArrayView1<f64>,
    dist: ArrayView1<f64>,
    lat_orig: ArrayView1<f64>,
    lon_orig: ArrayView1<f64>,
    alt_orig: ArrayView1<f64>,
    geodetic: bool,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    assert!(az.len() == el.len() && az.len() == dist.len());
    assert!(az.len() == lat_orig.len() && az.len() == lon_orig.len());
    assert_eq!(az.len(), alt_orig.len());
    let n = az.len();
    let mut out = (Array1::zeros(n), Array1::zeros(n), Array1::zeros(n));
    for i in 0..n {
        let (lat, lon, rad) = local_horizontal_to_global_geo(
            az[i],
            el[i],
            dist[i],
            lat_orig[i],
            lon_orig[i],
            alt_orig[i],
            geodetic,
        );
        out.0[i] = lat;
        out.1[i] = lon;
        out.2[i] = rad;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn wgs84_reference_values() {
        let (lat, lon, rad) = geodetic_to_geocentric(45.0, 8.0, false);
        assert_abs_diff_eq!(lat, 44.8075768, epsilon = 1e-6);
        assert_abs_diff_eq!(lon, 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rad, 6367.4895439, epsilon = 1e-6);

        let (lat, lon, rad) = geodetic_to_geocentric(45.0, 8.0, true);
        assert_abs_diff_eq!(lat, 45.1924232, epsilon = 1e-6);
        assert_abs_diff_eq!(lon, 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rad, 6367.3459085, epsilon = 1e-6);
    }

    #[test]
    fn geodetic_geocentric_roundtrip() {
        for &lat in &[-88.3, -45.0, -10.0, 0.0, 23.5, 45.0, 71.2] {
            for &lon in &[-120.0, 0.0, 8.0, 179.5] {
                let (glat, glon, _) = geodetic_to_geocentric(lat, lon, false);
                let (blat, blon, _) = geodetic_to_geocentric(glat, glon, true);
                assert_abs_diff_eq!(blat, lat, epsilon = 1e-6);
                assert_abs_diff_eq!(blon, lon, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn horizontal_roundtrip_position() {
        // Position components only; the az/el pair is documented as not
        // round-tripping.
        let (glat, glon, _, gaz, gel) =
            geodetic_to_geocentric_horizontal(45.0, 8.0, 52.0, 63.0, false);
        let (blat, blon, _, _, _) = geodetic_to_geocentric_horizontal(glat, glon, gaz, gel, true);
        assert_abs_diff_eq!(blat, 45.0, epsilon = 1e-6);
        assert_abs_diff_eq!(blon, 8.0, epsilon = 1e-6);
    }

    #[test]
    fn spherical_cartesian_roundtrip() {
        for &(az, el, r) in &[
            (0.0, 0.0, 1.0),
            (45.0, 30.0, 100.0),
            (120.0, -20.0, 550.0),
            (-60.0, 85.0, 6371.0),
        ] {
            let (x, y, z) = spherical_to_cartesian(az, el, r, false);
            let (baz, bel, br) = spherical_to_cartesian(x, y, z, true);
            assert_abs_diff_eq!(baz, az, epsilon = 1e-6);
            assert_abs_diff_eq!(bel, el, epsilon = 1e-6);
            assert_abs_diff_eq!(br, r, epsilon = 1e-6);
        }
    }

    #[test]
    fn spherical_cartesian_known_point() {
        // Elevation 90 degrees points along the z axis.
        let (x, y, z) = spherical_to_cartesian(0.0, 90.0, 10.0, false);
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(z, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn global_local_roundtrip() {
        for &(x, y, z) in &[(6300.0, 100.0, -2000.0), (0.0, 0.0, 0.0), (-4000.0, 4000.0, 1000.0)] {
            let (lx, ly, lz) = global_to_local_cartesian(x, y, z, 45.0, 8.0, 6367.0, false);
            let (bx, by, bz) = global_to_local_cartesian(lx, ly, lz, 45.0, 8.0, 6367.0, true);
            assert_abs_diff_eq!(bx, x, epsilon = 1e-6);
            assert_abs_diff_eq!(by, y, epsilon = 1e-6);
            assert_abs_diff_eq!(bz, z, epsilon = 1e-6);
        }
    }

    #[test]
    fn local_horizontal_zero_distance_is_origin() {
        // Looking nowhere from a geocentric origin lands on the origin.
        let (lat, lon, rad) = local_horizontal_to_global_geo(30.0, 45.0, 0.0, -11.9, 75.0, 0.0, false);
        assert_abs_diff_eq!(lat, -11.9, epsilon = 1e-6);
        assert_abs_diff_eq!(lon, 75.0, epsilon = 1e-6);
        assert_abs_diff_eq!(rad, 6371.0, epsilon = 1e-6);
    }

    #[test]
    fn array_matches_scalar() {
        let lats = array![-45.0, 0.0, 30.0, 60.0];
        let lons = array![10.0, 20.0, 30.0, 40.0];
        let (alat, alon, arad) = geodetic_to_geocentric_arr(lats.view(), lons.view(), false);
        for i in 0..lats.len() {
            let (slat, slon, srad) = geodetic_to_geocentric(lats[i], lons[i], false);
            assert_abs_diff_eq!(alat[i], slat, epsilon = 1e-12);
            assert_abs_diff_eq!(alon[i], slon, epsilon = 1e-12);
            assert_abs_diff_eq!(arad[i], srad, epsilon = 1e-12);
        }

        let az = array![10.0, 100.0, 250.0];
        let el = array![5.0, 45.0, 85.0];
        let r = array![100.0, 200.0, 300.0];
        let (ax, ay, az_out) = spherical_to_cartesian_arr(az.view(), el.view(), r.view(), false);
        for i in 0..az.len() {
            let (sx, sy, sz) = spherical_to_cartesian(az[i], el[i], r[i], false);
            assert_abs_diff_eq!(ax[i], sx, epsilon = 1e-12);
            assert_abs_diff_eq!(ay[i], sy, epsilon = 1e-12);
            assert_abs_diff_eq!(az_out[i], sz, epsilon = 1e-12);
        }

        let dist = array![100.0, 500.0, 1000.0];
        let site_lat = array![-11.95, -11.95, -11.95];
        let site_lon = array![-76.87, -76.87, -76.87];
        let site_alt = array![0.52, 0.52, 0.52];
        let (plat, plon, prad) = local_horizontal_to_global_geo_arr(
            az.view(),
            el.view(),
            dist.view(),
            site_lat.view(),
            site_lon.view(),
            site_alt.view(),
            true,
        );
        for i in 0..dist.len() {
            let (slat, slon, srad) = local_horizontal_to_global_geo(
                az[i], el[i], dist[i], site_lat[i], site_lon[i], site_alt[i], true,
            );
            assert_abs_diff_eq!(plat[i], slat, epsilon = 1e-12);
            assert_abs_diff_eq!(plon[i], slon, epsilon = 1e-12);
            assert_abs_diff_eq!(prad[i], srad, epsilon = 1e-12);
        }
    }
}
