// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! End-to-end loads over generated archive files.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::IxDyn;

use madrigal_data::dataset::CoordValues;
use madrigal_data::{load, CoordSchema, LoadedData};

fn write_simple_gz(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut gz = GzEncoder::new(file, Compression::default());
    gz.write_all(text.as_bytes()).unwrap();
    gz.finish().unwrap();
    path
}

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2015, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

#[test]
fn flat_load_sorts_across_files() {
    let dir = tempfile::tempdir().unwrap();
    // The "late" file is listed first; sorting is by time, not input order.
    let late = write_simple_gz(
        dir.path(),
        "jic_20150101b.simple.gz",
        "YEAR MONTH DAY HOUR MIN SEC NE\n\
         2015 1 1 1 0 0 3.0\n\
         2015 1 1 1 30 0 4.0\n",
    );
    let early = write_simple_gz(
        dir.path(),
        "jic_20150101a.simple.gz",
        "YEAR MONTH DAY HOUR MIN SEC NE\n\
         2015 1 1 0 0 0 1.0\n\
         2015 1 1 0 30 0 2.0\n",
    );

    let (data, meta) = load(&[late, early], None).unwrap();
    let frame = match data {
        LoadedData::Flat(frame) => frame,
        LoadedData::Labeled(_) => panic!("expected a flat result"),
    };
    assert_eq!(
        frame.index,
        vec![at(0, 0), at(0, 30), at(1, 0), at(1, 30)]
    );
    assert_eq!(
        frame.table.floats("ne"),
        Some(vec![1.0, 2.0, 3.0, 4.0])
    );
    assert!(meta.contains("ne"));
}

#[test]
fn labelled_load_reshapes_against_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_simple_gz(
        dir.path(),
        "jic_20150101.simple.gz",
        "YEAR MONTH DAY HOUR MIN SEC GDALT NE\n\
         2015 1 1 0 0 0 200 1.0\n\
         2015 1 1 0 0 0 400 2.0\n\
         2015 1 1 1 0 0 200 3.0\n\
         2015 1 1 1 0 0 400 4.0\n",
    );

    let schema = CoordSchema::new()
        .with_group(&["time"], &["year", "month", "day", "hour", "min", "sec"])
        .with_group(&["time", "gdalt"], &["ne"]);
    let (data, _) = load(&[path], Some(&schema)).unwrap();
    let ds = match data {
        LoadedData::Labeled(ds) => ds,
        LoadedData::Flat(_) => panic!("expected a labelled result"),
    };

    assert_eq!(
        ds.coord("gdalt"),
        Some(&CoordValues::Float(vec![200.0, 400.0]))
    );
    let ne = &ds.variable("ne").unwrap().values;
    assert_eq!(ne.shape(), &[2, 2]);
    assert_eq!(ne[IxDyn(&[0, 1])], 2.0);
    assert_eq!(ne[IxDyn(&[1, 0])], 3.0);
}

#[test]
fn unrecognised_names_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_simple_gz(
        dir.path(),
        "jic_20150101.simple.gz",
        "YEAR MONTH DAY HOUR MIN SEC NE\n2015 1 1 0 0 0 1.0\n",
    );
    let stray = dir.path().join("readme.txt");
    File::create(&stray).unwrap();

    let (data, _) = load(&[stray, good], None).unwrap();
    match data {
        LoadedData::Flat(frame) => assert_eq!(frame.n_rows(), 1),
        LoadedData::Labeled(_) => panic!("expected a flat result"),
    }
}

#[test]
fn mixed_formats_merge_onto_one_time_index() {
    let dir = tempfile::tempdir().unwrap();
    let simple = write_simple_gz(
        dir.path(),
        "jic_20150101.simple.gz",
        "YEAR MONTH DAY HOUR MIN SEC NE\n\
         2015 1 1 0 0 0 1.0\n",
    );

    // A time-only netCDF file with a different variable and timestamp.
    let nc_path = dir.path().join("tec_20150101.netCDF4");
    {
        let mut file = netcdf::create(&nc_path).unwrap();
        file.add_dimension("timestamps", 1).unwrap();
        let mut time = file
            .add_variable::<f64>("timestamps", &["timestamps"])
            .unwrap();
        // 2015-01-01T00:05:00 UTC.
        time.put_values(&[1420070700.0], ..).unwrap();
        let mut tec = file.add_variable::<f64>("tec", &["timestamps"]).unwrap();
        tec.put_values(&[42.0], ..).unwrap();
    }

    let (data, _) = load(&[simple, nc_path], None).unwrap();
    let frame = match data {
        LoadedData::Flat(frame) => frame,
        LoadedData::Labeled(_) => panic!("expected a flat result"),
    };

    assert_eq!(frame.index, vec![at(0, 0), at(0, 5)]);
    let ne = frame.table.floats("ne").unwrap();
    let tec = frame.table.floats("tec").unwrap();
    // Each format covers only its own timestamps; the gaps are NaN.
    assert_eq!(ne[0], 1.0);
    assert!(ne[1].is_nan());
    assert!(tec[0].is_nan());
    assert_eq!(tec[1], 42.0);
}

#[test]
fn mixed_formats_with_extra_dimensions_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let simple = write_simple_gz(
        dir.path(),
        "jic_20150101.simple.gz",
        "YEAR MONTH DAY HOUR MIN SEC NE\n\
         2015 1 1 0 0 0 1.0\n",
    );

    // tec carries a second dimension, so the combined result cannot be
    // flattened back to a time-indexed table.
    let nc_path = dir.path().join("tec_20150101.netCDF4");
    {
        let mut file = netcdf::create(&nc_path).unwrap();
        file.add_dimension("timestamps", 1).unwrap();
        file.add_dimension("gdlat", 2).unwrap();
        let mut time = file
            .add_variable::<f64>("timestamps", &["timestamps"])
            .unwrap();
        time.put_values(&[1420070700.0], ..).unwrap();
        let mut lat = file.add_variable::<f64>("gdlat", &["gdlat"]).unwrap();
        lat.put_values(&[-30.0, 30.0], ..).unwrap();
        let mut tec = file
            .add_variable::<f64>("tec", &["timestamps", "gdlat"])
            .unwrap();
        tec.put_values(&[42.0, 43.0], ..).unwrap();
    }

    assert!(load(&[simple, nc_path], None).is_err());
}

#[test]
fn empty_labelled_load_yields_empty_dataset() {
    let schema = CoordSchema::new().with_group(&["time", "gdalt"], &["ne"]);
    let (data, meta) = load(&[], Some(&schema)).unwrap();
    match data {
        LoadedData::Labeled(ds) => assert!(ds.is_empty()),
        LoadedData::Flat(_) => panic!("expected a labelled result"),
    }
    assert!(meta.is_empty());
}
