// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Experiment discovery against a Madrigal archive and reconciliation of
//! the resulting filenames into a manifest.

use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::info;

use crate::filenames::{build_manifest, reconcile_hdf5_extension, FileTemplate, Manifest};
use crate::load::FileType;
use crate::remote::RemoteError;

/// Validated archive credentials. Madrigal asks for the user's full name
/// (spaces as `+`) and their email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Reject empty names or addresses before any network call is made; the
    /// archive itself accepts them silently and returns nothing.
    pub fn validated<S: Into<String>>(user: S, password: S) -> Result<Credentials, RemoteError> {
        let (user, password) = (user.into(), password.into());
        if user.is_empty() || password.is_empty() {
            return Err(RemoteError::MissingCredentials);
        }
        Ok(Credentials { user, password })
    }
}

/// One experiment as reported by the archive catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    /// Archive experiment id; `-1` marks an entry with no retrievable data.
    pub id: i64,
    /// First day the experiment covers.
    pub start: NaiveDate,
    /// Last day the experiment covers, inclusive.
    pub end: NaiveDate,
}

/// One data file within an experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentFile {
    /// Full remote name, as the archive spells it.
    pub name: String,
    /// The Madrigal kind-of-data code this file carries.
    pub kindat: i64,
}

/// The archive RPC surface this crate needs. Calls block; the archive
/// protocol has no async variant.
pub trait MadrigalClient {
    /// Experiments for one instrument overlapping `[start, stop]`.
    fn experiments(
        &self,
        inst_code: i64,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Vec<Experiment>, RemoteError>;

    /// The files belonging to one experiment.
    fn experiment_files(&self, experiment_id: i64) -> Result<Vec<ExperimentFile>, RemoteError>;

    /// Fetch a single remote file to `local`, converting to `file_type` on
    /// the server side where the archive supports it.
    fn download_file(
        &self,
        remote_name: &str,
        local: &Path,
        credentials: &Credentials,
        file_type: FileType,
    ) -> Result<(), RemoteError>;
}

/// Does this experiment have retrievable data for the requested dates?
///
/// An experiment is good when its id is not the `-1` sentinel and, if dates
/// were given, at least one falls within the experiment's range. The end of
/// the range is padded by a day: the catalog records end *days*, and data
/// runs through that day.
pub fn good_exp(exp: &Experiment, dates: Option<&[NaiveDate]>) -> bool {
    if exp.id == -1 {
        return false;
    }
    match dates {
        None => true,
        Some(dates) => {
            let end = exp.end + Duration::days(1);
            dates.iter().any(|date| *date >= exp.start && *date <= end)
        }
    }
}

/// Query the catalog for the files of every good experiment in range.
///
/// `dates`, when given, overrides `start`/`stop` and additionally filters
/// experiments day by day (the requested days need not be contiguous). An
/// empty `kindat` list keeps every file; otherwise only files whose code is
/// listed survive.
pub fn get_remote_filenames(
    client: &dyn MadrigalClient,
    inst_code: Option<i64>,
    kindat: &[i64],
    mut start: NaiveDateTime,
    mut stop: NaiveDateTime,
    dates: Option<&[NaiveDate]>,
) -> Result<Vec<ExperimentFile>, RemoteError> {
    let inst_code = inst_code.ok_or(RemoteError::MissingInstrumentCode)?;

    if let Some(dates) = dates {
        let (min, max) = match (dates.iter().min(), dates.iter().max()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(RemoteError::EmptyDateRange),
        };
        start = min.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        stop = max.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    }
    // A zero-width query is treated as empty by the archive.
    if start == stop {
        stop += Duration::days(1);
    }

    let experiments = client.experiments(inst_code, start, stop)?;
    info!("Found {} Madrigal experiments", experiments.len());

    let mut files = Vec::new();
    for exp in &experiments {
        if !good_exp(exp, dates) {
            continue;
        }
        for file in client.experiment_files(exp.id)? {
            if kindat.is_empty() || kindat.contains(&file.kindat) {
                files.push(file);
            }
        }
    }
    Ok(files)
}

/// List the remote files matching an instrument's filename template over
/// `[start, stop]`, as a date-sorted manifest.
///
/// Some archives report `.h5` names against a `.hdf5` template; the
/// template is adjusted before matching. Remote names the template does not
/// recognise are dropped silently.
#[allow(clippy::too_many_arguments)]
pub fn list_remote_files(
    client: &dyn MadrigalClient,
    inst_code: Option<i64>,
    kindat: &[i64],
    template: &str,
    file_type: FileType,
    start: NaiveDateTime,
    stop: NaiveDateTime,
    year_pivot: Option<i32>,
) -> Result<Manifest, RemoteError> {
    let files = get_remote_filenames(client, inst_code, kindat, start, stop, None)?;
    let names: Vec<String> = files
        .iter()
        .filter_map(|f| {
            Path::new(&f.name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .collect();

    let resolved = template.replace("{file_type}", file_type.extension());
    let resolved = reconcile_hdf5_extension(&resolved, &names);
    let template = FileTemplate::parse(&resolved, file_type)?;
    info!("Parsing filenames");
    Ok(build_manifest(&names, &template, year_pivot)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::fs::File;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn exp(id: i64, start: NaiveDate, end: NaiveDate) -> Experiment {
        Experiment { id, start, end }
    }

    /// Canned catalog; records the queried range and every download.
    pub(crate) struct MockClient {
        pub experiments: Vec<Experiment>,
        pub files: Vec<ExperimentFile>,
        pub queried: RefCell<Vec<(NaiveDateTime, NaiveDateTime)>>,
        pub downloads: RefCell<Vec<String>>,
    }

    impl MockClient {
        pub(crate) fn new(experiments: Vec<Experiment>, files: Vec<ExperimentFile>) -> MockClient {
            MockClient {
                experiments,
                files,
                queried: RefCell::new(Vec::new()),
                downloads: RefCell::new(Vec::new()),
            }
        }
    }

    impl MadrigalClient for MockClient {
        fn experiments(
            &self,
            _inst_code: i64,
            start: NaiveDateTime,
            stop: NaiveDateTime,
        ) -> Result<Vec<Experiment>, RemoteError> {
            self.queried.borrow_mut().push((start, stop));
            Ok(self.experiments.clone())
        }

        fn experiment_files(&self, _experiment_id: i64) -> Result<Vec<ExperimentFile>, RemoteError> {
            Ok(self.files.clone())
        }

        fn download_file(
            &self,
            remote_name: &str,
            local: &Path,
            _credentials: &Credentials,
            _file_type: FileType,
        ) -> Result<(), RemoteError> {
            self.downloads.borrow_mut().push(remote_name.to_string());
            File::create(local).map_err(|source| RemoteError::Io {
                path: local.display().to_string(),
                source,
            })?;
            Ok(())
        }
    }

    #[test]
    fn credentials_must_be_non_empty() {
        assert!(matches!(
            Credentials::validated("", "name@email.address"),
            Err(RemoteError::MissingCredentials)
        ));
        assert!(matches!(
            Credentials::validated("Ruby+Payne-Scott", ""),
            Err(RemoteError::MissingCredentials)
        ));
        assert!(Credentials::validated("Ruby+Payne-Scott", "name@email.address").is_ok());
    }

    #[test]
    fn good_exp_rejects_sentinel_id() {
        let bad = exp(-1, date(2015, 1, 1), date(2015, 1, 5));
        assert!(!good_exp(&bad, None));
        assert!(!good_exp(&bad, Some(&[date(2015, 1, 2)])));
    }

    #[test]
    fn good_exp_date_intersection() {
        let e = exp(7, date(2015, 1, 10), date(2015, 1, 12));
        assert!(good_exp(&e, None));
        assert!(good_exp(&e, Some(&[date(2015, 1, 11)])));
        // The recorded end day still carries data, plus one day of padding.
        assert!(good_exp(&e, Some(&[date(2015, 1, 13)])));
        assert!(!good_exp(&e, Some(&[date(2015, 1, 14)])));
        assert!(!good_exp(&e, Some(&[date(2015, 1, 9)])));
    }

    #[test]
    fn missing_instrument_code_is_fatal() {
        let client = MockClient::new(vec![], vec![]);
        let start = date(2015, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        let err = get_remote_filenames(&client, None, &[], start, start, None).unwrap_err();
        assert!(matches!(err, RemoteError::MissingInstrumentCode));
        // Validation precedes any catalog query.
        assert!(client.queried.borrow().is_empty());
    }

    #[test]
    fn zero_width_query_is_widened() {
        let client = MockClient::new(vec![], vec![]);
        let start = date(2015, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        get_remote_filenames(&client, Some(8100), &[], start, start, None).unwrap();
        let queried = client.queried.borrow();
        assert_eq!(queried[0].0, start);
        assert_eq!(queried[0].1, start + Duration::days(1));
    }

    #[test]
    fn kindat_filter() {
        let client = MockClient::new(
            vec![exp(1, date(2015, 1, 1), date(2015, 1, 2))],
            vec![
                ExperimentFile {
                    name: "/opt/exp/a.hdf5".to_string(),
                    kindat: 10241,
                },
                ExperimentFile {
                    name: "/opt/exp/b.hdf5".to_string(),
                    kindat: 10242,
                },
            ],
        );
        let start = date(2015, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        let stop = date(2015, 1, 3).and_hms_opt(0, 0, 0).unwrap();

        let all = get_remote_filenames(&client, Some(8100), &[], start, stop, None).unwrap();
        assert_eq!(all.len(), 2);

        let some =
            get_remote_filenames(&client, Some(8100), &[10242], start, stop, None).unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].name, "/opt/exp/b.hdf5");
    }

    #[test]
    fn empty_date_list_is_fatal() {
        let client = MockClient::new(vec![], vec![]);
        let start = date(2015, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        let err =
            get_remote_filenames(&client, Some(8100), &[], start, start, Some(&[])).unwrap_err();
        assert!(matches!(err, RemoteError::EmptyDateRange));
    }

    #[test]
    fn list_remote_files_builds_manifest() {
        let client = MockClient::new(
            vec![exp(1, date(2015, 1, 1), date(2015, 1, 2))],
            vec![
                ExperimentFile {
                    name: "/opt/exp/dms_20150102_11.001.hdf5".to_string(),
                    kindat: 10241,
                },
                ExperimentFile {
                    name: "/opt/exp/dms_20150101_11.001.hdf5".to_string(),
                    kindat: 10241,
                },
                ExperimentFile {
                    name: "/opt/exp/notes.txt".to_string(),
                    kindat: 10241,
                },
            ],
        );
        let start = date(2015, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        let stop = date(2015, 1, 3).and_hms_opt(0, 0, 0).unwrap();
        let manifest = list_remote_files(
            &client,
            Some(8100),
            &[],
            "dms_{year:4d}{month:02d}{day:02d}_11.{version:03d}.{file_type}",
            FileType::Hdf5,
            start,
            stop,
            None,
        )
        .unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries[0].name, "dms_20150101_11.001.hdf5");
    }

    #[test]
    fn list_adjusts_short_hdf5_extension() {
        let client = MockClient::new(
            vec![exp(1, date(2015, 1, 1), date(2015, 1, 2))],
            vec![ExperimentFile {
                name: "/opt/exp/dms_20150101_11.001.h5".to_string(),
                kindat: 10241,
            }],
        );
        let start = date(2015, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        let stop = date(2015, 1, 3).and_hms_opt(0, 0, 0).unwrap();
        let manifest = list_remote_files(
            &client,
            Some(8100),
            &[],
            "dms_{year:4d}{month:02d}{day:02d}_11.{version:03d}.{file_type}",
            FileType::Hdf5,
            start,
            stop,
            None,
        )
        .unwrap();
        assert_eq!(manifest.len(), 1);
        assert!(manifest.entries[0].name.ends_with(".h5"));
    }
}
