// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fetching archive files to the local data directory.

use std::path::Path;

use chrono::NaiveDate;
use log::info;

use crate::filenames::local_name;
use crate::load::FileType;
use crate::remote::{
    get_remote_filenames, Credentials, MadrigalClient, RemoteError,
};

/// Download every file the archive holds for `dates`, skipping files that
/// already exist locally.
///
/// Local names are the remote basenames with the extension remapped to
/// `file_type` where the archive's differs. Existence of the local name is
/// the whole freshness policy: no checksums, no staleness checks, so a
/// partial earlier fetch must be deleted by hand before retrying.
pub fn download(
    client: &dyn MadrigalClient,
    credentials: &Credentials,
    inst_code: Option<i64>,
    kindat: Option<&[i64]>,
    dates: &[NaiveDate],
    data_path: &Path,
    file_type: FileType,
) -> Result<(), RemoteError> {
    let kindat = kindat.ok_or(RemoteError::MissingExperimentCode)?;
    let (min, max) = match (dates.iter().min(), dates.iter().max()) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(RemoteError::EmptyDateRange),
    };
    let start = min.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    let stop = max.and_hms_opt(0, 0, 0).expect("midnight is always valid");

    let files = get_remote_filenames(client, inst_code, kindat, start, stop, Some(dates))?;

    for file in files {
        let basename = match Path::new(&file.name).file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        let local = data_path.join(local_name(&basename, file_type));
        if local.is_file() {
            info!("{} already exists. Skipping.", local.display());
            continue;
        }
        info!("Downloading data for {}", local.display());
        client.download_file(&file.name, &local, credentials, file_type)?;
    }
    Ok(())
}
