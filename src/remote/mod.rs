// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Talking to a Madrigal archive: experiment discovery, remote file listings
and downloads.

The archive's RPC surface is behind the [MadrigalClient] trait; this crate
ships the discovery and reconciliation logic only, a concrete client is the
caller's. The remote service silently accepts malformed requests, so the
instrument code and credentials are validated here, before any network call.
 */

mod catalog;
mod download;

pub use catalog::{
    get_remote_filenames, good_exp, list_remote_files, Credentials, Experiment, ExperimentFile,
    MadrigalClient,
};
pub use download::download;

use thiserror::Error;

use crate::filenames::FilenameError;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("must supply a Madrigal instrument code")]
    MissingInstrumentCode,

    #[error(
        "the Madrigal database requires a username and password; supply \
         user=\"firstname+lastname\" and password=\"name@email.address\""
    )]
    MissingCredentials,

    #[error("must supply a Madrigal experiment code")]
    MissingExperimentCode,

    #[error("no dates were requested")]
    EmptyDateRange,

    #[error("{0}")]
    Filename(#[from] FilenameError),

    #[error("error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A failure reported by the archive client itself.
    #[error("madrigal client error: {0}")]
    Client(String),
}
