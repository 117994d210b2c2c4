// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all madrigal-data-related errors.

use thiserror::Error;

/// The top-level error; every fallible public entry point can be funnelled
/// into this.
#[derive(Error, Debug)]
pub enum MadrigalError {
    #[error("{0}")]
    Load(#[from] crate::load::LoadError),

    #[error("{0}")]
    Remote(#[from] crate::remote::RemoteError),

    #[error("{0}")]
    Filename(#[from] crate::filenames::FilenameError),

    #[error("{0}")]
    Instrument(#[from] crate::instruments::InstrumentError),
}
