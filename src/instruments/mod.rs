// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Per-instrument adapters: declarative configuration tying a platform to its
Madrigal instrument code, per-tag experiment codes, filename templates and
coordinate schemas, plus the instrument-specific cleaning and derivation
routines.
 */

pub mod dmsp_ivm;
pub mod gnss_tec;
pub mod jro_isr;

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::dataset::DatasetError;
use crate::filenames::Manifest;
use crate::load::{self, CoordSchema, FileType, LoadError, LoadedData};
use crate::metadata::Meta;
use crate::remote::{self, Credentials, MadrigalClient, RemoteError};

/// General acknowledgement statement for all CEDAR Madrigal data.
pub const CEDAR_RULES: &str =
    "Contact the PI when using this data, in accordance with the CEDAR 'Rules of the Road'";

#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("unknown inst_id/tag combination {inst_id:?}/{tag:?}")]
    UnknownTag { inst_id: String, tag: String },

    #[error("no matching azimuth and elevation data included")]
    NoBeamDirections,

    #[error("variable {0} is required but not present")]
    MissingVariable(String),

    #[error("unknown selection method {got:?}, use one of {known:?}")]
    UnknownSelectionMethod {
        got: String,
        known: [&'static str; 2],
    },

    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Dataset(#[from] DatasetError),
}

/// One loadable data product: an `(inst_id, tag)` pair and everything the
/// archive needs to find, fetch and label it.
#[derive(Debug, Clone)]
pub struct TagConfig {
    /// Host-framework instrument id (e.g. the DMSP spacecraft, `"f15"`).
    pub inst_id: &'static str,
    /// Host-framework tag (e.g. `"utd"`, `"vtec"`, `"drifts"`).
    pub tag: &'static str,
    /// Human-readable product description.
    pub description: &'static str,
    /// Madrigal kind-of-data code for this product.
    pub kindat: i64,
    /// Filename template with `{file_type}` unresolved.
    pub template: String,
    /// Coordinate schema for labelled loads; `None` loads flat.
    pub schema: Option<CoordSchema>,
}

/// Declarative configuration for one instrument adapter.
#[derive(Debug, Clone)]
pub struct InstrumentConfig {
    /// Host-framework platform string, e.g. `"dmsp"`.
    pub platform: &'static str,
    /// Host-framework name string, e.g. `"ivm"`.
    pub name: &'static str,
    /// Madrigal instrument code.
    pub inst_code: i64,
    /// Pivot for templates carrying two-digit years.
    pub year_pivot: Option<i32>,
    /// Every supported `(inst_id, tag)` product.
    pub tags: Vec<TagConfig>,
}

impl InstrumentConfig {
    /// Look up one product's configuration.
    pub fn tag(&self, inst_id: &str, tag: &str) -> Result<&TagConfig, InstrumentError> {
        self.tags
            .iter()
            .find(|t| t.inst_id == inst_id && t.tag == tag)
            .ok_or_else(|| InstrumentError::UnknownTag {
                inst_id: inst_id.to_string(),
                tag: tag.to_string(),
            })
    }

    /// Load local files for one product, applying its coordinate schema.
    pub fn load(
        &self,
        inst_id: &str,
        tag: &str,
        fnames: &[PathBuf],
    ) -> Result<(LoadedData, Meta), InstrumentError> {
        let tag = self.tag(inst_id, tag)?;
        Ok(load::load(fnames, tag.schema.as_ref())?)
    }

    /// List the remote files available for one product over `[start, stop]`.
    pub fn list_remote_files(
        &self,
        client: &dyn MadrigalClient,
        inst_id: &str,
        tag: &str,
        file_type: FileType,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Manifest, InstrumentError> {
        let tag = self.tag(inst_id, tag)?;
        Ok(remote::list_remote_files(
            client,
            Some(self.inst_code),
            &[tag.kindat],
            &tag.template,
            file_type,
            start,
            stop,
            self.year_pivot,
        )?)
    }

    /// Download one product's files for the given dates, skipping files
    /// that already exist under `data_path`.
    #[allow(clippy::too_many_arguments)]
    pub fn download(
        &self,
        client: &dyn MadrigalClient,
        credentials: &Credentials,
        inst_id: &str,
        tag: &str,
        dates: &[NaiveDate],
        data_path: &Path,
        file_type: FileType,
    ) -> Result<(), InstrumentError> {
        let tag = self.tag(inst_id, tag)?;
        Ok(remote::download(
            client,
            credentials,
            Some(self.inst_code),
            Some(&[tag.kindat]),
            dates,
            data_path,
            file_type,
        )?)
    }
}
