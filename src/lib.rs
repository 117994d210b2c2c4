// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Fetch, parse and geolocate space-physics datasets hosted on CEDAR Madrigal
archives.

The crate centres on a generalised file loader that reconciles the three
Madrigal on-disk formats (dense HDF5 tables, self-describing netCDF arrays
and gzipped whitespace text) into either a flat time-indexed table or a
coordinate-labelled multi-dimensional dataset, plus the remote-catalogue
discovery and coordinate-geometry utilities the instrument adapters build on.
 */

pub mod constants;
pub mod coords;
pub mod dataset;
pub mod error;
pub mod filenames;
pub mod instruments;
pub mod load;
pub mod metadata;
pub mod remote;
pub mod table;

// Re-exports.
pub use dataset::Dataset;
pub use error::MadrigalError;
pub use load::{load, CoordSchema, DimGroup, FileType, Frame, LoadError, LoadedData};
pub use metadata::{Meta, MetaEntry};
pub use table::{Column, Table};
