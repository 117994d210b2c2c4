// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Reader for Madrigal HDF5 files.

The on-disk layout is fixed: `Data/Table Layout` is a compound dataset
holding the flat record table, and `Metadata/Data Parameters` is a parallel
compound dataset describing each column (name, description, units).
Remaining children of `Metadata` are free-form provenance; they are
flattened to text and surfaced through [Meta::additional_notes].

Madrigal files use arbitrary compound layouts, so the table is read through
the C API with the file's own datatype and each record is decoded
field-by-field from the member offsets.
 */

use std::path::Path;
use std::sync::Once;

use hdf5::types::{FloatSize, IntSize, TypeDescriptor};
use hdf5_metno_sys::h5d::H5Dread;
use hdf5_metno_sys::h5e::{H5Eset_auto2, H5E_DEFAULT};
use hdf5_metno_sys::h5p::H5P_DEFAULT;
use hdf5_metno_sys::h5s::H5S_ALL;

use crate::load::{path_str, LoadError};
use crate::metadata::{Meta, MetaEntry};
use crate::table::{Column, Table};

static SILENCE_HDF5: Once = Once::new();

/// The HDF5 library logs a verbose error stack to stderr for recoverable
/// conditions (e.g. probing an object that is absent). Turn that off once,
/// process-wide; failures still surface through return codes.
fn silence_error_stack() {
    SILENCE_HDF5.call_once(|| unsafe {
        H5Eset_auto2(H5E_DEFAULT, None, std::ptr::null_mut());
    });
}

/// One decoded compound member across all records.
enum FieldData {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Text(Vec<String>),
}

impl FieldData {
    fn as_text(&self, row: usize) -> String {
        match self {
            FieldData::Float(v) => v[row].to_string(),
            FieldData::Int(v) => v[row].to_string(),
            FieldData::Text(v) => v[row].clone(),
        }
    }
}

/// Read one Madrigal HDF5 file into a record table, filling `meta` from the
/// parameter descriptions and provenance datasets.
pub(crate) fn read_table(fname: &Path, meta: &mut Meta) -> Result<Table, LoadError> {
    silence_error_stack();
    let h5_err = |source: hdf5::Error| LoadError::Hdf5 {
        path: path_str(fname),
        source,
    };
    let file = hdf5::File::open(fname).map_err(h5_err)?;

    let layout = file
        .dataset("Data/Table Layout")
        .map_err(|_| missing(fname, "Data/Table Layout"))?;
    let records = read_compound(&layout, fname)?;

    let mut table = Table::new();
    for (name, data) in records {
        let column = match data {
            FieldData::Float(v) => Column::Float(v),
            FieldData::Int(v) => Column::Int(v),
            FieldData::Text(v) => Column::Text(v),
        };
        table.insert(&name, column)?;
    }

    let metadata = file
        .group("Metadata")
        .map_err(|_| missing(fname, "Metadata"))?;
    for member in metadata.member_names().map_err(h5_err)? {
        let ds = match metadata.dataset(&member) {
            Ok(ds) => ds,
            // Non-dataset children carry nothing we surface.
            Err(_) => continue,
        };
        if member == "Data Parameters" {
            describe_columns(&ds, fname, meta)?;
        } else {
            let text = flatten_to_text(&ds, fname)?;
            meta.additional_notes.insert(member.replace(' ', "_"), text);
        }
    }

    Ok(table)
}

fn missing(fname: &Path, name: &str) -> LoadError {
    LoadError::MissingHdf5Object {
        path: path_str(fname),
        name: name.to_string(),
    }
}

/// Populate `meta` from the `Data Parameters` table. Madrigal stores one
/// record per column: mnemonic, description, error flag, units, category.
fn describe_columns(
    ds: &hdf5::Dataset,
    fname: &Path,
    meta: &mut Meta,
) -> Result<(), LoadError> {
    let fields = read_compound(ds, fname)?;
    if fields.len() < 4 {
        return Ok(());
    }
    let rows = match fields.first() {
        Some((_, FieldData::Text(names))) => names.len(),
        _ => return Ok(()),
    };
    for row in 0..rows {
        let name = fields[0].1.as_text(row);
        let entry = MetaEntry {
            name: name.clone(),
            description: fields[1].1.as_text(row),
            units: fields[3].1.as_text(row),
            ..Default::default()
        };
        meta.insert_if_absent(&name, entry);
    }
    Ok(())
}

/// Flatten an arbitrary provenance dataset (compound records or plain
/// string arrays) to one text blob, one record per line.
fn flatten_to_text(ds: &hdf5::Dataset, fname: &Path) -> Result<String, LoadError> {
    let fields = read_compound(ds, fname)?;
    let rows = fields.first().map_or(0, |(_, data)| match data {
        FieldData::Float(v) => v.len(),
        FieldData::Int(v) => v.len(),
        FieldData::Text(v) => v.len(),
    });
    let mut lines = Vec::with_capacity(rows);
    for row in 0..rows {
        let line: Vec<String> = fields.iter().map(|(_, data)| data.as_text(row)).collect();
        lines.push(line.join(" "));
    }
    Ok(lines.join("\n"))
}

/// Read a dataset with the file's own datatype and decode every member.
/// Non-compound datasets are treated as a single anonymous member.
fn read_compound(
    ds: &hdf5::Dataset,
    fname: &Path,
) -> Result<Vec<(String, FieldData)>, LoadError> {
    let h5_err = |source: hdf5::Error| LoadError::Hdf5 {
        path: path_str(fname),
        source,
    };
    let dtype = ds.dtype().map_err(h5_err)?;
    let descriptor = dtype.to_descriptor().map_err(h5_err)?;
    let n_records = ds.shape().first().copied().unwrap_or(0);

    let (members, record_size): (Vec<(String, TypeDescriptor, usize)>, usize) = match descriptor {
        TypeDescriptor::Compound(compound) => (
            compound
                .fields
                .into_iter()
                .map(|f| (f.name, f.ty, f.offset))
                .collect(),
            compound.size,
        ),
        other => {
            let size = other.size();
            (vec![(String::new(), other, 0)], size)
        }
    };

    let mut buffer = vec![0u8; n_records * record_size];
    if n_records > 0 {
        // Reading with the file datatype avoids any library-side conversion
        // of the compound layout.
        let status = unsafe {
            H5Dread(
                ds.id(),
                dtype.id(),
                H5S_ALL,
                H5S_ALL,
                H5P_DEFAULT,
                buffer.as_mut_ptr().cast(),
            )
        };
        if status < 0 {
            return Err(h5_err(hdf5::Error::from("H5Dread failed")));
        }
    }

    let mut fields = Vec::with_capacity(members.len());
    for (name, ty, offset) in members {
        if let Some(data) = decode_member(&buffer, record_size, n_records, offset, &ty) {
            fields.push((name, data));
        }
    }
    Ok(fields)
}

/// Decode one member from every record. Members of a type Madrigal never
/// uses (arrays, variable-length data) are skipped.
fn decode_member(
    buffer: &[u8],
    stride: usize,
    n_records: usize,
    offset: usize,
    ty: &TypeDescriptor,
) -> Option<FieldData> {
    let bytes = |row: usize, len: usize| &buffer[row * stride + offset..row * stride + offset + len];
    match ty {
        TypeDescriptor::Integer(size) => {
            let values = (0..n_records)
                .map(|row| {
                    Some(match size {
                        IntSize::U1 => i8::from_ne_bytes(bytes(row, 1).try_into().ok()?) as i64,
                        IntSize::U2 => i16::from_ne_bytes(bytes(row, 2).try_into().ok()?) as i64,
                        IntSize::U4 => i32::from_ne_bytes(bytes(row, 4).try_into().ok()?) as i64,
                        IntSize::U8 => i64::from_ne_bytes(bytes(row, 8).try_into().ok()?),
                    })
                })
                .collect::<Option<Vec<i64>>>()?;
            Some(FieldData::Int(values))
        }
        TypeDescriptor::Unsigned(size) => {
            let values = (0..n_records)
                .map(|row| {
                    Some(match size {
                        IntSize::U1 => u8::from_ne_bytes(bytes(row, 1).try_into().ok()?) as i64,
                        IntSize::U2 => u16::from_ne_bytes(bytes(row, 2).try_into().ok()?) as i64,
                        IntSize::U4 => u32::from_ne_bytes(bytes(row, 4).try_into().ok()?) as i64,
                        IntSize::U8 => u64::from_ne_bytes(bytes(row, 8).try_into().ok()?) as i64,
                    })
                })
                .collect::<Option<Vec<i64>>>()?;
            Some(FieldData::Int(values))
        }
        TypeDescriptor::Float(size) => {
            let values = (0..n_records)
                .map(|row| {
                    Some(match size {
                        FloatSize::U4 => f32::from_ne_bytes(bytes(row, 4).try_into().ok()?) as f64,
                        FloatSize::U8 => f64::from_ne_bytes(bytes(row, 8).try_into().ok()?),
                    })
                })
                .collect::<Option<Vec<f64>>>()?;
            Some(FieldData::Float(values))
        }
        TypeDescriptor::FixedAscii(len) | TypeDescriptor::FixedUnicode(len) => {
            let values = (0..n_records)
                .map(|row| {
                    let raw = bytes(row, *len);
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    String::from_utf8_lossy(&raw[..end]).trim().to_string()
                })
                .collect();
            Some(FieldData::Text(values))
        }
        _ => None,
    }
}
