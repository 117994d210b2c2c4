// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Filename templates and the reconciliation of archive listings against them.

Madrigal archives name files irregularly, so each instrument declares a
template like `dms_{year:4d}{month:02d}{day:02d}_11.002.{file_type}` or
`jul{year:02d}{month:02d}{day:02d}[a-z]*.{file_type}`. Candidate names from a
remote listing are matched against the template; names that do not match are
dropped silently, matched names become a date-sorted [Manifest].
 */

use std::cmp::Ordering;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::load::FileType;

lazy_static! {
    /// One `{field:Nd}` placeholder in a template string.
    static ref FIELD_RE: Regex =
        Regex::new(r"\{(year|month|day|version|file_type)(?::0?(\d+)d)?\}").unwrap();
}

#[derive(Error, Debug)]
pub enum FilenameError {
    #[error("template {template:?} has no fields to match")]
    NoFields { template: String },

    #[error("template {template:?} repeats the field {field}")]
    RepeatedField { template: String, field: String },

    #[error(
        "template {template:?} holds a two-digit year but no pivot year was \
         supplied"
    )]
    MissingYearPivot { template: String },

    #[error("template {template:?} matches {name:?} but {field}={value} is not a date")]
    BadDate {
        template: String,
        name: String,
        field: String,
        value: String,
    },
}

/// The date-bearing fields a template may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year4,
    Year2,
    Month,
    Day,
    Version,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Field::Year4 | Field::Year2 => "year",
            Field::Month => "month",
            Field::Day => "day",
            Field::Version => "version",
        }
    }

    fn width(self) -> usize {
        match self {
            Field::Year4 => 4,
            Field::Year2 | Field::Month | Field::Day => 2,
            Field::Version => 3,
        }
    }
}

/// A parsed filename template, ready to match candidate names.
#[derive(Debug, Clone)]
pub struct FileTemplate {
    source: String,
    fields: Vec<Field>,
    matcher: Regex,
}

impl FileTemplate {
    /// Parse a template, substituting `{file_type}` with the given format's
    /// extension. `*` segments match lazily, and any other regex syntax in
    /// the template (e.g. `[a-z]*`) passes through untouched.
    pub fn parse(template: &str, file_type: FileType) -> Result<FileTemplate, FilenameError> {
        let mut fields = Vec::new();
        let mut pattern = String::from("^");
        let mut last = 0;
        for caps in FIELD_RE.captures_iter(template) {
            let whole = caps.get(0).expect("capture 0 always exists");
            pattern.push_str(&template[last..whole.start()]);
            last = whole.end();

            let width: Option<usize> = caps.get(2).and_then(|w| w.as_str().parse().ok());
            let field = match &caps[1] {
                "year" if width == Some(2) => Some(Field::Year2),
                "year" => Some(Field::Year4),
                "month" => Some(Field::Month),
                "day" => Some(Field::Day),
                "version" => Some(Field::Version),
                "file_type" => None,
                other => unreachable!("field regex admitted {other}"),
            };
            match field {
                Some(field) => {
                    if fields.contains(&field) {
                        return Err(FilenameError::RepeatedField {
                            template: template.to_string(),
                            field: field.name().to_string(),
                        });
                    }
                    pattern.push_str(&format!(r"(\d{{{}}})", field.width()));
                    fields.push(field);
                }
                None => pattern.push_str(&regex::escape(file_type.extension())),
            }
        }
        pattern.push_str(&template[last..]);
        pattern.push('$');

        if fields.is_empty() {
            return Err(FilenameError::NoFields {
                template: template.to_string(),
            });
        }
        let matcher = Regex::new(&pattern).map_err(|_| FilenameError::NoFields {
            template: template.to_string(),
        })?;
        Ok(FileTemplate {
            source: template.to_string(),
            fields,
            matcher,
        })
    }

    /// Does the template store the year as two digits only?
    pub fn has_two_digit_year(&self) -> bool {
        self.fields.contains(&Field::Year2)
    }

    /// Match one candidate name, returning its extracted date and version.
    /// `None` means the name does not fit the template.
    fn extract(
        &self,
        name: &str,
        year_pivot: Option<i32>,
    ) -> Result<Option<(NaiveDate, Option<u32>)>, FilenameError> {
        let caps = match self.matcher.captures(name) {
            Some(caps) => caps,
            None => return Ok(None),
        };
        let (mut year, mut month, mut day) = (0i32, 1u32, 1u32);
        let mut version = None;
        for (i, field) in self.fields.iter().enumerate() {
            let text = &caps[i + 1];
            // The pattern only admits digits of the declared width.
            let value: u32 = text.parse().expect("matched digits parse");
            match field {
                Field::Year4 => year = value as i32,
                Field::Year2 => {
                    let pivot = year_pivot.ok_or_else(|| FilenameError::MissingYearPivot {
                        template: self.source.clone(),
                    })?;
                    // Archives predate 2000: on or past the pivot means the
                    // 1900s, before it the 2000s.
                    year = if value as i32 >= pivot {
                        1900 + value as i32
                    } else {
                        2000 + value as i32
                    };
                }
                Field::Month => month = value,
                Field::Day => day = value,
                Field::Version => version = Some(value),
            }
        }
        let date =
            NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| FilenameError::BadDate {
                template: self.source.clone(),
                name: name.to_string(),
                field: "date".to_string(),
                value: format!("{year:04}-{month:02}-{day:02}"),
            })?;
        Ok(Some((date, version)))
    }
}

/// One file the template recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// The date encoded in the filename.
    pub date: NaiveDate,
    /// The version field, when the template declares one.
    pub version: Option<u32>,
    /// The candidate name, verbatim.
    pub name: String,
}

/// The date-sorted outcome of matching a listing against a template.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Entries sorted by date, then version, then name.
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Number of recognised files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Did nothing match?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// For each date, the entry with the highest version.
    pub fn latest_versions(&self) -> Vec<&ManifestEntry> {
        let mut latest: Vec<&ManifestEntry> = Vec::new();
        for entry in &self.entries {
            match latest.last() {
                Some(last) if last.date == entry.date => {
                    *latest.last_mut().expect("non-empty") = entry;
                }
                _ => latest.push(entry),
            }
        }
        latest
    }
}

/// Match candidate names against a template, dropping non-matching names
/// silently. `year_pivot` is required when the template stores two-digit
/// years: years at or past the pivot fall in the 1900s, earlier ones in the
/// 2000s.
pub fn build_manifest(
    candidates: &[String],
    template: &FileTemplate,
    year_pivot: Option<i32>,
) -> Result<Manifest, FilenameError> {
    if template.has_two_digit_year() && year_pivot.is_none() {
        return Err(FilenameError::MissingYearPivot {
            template: template.source.clone(),
        });
    }
    let mut entries = Vec::new();
    for name in candidates {
        if let Some((date, version)) = template.extract(name, year_pivot)? {
            entries.push(ManifestEntry {
                date,
                version,
                name: name.clone(),
            });
        }
    }
    entries.sort_by(|a, b| match a.date.cmp(&b.date) {
        Ordering::Equal => match a.version.cmp(&b.version) {
            Ordering::Equal => a.name.cmp(&b.name),
            other => other,
        },
        other => other,
    });
    Ok(Manifest { entries })
}

/// Adjust an HDF5 template for archives that report `.h5` names: if no
/// remote name carries the long extension but some carry the short one, the
/// template's `hdf5` suffix is shortened to match.
pub(crate) fn reconcile_hdf5_extension(template: &str, remote_names: &[String]) -> String {
    let any_short = remote_names.iter().any(|n| n.ends_with(".h5"));
    let any_long = remote_names.iter().any(|n| n.ends_with(".hdf5"));
    if template.contains("hdf5") && any_short && !any_long {
        template.replace("hdf5", "h5")
    } else {
        template.to_string()
    }
}

/// The local name a remote file should be saved under: the remote name with
/// its extension remapped to the requested format's, when they differ.
pub(crate) fn local_name(remote_name: &str, file_type: FileType) -> String {
    let wanted = file_type.extension();
    for known in FileType::ALL {
        let ext = format!(".{}", known.extension());
        if remote_name.ends_with(&ext) && known != file_type {
            let stem = &remote_name[..remote_name.len() - ext.len()];
            return format!("{stem}.{wanted}");
        }
    }
    // `.h5` is the one extension archives use that the format table does not.
    if let Some(stem) = remote_name.strip_suffix(".h5") {
        if file_type != FileType::Hdf5 {
            return format!("{stem}.{wanted}");
        }
    }
    remote_name.to_string()
}
