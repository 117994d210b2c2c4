// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Per-column metadata collected while loading archive files.

Keys are lowercase column names. The first file that introduces a column wins:
later files never overwrite an existing entry. Arbitrary archive-level
provenance (experiment notes, parameter tables) lives in an explicit
`additional_notes` map rather than being injected as dynamic attributes.
 */

use indexmap::IndexMap;

/// Metadata labels for one data column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaEntry {
    /// Display name, as spelled in the source file.
    pub name: String,
    /// Physical units; empty if the source format carries none.
    pub units: String,
    /// Free-text description.
    pub description: String,
    /// Declared fill/missing-value sentinel.
    pub fill_value: Option<f64>,
    /// Declared plausible minimum.
    pub min_value: Option<f64>,
    /// Declared plausible maximum.
    pub max_value: Option<f64>,
    /// Free-text notes (e.g. the archive catalog text).
    pub notes: String,
}

impl MetaEntry {
    /// An entry with only the display name set.
    pub fn named<S: Into<String>>(name: S) -> MetaEntry {
        MetaEntry {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// The metadata container handed back alongside loaded data.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    entries: IndexMap<String, MetaEntry>,
    /// Archive-level key/value provenance notes (e.g. HDF5 `Metadata` group
    /// children other than the parameter table), keyed by sanitised name.
    pub additional_notes: IndexMap<String, String>,
}

impl Meta {
    /// An empty, valid container.
    pub fn new() -> Meta {
        Meta::default()
    }

    /// Does an entry exist for this column? The name is matched
    /// case-insensitively.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Insert an entry unless the column is already described; the first
    /// file to introduce a column wins.
    pub fn insert_if_absent<S: AsRef<str>>(&mut self, name: S, entry: MetaEntry) {
        let key = name.as_ref().to_lowercase();
        self.entries.entry(key).or_insert(entry);
    }

    /// Insert or replace an entry. Instrument adapters use this to stamp
    /// metadata for derived quantities.
    pub fn set<S: AsRef<str>>(&mut self, name: S, entry: MetaEntry) {
        self.entries.insert(name.as_ref().to_lowercase(), entry);
    }

    /// Look up an entry by (case-insensitive) column name.
    pub fn get(&self, name: &str) -> Option<&MetaEntry> {
        self.entries.get(&name.to_lowercase())
    }

    /// Number of described columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the container empty of column entries?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(lowercase name, entry)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_wins() {
        let mut meta = Meta::new();
        meta.insert_if_absent(
            "Ne",
            MetaEntry {
                name: "Ne".to_string(),
                units: "m-3".to_string(),
                ..Default::default()
            },
        );
        meta.insert_if_absent(
            "NE",
            MetaEntry {
                name: "NE".to_string(),
                units: "cm-3".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("ne").map(|e| e.units.as_str()), Some("m-3"));
    }

    #[test]
    fn set_overwrites() {
        let mut meta = Meta::new();
        meta.insert_if_absent("gdlat1", MetaEntry::named("gdlat1"));
        meta.set(
            "gdlat1",
            MetaEntry {
                name: "Beam 1 latitude".to_string(),
                units: "degrees".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(meta.get("gdlat1").map(|e| e.units.as_str()), Some("degrees"));
    }
}
