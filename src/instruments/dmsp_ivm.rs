// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
DMSP Ion Velocity Meter adapter.

Thermal plasma parameters from the Defense Meteorological Satellite Program
spacecraft, loaded flat (one row per timestamp). The `utd` tag is the UT
Dallas processing with RPA and IDM quality flags; cleaning keeps only rows
whose flags pass the chosen level.
 */

use log::warn;

use crate::instruments::{InstrumentConfig, TagConfig};
use crate::load::Frame;
use crate::table::Table;

pub const REFERENCES: &str = "F. J. Rich, Users Guide for the Topside Ionospheric Plasma \
     Monitor (SSIES, SSIES-2 and SSIES-3) on Spacecraft of the Defense \
     Meteorological Satellite Program (Air Force Phillips Laboratory, \
     Hanscom AFB, MA, 1994), Vol. 1, p. 25.";

/// How aggressively quality-flagged rows are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanLevel {
    /// RPA and IDM flags at most 1.
    Clean,
    /// Flags at most 2.
    Dusty,
    /// Flags at most 3.
    Dirty,
    /// Keep everything.
    None,
}

impl CleanLevel {
    fn max_flag(self) -> Option<f64> {
        match self {
            CleanLevel::Clean => Some(1.0),
            CleanLevel::Dusty => Some(2.0),
            CleanLevel::Dirty => Some(3.0),
            CleanLevel::None => None,
        }
    }
}

/// The adapter's declarative configuration: spacecraft f11 through f18,
/// with UT Dallas processing available up to f15.
pub fn config() -> InstrumentConfig {
    let utd_craft = ["f11", "f12", "f13", "f14", "f15"];
    let all_craft = ["f11", "f12", "f13", "f14", "f15", "f16", "f17", "f18"];
    // kindat is 10230 + craft number for utd, 10100 + craft number for
    // level 2.
    let craft_number = |id: &str| -> i64 { id[1..].parse().unwrap_or(0) };

    let mut tags = Vec::new();
    for id in utd_craft {
        tags.push(TagConfig {
            inst_id: id,
            tag: "utd",
            description: "UT Dallas DMSP data processing",
            kindat: 10230 + craft_number(id),
            template: format!(
                "dms_ut_{{year:4d}}{{month:02d}}{{day:02d}}_{}.{{version:03d}}.{{file_type}}",
                craft_number(id)
            ),
            schema: None,
        });
    }
    for id in all_craft {
        tags.push(TagConfig {
            inst_id: id,
            tag: "",
            description: "Level 2 data processing",
            kindat: 10100 + craft_number(id),
            template: format!(
                "dms_{{year:4d}}{{month:02d}}{{day:02d}}_{}s?.{{version:03d}}.{{file_type}}",
                craft_number(id)
            ),
            schema: None,
        });
    }

    InstrumentConfig {
        platform: "dmsp",
        name: "ivm",
        inst_code: 8100,
        year_pivot: None,
        tags,
    }
}

/// Downselect a flat UT Dallas frame by its RPA and IDM quality flags.
/// Frames without the flag columns (level 2 data) are left whole, with a
/// warning when filtering was requested.
pub fn clean(frame: &mut Frame, level: CleanLevel) {
    let max_flag = match level.max_flag() {
        Some(max_flag) => max_flag,
        None => return,
    };
    let (rpa, idm) = match (
        frame.table.floats("rpa_flag_ut"),
        frame.table.floats("idm_flag_ut"),
    ) {
        (Some(rpa), Some(idm)) => (rpa, idm),
        _ => {
            warn!("this level 1 data has no quality flags");
            return;
        }
    };

    let keep: Vec<usize> = (0..frame.n_rows())
        .filter(|&row| rpa[row] <= max_flag && idm[row] <= max_flag)
        .collect();
    frame.index = keep.iter().map(|&row| frame.index[row]).collect();
    let mut table = Table::new();
    for (name, column) in frame.table.iter() {
        // Equal lengths are preserved by construction.
        let _ = table.insert(name, column.take(&keep));
    }
    frame.table = table;
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    use crate::table::Column;

    fn flagged_frame() -> Frame {
        let mut table = Table::new();
        table
            .insert("rpa_flag_ut", Column::Float(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        table
            .insert("idm_flag_ut", Column::Float(vec![1.0, 1.0, 3.0, 1.0]))
            .unwrap();
        table
            .insert("ion_v_sat_for", Column::Float(vec![10.0, 20.0, 30.0, 40.0]))
            .unwrap();
        let index = (0..4)
            .map(|m| {
                NaiveDate::from_ymd_opt(1998, 1, 2)
                    .unwrap()
                    .and_hms_opt(0, m, 0)
                    .unwrap()
            })
            .collect();
        Frame { index, table }
    }

    #[test]
    fn clean_keeps_low_flags_only() {
        let mut frame = flagged_frame();
        clean(&mut frame, CleanLevel::Clean);
        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.table.floats("ion_v_sat_for"), Some(vec![10.0]));
    }

    #[test]
    fn dusty_and_dirty_are_looser() {
        let mut dusty = flagged_frame();
        clean(&mut dusty, CleanLevel::Dusty);
        assert_eq!(dusty.n_rows(), 2);

        let mut dirty = flagged_frame();
        clean(&mut dirty, CleanLevel::Dirty);
        assert_eq!(dirty.n_rows(), 3);
    }

    #[test]
    fn none_keeps_everything() {
        let mut frame = flagged_frame();
        clean(&mut frame, CleanLevel::None);
        assert_eq!(frame.n_rows(), 4);
    }

    #[test]
    fn missing_flags_leave_frame_whole() {
        let mut table = Table::new();
        table
            .insert("ion_v_sat_for", Column::Float(vec![10.0]))
            .unwrap();
        let mut frame = Frame {
            index: vec![NaiveDate::from_ymd_opt(1998, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()],
            table,
        };
        clean(&mut frame, CleanLevel::Clean);
        assert_eq!(frame.n_rows(), 1);
    }

    #[test]
    fn kindat_codes_follow_craft_number() {
        let config = config();
        assert_eq!(config.tag("f11", "utd").unwrap().kindat, 10241);
        assert_eq!(config.tag("f15", "utd").unwrap().kindat, 10245);
        assert_eq!(config.tag("f16", "").unwrap().kindat, 10116);
        assert!(config.tag("f16", "utd").is_err());
    }
}
