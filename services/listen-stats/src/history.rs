//!
//! src/history.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Loads streaming history exports, removes overlapping duplicate
//! records and derives the play date and minutes columns
//!

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf}
};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::StatsError;
use crate::types::{Play, PlaybackRecord};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%dT%H:%M%z",
];

/// Hour precision, chrono wants the minutes spelled out
const HOUR_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

///
/// How duplicate groups, records sharing (endTime, artistName, trackName),
/// are collapsed.
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DedupPolicy {
    /// Keep the longest play of each group, drop the rest of that group only
    #[default]
    Scoped,
    /// Drop every record whose msPlayed equals any group minimum
    GlobalMinimum
}

/// Cleaned history in original file order
#[derive(Debug, Clone, Default)]
pub struct History {
    plays: Vec<Play>
}

impl History {
    pub fn plays(&self) -> &[Play] {
        &self.plays
    }
}

/// Reads a history export from any byte stream
pub fn load_history<R: Read>(reader: R, policy: DedupPolicy) ->
    Result<History, StatsError> {
    let records = read_records(reader)?;
    clean(records, policy)
}

pub fn load_history_file(path: impl AsRef<Path>, policy: DedupPolicy) ->
    Result<History, StatsError> {
    let records = read_file(path.as_ref())?;
    clean(records, policy)
}

///
/// Concatenates several export files (`-` reads stdin) and cleans them as
/// one table so duplicates spanning two files are caught too.
///
pub fn load_history_files(paths: &[PathBuf], policy: DedupPolicy) ->
    Result<History, StatsError> {
    let mut records = Vec::new();
    for path in paths {
        let mut batch = if path.as_os_str() == "-" {
            read_records(io::stdin().lock())?
        } else {
            read_file(path)?
        };
        info!(path = %path.display(), records = batch.len(), "history.read");
        records.append(&mut batch);
    }
    clean(records, policy)
}

fn read_file(path: &Path) -> Result<Vec<PlaybackRecord>, StatsError> {
    let file = File::open(path).map_err(|e| StatsError::Io(
        io::Error::new(e.kind(), format!("open {}: {e}", path.display()))
    ))?;
    read_records(BufReader::new(file))
}

pub fn read_records<R: Read>(reader: R) -> Result<Vec<PlaybackRecord>, StatsError> {
    let value: Value = serde_json::from_reader(reader).map_err(|e| {
        if e.is_io() {
            StatsError::Io(e.into())
        } else {
            StatsError::Parse(format!("history is not valid json: {e}"))
        }
    })?;

    let items = match value {
        Value::Array(items) => items,
        other => return Err(StatsError::Schema(format!(
            "expected an array of playback records, found {}", kind_of(&other)
        )))
    };

    items.into_iter()
        .enumerate()
        .map(|(idx, item)| {
            serde_json::from_value::<PlaybackRecord>(item)
                .map_err(|e| StatsError::Schema(format!("record {idx}: {e}")))
        })
        .collect()
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object"
    }
}

fn clean(records: Vec<PlaybackRecord>, policy: DedupPolicy) ->
    Result<History, StatsError> {
    let total = records.len();
    let kept = dedup(records, policy);
    debug!(
        policy = ?policy,
        total,
        dropped = total - kept.len(),
        "history.dedup"
    );

    let plays = kept.into_iter()
        .map(|record| {
            let play_date = parse_end_time(&record.end_time).ok_or_else(||
                StatsError::Parse(format!(
                    "endTime {:?} is not an ISO-8601 timestamp ({} - {})",
                    record.end_time, record.track_name, record.artist_name
                ))
            )?;
            Ok(Play::from_record(record, play_date))
        })
        .collect::<Result<Vec<_>, StatsError>>()?;

    info!(plays = plays.len(), "history.load");
    Ok( History { plays } )
}

/// Survivors keep their relative order
pub fn dedup(records: Vec<PlaybackRecord>, policy: DedupPolicy) -> Vec<PlaybackRecord> {
    let keep = {
        let mut groups: HashMap<(&str, &str, &str), Vec<usize>> = HashMap::new();
        for (idx, r) in records.iter().enumerate() {
            groups.entry((r.end_time.as_str(), r.artist_name.as_str(), r.track_name.as_str()))
                .or_default()
                .push(idx);
        }

        let mut keep = vec![true; records.len()];
        let duplicates = groups.values().filter(|members| members.len() > 1);
        match policy {
            DedupPolicy::Scoped => {
                for members in duplicates {
                    // strict comparison keeps the earliest of equal maxima
                    let survivor = members.iter()
                        .copied()
                        .reduce(|best, idx| {
                            if records[idx].ms_played > records[best].ms_played {
                                idx
                            } else {
                                best
                            }
                        });
                    for &idx in members {
                        keep[idx] = Some(idx) == survivor;
                    }
                }
            },
            DedupPolicy::GlobalMinimum => {
                let minima: HashSet<i64> = duplicates
                    .filter_map(|members| {
                        members.iter().map(|&idx| records[idx].ms_played).min()
                    })
                    .collect();
                for (idx, r) in records.iter().enumerate() {
                    if minima.contains(&r.ms_played) {
                        keep[idx] = false;
                    }
                }
            }
        }
        keep
    };

    records.into_iter()
        .zip(keep)
        .filter_map(|(record, keep)| keep.then_some(record))
        .collect()
}

///
/// Lenient ISO-8601: offsets (with or without a colon, down to minute
/// precision) are normalized to UTC, naive values are taken as is. A
/// missing time means midnight, a missing day means the first.
///
pub fn parse_end_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    let offset = DateTime::parse_from_rfc3339(s).ok().or_else(|| {
        OFFSET_FORMATS.iter().find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    });
    if let Some(dt) = offset {
        return Some(dt.naive_utc());
    }

    let naive = s.strip_suffix('Z').unwrap_or(s);
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0);
    NAIVE_FORMATS.iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .or_else(|| {
            let hour = format!("{naive}:00");
            HOUR_FORMATS.iter().find_map(|fmt| NaiveDateTime::parse_from_str(&hour, fmt).ok())
        })
        .or_else(|| NaiveDate::parse_from_str(naive, "%Y-%m-%d").ok().and_then(midnight))
        .or_else(|| {
            NaiveDate::parse_from_str(&format!("{naive}-01"), "%Y-%m-%d")
                .ok()
                .and_then(midnight)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use clap::ValueEnum;

    fn record(end_time: &str, artist: &str, track: &str, ms_played: i64) -> PlaybackRecord {
        PlaybackRecord {
            end_time: end_time.to_string(),
            artist_name: artist.to_string(),
            track_name: track.to_string(),
            ms_played
        }
    }

    fn to_json(records: &[PlaybackRecord]) -> String {
        serde_json::to_string(records).unwrap()
    }

    #[test]
    fn duplicate_pair_keeps_longer_play() {
        let input = to_json(&[
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 1000),
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 5000),
        ]);

        for policy in [DedupPolicy::Scoped, DedupPolicy::GlobalMinimum] {
            let history = load_history(input.as_bytes(), policy).unwrap();
            assert_eq!(history.plays().len(), 1);
            assert_eq!(history.plays()[0].ms_played, 5000);
        }
    }

    #[test]
    fn scoped_leaves_no_duplicate_keys() {
        let records = vec![
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 3000),
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 9000),
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 1000),
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 9000),
            record("2024-01-06 08:00", "Björk", "Hyperballad", 200),
            record("2024-01-06 08:00", "Björk", "Hyperballad", 200),
        ];

        let kept = dedup(records, DedupPolicy::Scoped);
        assert_eq!(kept.len(), 2);

        let keys: HashSet<_> = kept.iter()
            .map(|r| (&r.end_time, &r.artist_name, &r.track_name))
            .collect();
        assert_eq!(keys.len(), kept.len());
        assert_eq!(kept[0].ms_played, 9000);
        assert_eq!(kept[1].ms_played, 200);
    }

    #[test]
    fn scoped_collapses_exact_copies_to_one() {
        let records = vec![
            record("2024-01-05 21:14", "A", "x", 9000),
            record("2024-01-05 21:14", "A", "x", 9000),
        ];
        let kept = dedup(records.clone(), DedupPolicy::Scoped);
        assert_eq!(kept, vec![records[0].clone()]);

        // both copies sit at the group minimum
        assert!(dedup(records, DedupPolicy::GlobalMinimum).is_empty());
    }

    #[test]
    fn scoped_does_not_touch_unrelated_records() {
        let records = vec![
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 1000),
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 5000),
            record("2024-01-07 10:00", "Björk", "Jóga", 1000),
        ];

        let kept = dedup(records.clone(), DedupPolicy::Scoped);
        assert_eq!(kept, vec![records[1].clone(), records[2].clone()]);
    }

    #[test]
    fn global_minimum_drops_unrelated_records_with_same_value() {
        let records = vec![
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 1000),
            record("2024-01-05 21:14", "Khruangbin", "Maria También", 5000),
            record("2024-01-07 10:00", "Björk", "Jóga", 1000),
            record("2024-01-07 11:00", "Björk", "Army of Me", 7000),
        ];

        let kept = dedup(records.clone(), DedupPolicy::GlobalMinimum);
        assert_eq!(kept, vec![records[1].clone(), records[3].clone()]);
    }

    #[test]
    fn survivors_keep_input_order() {
        let input = to_json(&[
            record("2024-02-01 09:00", "C", "c", 10),
            record("2024-01-01 09:00", "A", "a", 20),
            record("2024-02-01 09:00", "C", "c", 30),
            record("2024-01-15 09:00", "B", "b", 40),
        ]);
        let history = load_history(input.as_bytes(), DedupPolicy::Scoped).unwrap();
        let order: Vec<_> = history.plays().iter().map(|p| p.artist_name.as_str()).collect();
        assert_eq!(order, vec!["A", "C", "B"]);
    }

    #[test]
    fn derives_play_date_and_minutes() {
        let input = to_json(&[record("2024-01-05 21:14", "A", "a", 185_000)]);
        let history = load_history(input.as_bytes(), DedupPolicy::Scoped).unwrap();
        let play = &history.plays()[0];

        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
            .and_hms_opt(21, 14, 0).unwrap();
        assert_eq!(play.play_date, expected);
        assert_eq!(play.min_played, 3);
    }

    #[test]
    fn parses_lenient_iso_timestamps() {
        let day = NaiveDate::from_ymd_opt(2023, 11, 30).unwrap();
        let cases = [
            ("2023-11-30 23:05", day.and_hms_opt(23, 5, 0)),
            ("2023-11-30T23:05", day.and_hms_opt(23, 5, 0)),
            ("2023-11-30 23:05:09", day.and_hms_opt(23, 5, 9)),
            ("2023-11-30T23:05:09.250", day.and_hms_milli_opt(23, 5, 9, 250)),
            ("2023-11-30T23:05:09Z", day.and_hms_opt(23, 5, 9)),
            ("2023-12-01T01:05:09+02:00", day.and_hms_opt(23, 5, 9)),
            ("2023-11-30", day.and_hms_opt(0, 0, 0)),
            ("2023-11-30T23", day.and_hms_opt(23, 0, 0)),
            ("2023-11-30 23", day.and_hms_opt(23, 0, 0)),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_end_time(input), expected, "{input}");
        }
        assert_eq!(parse_end_time("last tuesday"), None);
        assert_eq!(parse_end_time("2023-11-30T23:05:09+25:00"), None);
    }

    #[test]
    fn offsets_without_seconds_or_colon_become_utc() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let utc = day.and_hms_opt(20, 14, 0);
        for input in [
            "2024-01-05 21:14+01:00",
            "2024-01-05T21:14+01:00",
            "2024-01-05T21:14:00+0100",
            "2024-01-05 21:14:00+01:00",
            "2024-01-05T21:14+0100",
            "2024-01-05T19:14-01:00",
        ] {
            assert_eq!(parse_end_time(input), utc, "{input}");
        }
    }

    #[test]
    fn coarse_timestamps_fill_in_the_start() {
        assert_eq!(
            parse_end_time("2024-01-05T21"),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(21, 0, 0)
        );
        assert_eq!(
            parse_end_time("2024-01"),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_end_time("2024-13"), None);
        assert_eq!(parse_end_time("2024"), None);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = load_history(&b"[{\"endTime\": "[..], DedupPolicy::Scoped).unwrap_err();
        assert!(matches!(err, StatsError::Parse(_)), "{err}");
    }

    #[test]
    fn missing_field_is_schema_error() {
        let input = r#"[{"endTime": "2024-01-01 00:00", "artistName": "A", "msPlayed": 10}]"#;
        let err = load_history(input.as_bytes(), DedupPolicy::Scoped).unwrap_err();
        match err {
            StatsError::Schema(msg) => assert!(msg.contains("record 0"), "{msg}"),
            other => panic!("unexpected error {other}")
        }
    }

    #[test]
    fn non_array_is_schema_error() {
        let err = load_history(&b"{\"endTime\": 1}"[..], DedupPolicy::Scoped).unwrap_err();
        assert!(matches!(err, StatsError::Schema(_)), "{err}");
    }

    #[test]
    fn bad_timestamp_is_parse_error() {
        let input = to_json(&[record("yesterday", "A", "a", 10)]);
        let err = load_history(input.as_bytes(), DedupPolicy::Scoped).unwrap_err();
        assert!(matches!(err, StatsError::Parse(_)), "{err}");
    }

    #[test]
    fn extra_fields_are_ignored() {
        let input = r#"[{"endTime": "2024-01-01 00:00", "artistName": "A",
                         "trackName": "a", "msPlayed": 10, "platform": "ios"}]"#;
        let history = load_history(input.as_bytes(), DedupPolicy::Scoped).unwrap();
        assert_eq!(history.plays().len(), 1);
    }

    #[test]
    fn files_are_cleaned_as_one_table() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("StreamingHistory_music_0.json");
        let second = dir.path().join("StreamingHistory_music_1.json");

        File::create(&first).unwrap().write_all(to_json(&[
            record("2024-01-05 21:14", "A", "a", 1000),
            record("2024-01-05 22:00", "B", "b", 2000),
        ]).as_bytes()).unwrap();
        File::create(&second).unwrap().write_all(to_json(&[
            record("2024-01-05 21:14", "A", "a", 4000),
        ]).as_bytes()).unwrap();

        let history = load_history_files(&[first.clone(), second], DedupPolicy::Scoped)
            .unwrap();
        let played: Vec<_> = history.plays().iter().map(|p| p.ms_played).collect();
        assert_eq!(played, vec![2000, 4000]);

        let single = load_history_file(&first, DedupPolicy::Scoped).unwrap();
        assert_eq!(single.plays().len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_history_file(dir.path().join("nope.json"), DedupPolicy::Scoped)
            .unwrap_err();
        assert!(matches!(err, StatsError::Io(_)), "{err}");
    }

    #[test]
    fn dedup_policy_names_round_trip() {
        for policy in DedupPolicy::value_variants() {
            let name = policy.to_possible_value().unwrap();
            assert_eq!(DedupPolicy::from_str(name.get_name(), false).as_ref(), Ok(policy));
        }
        assert_eq!(
            DedupPolicy::GlobalMinimum.to_possible_value().unwrap().get_name(),
            "global-minimum"
        );
        assert!(DedupPolicy::from_str("keep-all", false).is_err());
    }
}
