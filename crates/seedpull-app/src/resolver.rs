//! Download-unit resolution: turn completed torrent listings into the
//! top-level files and folders that are fetched one by one.
//!
//! # Design
//! - A file path with a single component is a root file and becomes its own
//!   unit; longer paths contribute their first component as a folder unit.
//! - Units are ordered by completion time with a stable sort over a
//!   deterministic base order (ids ascending, root files in listing order,
//!   folders lexically).

use std::collections::{BTreeMap, BTreeSet};

use seedpull_fsops::DownloadUnit;
use seedpull_state::WatchRecord;
use seedpull_torrent_core::CompletedTorrent;
use tracing::{debug, warn};

/// Build the download units for every completed torrent that is still watched.
#[must_use]
pub fn resolve_units(
    watching: &BTreeMap<String, WatchRecord>,
    completed: &BTreeMap<String, CompletedTorrent>,
) -> Vec<DownloadUnit> {
    let mut units = Vec::new();
    for (torrent_id, torrent) in completed {
        let Some(record) = watching.get(torrent_id) else {
            warn!(torrent_id = %torrent_id, "completed torrent is not watched; ignoring");
            continue;
        };
        let before = units.len();
        units.extend(units_for_torrent(torrent_id, torrent, record));
        debug!(
            torrent_id = %torrent_id,
            units = units.len() - before,
            "resolved download units"
        );
    }
    units.sort_by_key(|unit| unit.completed_time);
    units
}

fn units_for_torrent(
    torrent_id: &str,
    torrent: &CompletedTorrent,
    record: &WatchRecord,
) -> Vec<DownloadUnit> {
    let unit = |component: &str, is_directory: bool| DownloadUnit {
        torrent_id: torrent_id.to_string(),
        remote_path: join_remote(&torrent.base_dir, component),
        completed_time: torrent.completed_time,
        is_directory,
        temp_dir: record.temp_dir.clone(),
        final_dir: record.final_dir.clone(),
        auto_extract: record.auto_extract,
        auto_delete_extracted: record.auto_delete_extracted,
    };

    let mut units = Vec::new();
    let mut folders = BTreeSet::new();
    for file in &torrent.files {
        let mut components = file
            .split('/')
            .filter(|component| !component.is_empty() && *component != ".");
        let Some(first) = components.next() else {
            continue;
        };
        if components.next().is_some() {
            folders.insert(first);
        } else {
            units.push(unit(first, false));
        }
    }
    units.extend(folders.into_iter().map(|folder| unit(folder, true)));
    units
}

fn join_remote(base_dir: &str, component: &str) -> String {
    let base = base_dir.trim_end_matches('/');
    format!("{base}/{component}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::path::PathBuf;

    fn record() -> WatchRecord {
        WatchRecord {
            temp_dir: PathBuf::from("/tmp/incoming"),
            final_dir: PathBuf::from("/library"),
            name: "show.torrent".into(),
            auto_extract: true,
            auto_delete_extracted: false,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    fn completed(secs: i64, files: &[&str]) -> CompletedTorrent {
        CompletedTorrent {
            base_dir: "/downloads/complete".into(),
            completed_time: at(secs),
            files: files.iter().map(|file| (*file).to_string()).collect(),
        }
    }

    fn paths(units: &[DownloadUnit]) -> Vec<(&str, bool)> {
        units
            .iter()
            .map(|unit| (unit.remote_path.as_str(), unit.is_directory))
            .collect()
    }

    #[test]
    fn root_files_become_file_units() {
        let watching = BTreeMap::from([("aaa".to_string(), record())]);
        let done = BTreeMap::from([("aaa".to_string(), completed(10, &["a.txt", "b.txt"]))]);

        let units = resolve_units(&watching, &done);
        assert_eq!(
            paths(&units),
            vec![
                ("/downloads/complete/a.txt", false),
                ("/downloads/complete/b.txt", false),
            ]
        );
        assert!(units.iter().all(|unit| unit.auto_extract));
        assert!(units.iter().all(|unit| unit.temp_dir == PathBuf::from("/tmp/incoming")));
    }

    #[test]
    fn single_folder_becomes_one_directory_unit() {
        let watching = BTreeMap::from([("aaa".to_string(), record())]);
        let done = BTreeMap::from([(
            "aaa".to_string(),
            completed(10, &["Show/e01.mkv", "Show/e02.mkv", "Show/Subs/en.srt"]),
        )]);

        let units = resolve_units(&watching, &done);
        assert_eq!(paths(&units), vec![("/downloads/complete/Show", true)]);
    }

    #[test]
    fn mixed_layout_yields_root_files_then_folders() {
        let watching = BTreeMap::from([("aaa".to_string(), record())]);
        let done = BTreeMap::from([(
            "aaa".to_string(),
            completed(
                10,
                &["sub/x.txt", "a.txt", "sub/y.txt", "./b.txt", "sub/z/w.txt"],
            ),
        )]);

        let units = resolve_units(&watching, &done);
        assert_eq!(
            paths(&units),
            vec![
                ("/downloads/complete/a.txt", false),
                ("/downloads/complete/b.txt", false),
                ("/downloads/complete/sub", true),
            ]
        );
    }

    #[test]
    fn units_are_ordered_by_completion_time() {
        let watching = BTreeMap::from([
            ("aaa".to_string(), record()),
            ("bbb".to_string(), record()),
            ("ccc".to_string(), record()),
        ]);
        let done = BTreeMap::from([
            ("aaa".to_string(), completed(30, &["late.txt"])),
            ("bbb".to_string(), completed(10, &["early-1.txt", "early-2.txt"])),
            ("ccc".to_string(), completed(10, &["tie.txt"])),
        ]);

        let units = resolve_units(&watching, &done);
        let order: Vec<_> = units
            .iter()
            .map(|unit| unit.remote_path.rsplit('/').next().unwrap_or_default())
            .collect();
        assert_eq!(order, vec!["early-1.txt", "early-2.txt", "tie.txt", "late.txt"]);
        assert!(units.windows(2).all(|pair| pair[0].completed_time <= pair[1].completed_time));
    }

    #[test]
    fn unwatched_and_empty_torrents_yield_nothing() {
        let watching = BTreeMap::from([("aaa".to_string(), record())]);
        let done = BTreeMap::from([
            ("aaa".to_string(), completed(10, &[])),
            ("zzz".to_string(), completed(10, &["stray.txt"])),
        ]);
        assert!(resolve_units(&watching, &done).is_empty());
    }

    #[test]
    fn trailing_slash_in_base_dir_is_not_doubled() {
        let watching = BTreeMap::from([("aaa".to_string(), record())]);
        let mut torrent = completed(10, &["a.txt"]);
        torrent.base_dir = "/downloads/".into();
        let done = BTreeMap::from([("aaa".to_string(), torrent)]);
        assert_eq!(
            resolve_units(&watching, &done)[0].remote_path,
            "/downloads/a.txt"
        );
    }
}
