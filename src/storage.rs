//! Local persistence of result snapshots.

use crate::model::ResultSnapshot;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directory holding auto-saved runs: `<data dir>/heal-cli/runs`.
pub fn runs_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .context("cannot determine a data directory")?;
    Ok(base.join("heal-cli").join("runs"))
}

pub fn save_run(snap: &ResultSnapshot) -> Result<PathBuf> {
    save_run_in(&runs_dir()?, snap)
}

pub(crate) fn save_run_in(dir: &Path, snap: &ResultSnapshot) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let stamp = time::OffsetDateTime::now_utc()
        .format(time::macros::format_description!(
            "[year][month][day]T[hour][minute][second][subsecond digits:3]Z"
        ))
        .unwrap_or_else(|_| "now".into());
    let stem = format!("{stamp}-{}", file_safe(&snap.run_id));
    let mut path = dir.join(format!("{stem}.json"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}-{n}.json"));
        n += 1;
    }
    export_json(&path, snap)?;
    Ok(path)
}

pub fn export_json(path: &Path, snap: &ResultSnapshot) -> Result<()> {
    let body = serde_json::to_string_pretty(snap).context("serialize results")?;
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))
}

/// Newest saved snapshots first, at most `limit`.
pub fn load_recent(limit: usize) -> Result<Vec<ResultSnapshot>> {
    load_recent_in(&runs_dir()?, limit)
}

pub(crate) fn load_recent_in(dir: &Path, limit: usize) -> Result<Vec<ResultSnapshot>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    // File names start with a UTC timestamp, so name order is time order.
    paths.sort();
    paths.reverse();

    let mut out = Vec::new();
    for p in paths.into_iter().take(limit) {
        let Ok(raw) = std::fs::read_to_string(&p) else {
            continue;
        };
        if let Ok(snap) = serde_json::from_str::<ResultSnapshot>(&raw) {
            out.push(snap);
        }
    }
    Ok(out)
}

fn file_safe(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "run".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RunStatus;
    use crate::orchestrator::testing::snapshot;

    #[test]
    fn save_then_load_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = snapshot(RunStatus::Failed);
        first.run_id = "aaa".into();
        let mut second = snapshot(RunStatus::Success);
        second.run_id = "bbb".into();

        // Same-second saves sort by run id; write explicit names to pin order.
        export_json(&dir.path().join("20260101T000000Z-aaa.json"), &first).unwrap();
        export_json(&dir.path().join("20260102T000000Z-bbb.json"), &second).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = load_recent_in(dir.path(), 10).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].run_id, "bbb");
        assert_eq!(load_recent_in(dir.path(), 1).unwrap().len(), 1);
    }

    #[test]
    fn save_run_in_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("runs");
        let path = save_run_in(&nested, &snapshot(RunStatus::Success)).unwrap();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("-run-1.json"));
    }

    #[test]
    fn repeated_saves_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshot(RunStatus::Success);
        let paths: Vec<_> = (0..3).map(|_| save_run_in(dir.path(), &snap).unwrap()).collect();
        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_ne!(paths[0], paths[2]);
        assert_eq!(load_recent_in(dir.path(), 10).unwrap().len(), 3);
    }

    #[test]
    fn missing_dir_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_recent_in(&dir.path().join("nope"), 5).unwrap().is_empty());
    }
}
