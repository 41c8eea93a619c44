use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rand::random;

use crate::enumerator::InterfaceChoice;

/// Local timestamp plus a random suffix, e.g. `20241016-142301-3fa9c1`.
pub fn unique_id() -> String {
    format!("{}-{:06x}", Local::now().format("%Y%m%d-%H%M%S"), random::<u32>() & 0x00ff_ffff)
}

/// One orchestration run. Never persisted; its snapshot path is unique so
/// overlapping scans cannot clobber each other.
#[derive(Debug, Clone)]
pub struct ScanSession {
    id: String,
    interface: InterfaceChoice,
    snapshot_path: PathBuf,
    started_at: DateTime<Local>,
    finished_at: Option<DateTime<Local>>,
}

impl ScanSession {
    pub fn new(interface: InterfaceChoice, snapshot_dir: &Path) -> Self {
        let id = unique_id();
        let snapshot_path = snapshot_dir.join(format!("snapshot-{}.json", id));
        Self {
            id,
            interface,
            snapshot_path,
            started_at: Local::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn interface(&self) -> &InterfaceChoice {
        &self.interface
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_get_distinct_snapshot_paths() {
        let dir = Path::new("/tmp/hostscan");
        let a = ScanSession::new(InterfaceChoice::AllInterfaces, dir);
        let b = ScanSession::new(InterfaceChoice::AllInterfaces, dir);
        assert_ne!(a.id(), b.id());
        assert_ne!(a.snapshot_path(), b.snapshot_path());
        assert_eq!(a.snapshot_path().parent(), Some(dir));
        let file = a.snapshot_path().file_name().unwrap().to_string_lossy().to_string();
        assert!(file.starts_with("snapshot-") && file.ends_with(".json"), "{}", file);
    }

    #[test]
    fn finish_stamps_the_end_time() {
        let mut session = ScanSession::new(InterfaceChoice::AllInterfaces, Path::new("."));
        assert!(session.finished_at().is_none());
        assert!(session.elapsed().is_none());
        session.finish();
        assert!(session.finished_at().unwrap() >= session.started_at());
        assert!(session.elapsed().unwrap() >= chrono::Duration::zero());
    }
}
