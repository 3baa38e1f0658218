//! Conflict report written into the local store.

use crate::content::FileContent;
use crate::error::SyncError;
use crate::store::{parent_dir, LocalStore};
use crate::types::RepoPath;
use tracing::info;

const REPORT_HEADER: &str =
    "## Conflicts\n\nPlease resolve the following files manually before syncing again:\n\n";

/// Render conflicted paths as a markdown checklist, one `- [ ] <path>` per line.
pub fn render_conflict_report(conflicts: &[RepoPath]) -> String {
    let items: Vec<String> = conflicts.iter().map(|path| format!("- [ ] {}", path)).collect();
    format!("{}{}", REPORT_HEADER, items.join("\n"))
}

/// Writes the conflict checklist to a fixed path, replacing any earlier report.
pub struct ConflictReporter<'a> {
    store: &'a dyn LocalStore,
    report_path: &'a str,
}

impl<'a> ConflictReporter<'a> {
    pub fn new(store: &'a dyn LocalStore, report_path: &'a str) -> Self {
        Self { store, report_path }
    }

    pub async fn report(&self, conflicts: &[RepoPath]) -> Result<(), SyncError> {
        if let Some(parent) = parent_dir(self.report_path) {
            self.store.create_dir_all(parent).await?;
        }
        let report = FileContent::Text(render_conflict_report(conflicts));
        self.store.write(self.report_path, &report).await?;
        info!(
            conflicts = conflicts.len(),
            report = self.report_path,
            "Wrote conflict report"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsLocalStore;
    use tempfile::TempDir;

    #[test]
    fn test_render_format() {
        let report = render_conflict_report(&["a.md".to_string(), "dir/b.md".to_string()]);
        assert_eq!(
            report,
            "## Conflicts\n\nPlease resolve the following files manually before syncing again:\n\n- [ ] a.md\n- [ ] dir/b.md"
        );
    }

    #[tokio::test]
    async fn test_report_overwrites_previous() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("CONFLICTS.md"), "stale").unwrap();
        let store = FsLocalStore::new(temp.path());

        ConflictReporter::new(&store, "CONFLICTS.md")
            .report(&["x.md".to_string()])
            .await
            .unwrap();

        let written = std::fs::read_to_string(temp.path().join("CONFLICTS.md")).unwrap();
        assert!(written.ends_with("- [ ] x.md"));
        assert!(!written.contains("stale"));
    }

    #[tokio::test]
    async fn test_report_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let store = FsLocalStore::new(temp.path());

        ConflictReporter::new(&store, "sync/CONFLICTS.md")
            .report(&["x.md".to_string()])
            .await
            .unwrap();
        assert!(temp.path().join("sync/CONFLICTS.md").exists());
    }
}
