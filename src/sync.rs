//! Workspace sync coordination
//!
//! Translates a catalog index into a backend materialize call and remembers
//! which revision the workspace currently holds.

use thiserror::Error;

use crate::catalog::Catalog;
use crate::engine::BisectError;
use crate::p4::{Backend, ProgressSink};

/// Failures a sync request can report
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    State(#[from] BisectError),
    #[error("record has no revision identifier: {0}")]
    NoIdentifier(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Issues materialize requests and tracks the synced revision
#[derive(Debug, Default)]
pub struct SyncCoordinator {
    synced: Option<usize>,
}

impl SyncCoordinator {
    pub fn new() -> SyncCoordinator {
        SyncCoordinator { synced: None }
    }

    /// Index of the revision currently materialized in the workspace, if any
    pub fn synced_index(&self) -> Option<usize> {
        self.synced
    }

    /// Forget the synced index after a catalog rebuild invalidates it
    pub fn reset(&mut self) {
        self.synced = None;
    }

    /// Materialize one revision into the workspace.
    ///
    /// The revision identifier is the second whitespace token of the record,
    /// which is where both label and changelist records carry it. Progress
    /// lines go to `sink` as the backend produces them; the synced index is
    /// updated only when the backend call succeeds.
    pub fn sync_revision(
        &mut self,
        backend: &dyn Backend,
        catalog: &Catalog,
        path: &str,
        index: usize,
        sink: &mut dyn ProgressSink,
    ) -> Result<(), SyncError> {
        if catalog.is_empty() {
            return Err(BisectError::EmptyRange.into());
        }
        let record = catalog.record(index).ok_or(BisectError::OutOfRange {
            index,
            count: catalog.count(),
        })?;
        let identifier = record
            .descriptor
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| SyncError::NoIdentifier(record.descriptor.clone()))?;

        backend.materialize(path, identifier, sink)?;
        self.synced = Some(index);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, UndatedPolicy};
    use crate::p4::RangeQuery;
    use anyhow::bail;
    use std::cell::RefCell;

    struct ScriptedBackend {
        progress: Vec<&'static str>,
        fail: bool,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl ScriptedBackend {
        fn new(progress: Vec<&'static str>) -> ScriptedBackend {
            ScriptedBackend {
                progress,
                fail: false,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Backend for ScriptedBackend {
        fn list_revisions(
            &self,
            _query: &RangeQuery,
            _on_record: &mut dyn FnMut(&str),
        ) -> anyhow::Result<()> {
            Ok(())
        }

        fn materialize(
            &self,
            path: &str,
            identifier: &str,
            sink: &mut dyn ProgressSink,
        ) -> anyhow::Result<()> {
            self.calls
                .borrow_mut()
                .push((path.to_string(), identifier.to_string()));
            for line in &self.progress {
                sink.report(line);
            }
            if self.fail {
                bail!("p4 sync failed: connection dropped");
            }
            Ok(())
        }
    }

    fn catalog_from(lines: &[&str]) -> Catalog {
        let mut builder = CatalogBuilder::new(UndatedPolicy::Last);
        for line in lines {
            builder.ingest(line);
        }
        builder.finish()
    }

    #[test]
    fn test_sync_extracts_label_identifier() {
        let backend = ScriptedBackend::new(vec![]);
        let catalog = catalog_from(&["Label rel-1.0 2024/01/02 'Created by build.'"]);
        let mut coordinator = SyncCoordinator::new();
        let mut sink = |_line: &str| {};

        coordinator
            .sync_revision(&backend, &catalog, "//depot/proj/...", 0, &mut sink)
            .unwrap();

        assert_eq!(
            *backend.calls.borrow(),
            vec![("//depot/proj/...".to_string(), "rel-1.0".to_string())]
        );
    }

    #[test]
    fn test_sync_extracts_changelist_identifier() {
        let backend = ScriptedBackend::new(vec![]);
        let catalog =
            catalog_from(&["Change 90123 on 2023/11/30 by alice@ws 'Fix the frobnicator.'"]);
        let mut coordinator = SyncCoordinator::new();
        let mut sink = |_line: &str| {};

        coordinator
            .sync_revision(&backend, &catalog, "//depot/proj/...", 0, &mut sink)
            .unwrap();

        assert_eq!(
            *backend.calls.borrow(),
            vec![("//depot/proj/...".to_string(), "90123".to_string())]
        );
    }

    #[test]
    fn test_sync_streams_progress_and_records_index() {
        let backend = ScriptedBackend::new(vec![
            "//depot/proj/a#3 - updating /ws/a",
            "//depot/proj/b#7 - updating /ws/b",
        ]);
        let catalog = catalog_from(&[
            "Label rel-1.0 2024/01/02 'Created by build.'",
            "Label rel-1.1 2024/02/02 'Created by build.'",
        ]);
        let mut coordinator = SyncCoordinator::new();
        let mut lines: Vec<String> = Vec::new();
        let mut sink = |line: &str| lines.push(line.to_string());

        coordinator
            .sync_revision(&backend, &catalog, "//depot/proj/...", 1, &mut sink)
            .unwrap();

        assert_eq!(
            lines,
            vec![
                "//depot/proj/a#3 - updating /ws/a",
                "//depot/proj/b#7 - updating /ws/b"
            ]
        );
        assert_eq!(coordinator.synced_index(), Some(1));
    }

    #[test]
    fn test_sync_rejects_bad_indices() {
        let backend = ScriptedBackend::new(vec![]);
        let mut coordinator = SyncCoordinator::new();
        let mut sink = |_line: &str| {};

        let empty = catalog_from(&[]);
        let err = coordinator
            .sync_revision(&backend, &empty, "//depot/proj/...", 0, &mut sink)
            .unwrap_err();
        assert!(matches!(err, SyncError::State(BisectError::EmptyRange)));

        let catalog = catalog_from(&["Label rel-1.0 2024/01/02 'Created by build.'"]);
        let err = coordinator
            .sync_revision(&backend, &catalog, "//depot/proj/...", 5, &mut sink)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::State(BisectError::OutOfRange { index: 5, count: 1 })
        ));

        assert!(backend.calls.borrow().is_empty());
        assert_eq!(coordinator.synced_index(), None);
    }

    #[test]
    fn test_sync_requires_identifier_token() {
        let backend = ScriptedBackend::new(vec![]);
        let catalog = catalog_from(&["Label"]);
        let mut coordinator = SyncCoordinator::new();
        let mut sink = |_line: &str| {};

        let err = coordinator
            .sync_revision(&backend, &catalog, "//depot/proj/...", 0, &mut sink)
            .unwrap_err();
        assert!(matches!(err, SyncError::NoIdentifier(_)));
        assert_eq!(coordinator.synced_index(), None);
    }

    #[test]
    fn test_sync_backend_failure_keeps_previous_index() {
        let catalog = catalog_from(&[
            "Label rel-1.0 2024/01/02 'Created by build.'",
            "Label rel-1.1 2024/02/02 'Created by build.'",
        ]);
        let ok_backend = ScriptedBackend::new(vec![]);
        let mut coordinator = SyncCoordinator::new();
        let mut sink = |_line: &str| {};
        coordinator
            .sync_revision(&ok_backend, &catalog, "//depot/proj/...", 0, &mut sink)
            .unwrap();
        assert_eq!(coordinator.synced_index(), Some(0));

        let mut failing = ScriptedBackend::new(vec!["partial line"]);
        failing.fail = true;
        let mut lines: Vec<String> = Vec::new();
        let mut sink = |line: &str| lines.push(line.to_string());
        let err = coordinator
            .sync_revision(&failing, &catalog, "//depot/proj/...", 1, &mut sink)
            .unwrap_err();

        assert!(matches!(err, SyncError::Backend(_)));
        // Progress emitted before the failure still reached the sink
        assert_eq!(lines, vec!["partial line"]);
        assert_eq!(coordinator.synced_index(), Some(0));
    }

    #[test]
    fn test_reset_clears_synced_index() {
        let backend = ScriptedBackend::new(vec![]);
        let catalog = catalog_from(&["Label rel-1.0 2024/01/02 'Created by build.'"]);
        let mut coordinator = SyncCoordinator::new();
        let mut sink = |_line: &str| {};

        coordinator
            .sync_revision(&backend, &catalog, "//depot/proj/...", 0, &mut sink)
            .unwrap();
        assert_eq!(coordinator.synced_index(), Some(0));

        coordinator.reset();
        assert_eq!(coordinator.synced_index(), None);
    }
}
