//! Filesystem watcher feeding the reload coordinator.

use std::path::{Component, Path};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::debounce::ReloadSender;
use super::event::ResourceChange;

/// Resource kind reported for files under the site root.
const FILE_KIND: &str = "file";

/// Watches a directory and submits a [`ResourceChange`] per matching path.
///
/// Watching stops when the value is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching `root` recursively.
    ///
    /// Only paths whose root-relative form matches one of `patterns` are
    /// submitted. Invalid patterns are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be resolved or watched.
    pub fn start(
        root: &Path,
        patterns: &[String],
        sender: ReloadSender,
    ) -> Result<Self, notify::Error> {
        // Events report canonical paths on some platforms
        let root = root.canonicalize().map_err(notify::Error::io)?;
        let patterns = compile_patterns(patterns);

        let event_root = root.clone();
        // The callback runs on notify's thread; `submit` never blocks it
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    for change in changes_for_event(&event, &event_root, &patterns) {
                        tracing::debug!(uid = change.uid(), kind = ?event.kind, "Recorded filesystem event");
                        sender.submit(change);
                    }
                }
                Err(err) => tracing::warn!(error = %err, "File watcher error"),
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::info!(root = %root.display(), "Watching for changes");

        Ok(Self { _watcher: watcher })
    }
}

/// Compile glob patterns, logging and skipping invalid ones.
fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                tracing::warn!(pattern = %p, error = %err, "Ignoring invalid watch pattern");
                None
            }
        })
        .collect()
}

/// Map a raw notify event to resource changes.
fn changes_for_event(event: &Event, root: &Path, patterns: &[glob::Pattern]) -> Vec<ResourceChange> {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter_map(|path| resource_change(path, root, patterns))
        .collect()
}

/// Resource change for `path`, if it lies under `root` and matches a pattern.
///
/// The uid is the root-relative path with `/` separators.
fn resource_change(path: &Path, root: &Path, patterns: &[glob::Pattern]) -> Option<ResourceChange> {
    let relative = path.strip_prefix(root).ok()?;
    let uid = relative_uid(relative)?;

    if !patterns.iter().any(|pattern| pattern.matches(&uid)) {
        return None;
    }

    let name = relative.file_name()?.to_string_lossy().into_owned();
    Some(ResourceChange::new(name, uid, FILE_KIND))
}

fn relative_uid(relative: &Path) -> Option<String> {
    let segments: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect();

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use pretty_assertions::assert_eq;

    fn patterns(raw: &[&str]) -> Vec<glob::Pattern> {
        raw.iter().map(|p| glob::Pattern::new(p).unwrap()).collect()
    }

    #[test]
    fn test_resource_change_for_nested_file() {
        let change = resource_change(
            Path::new("/site/dashboards/overview.json"),
            Path::new("/site"),
            &patterns(&["**/*"]),
        )
        .unwrap();

        assert_eq!(change.name(), "overview.json");
        assert_eq!(change.uid(), "dashboards/overview.json");
        assert_eq!(change.kind(), "file");
    }

    #[test]
    fn test_resource_change_respects_patterns() {
        let html_only = patterns(&["**/*.html"]);

        assert!(resource_change(Path::new("/site/index.html"), Path::new("/site"), &html_only).is_some());
        assert!(resource_change(Path::new("/site/a/b.html"), Path::new("/site"), &html_only).is_some());
        assert!(resource_change(Path::new("/site/style.css"), Path::new("/site"), &html_only).is_none());
    }

    #[test]
    fn test_resource_change_outside_root() {
        let result = resource_change(
            Path::new("/other/index.html"),
            Path::new("/site"),
            &patterns(&["**/*"]),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_resource_change_for_root_itself() {
        let result = resource_change(Path::new("/site"), Path::new("/site"), &patterns(&["**/*"]));
        assert!(result.is_none());
    }

    #[test]
    fn test_changes_for_event_kinds() {
        let root = Path::new("/site");
        let all = patterns(&["**/*"]);
        let path = PathBuf::from("/site/index.html");

        for kind in [
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Any),
            EventKind::Remove(RemoveKind::File),
        ] {
            let event = Event::new(kind).add_path(path.clone());
            assert_eq!(changes_for_event(&event, root, &all).len(), 1);
        }

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(path);
        assert!(changes_for_event(&access, root, &all).is_empty());
    }

    #[test]
    fn test_changes_for_event_multiple_paths() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/a.html"))
            .add_path(PathBuf::from("/site/b.css"))
            .add_path(PathBuf::from("/site/c.html"));

        let changes = changes_for_event(&event, Path::new("/site"), &patterns(&["**/*.html"]));
        let uids: Vec<_> = changes.iter().map(ResourceChange::uid).collect();

        assert_eq!(uids, vec!["a.html", "c.html"]);
    }

    #[test]
    fn test_compile_patterns_skips_invalid() {
        let raw = vec!["[".to_owned(), "**/*.html".to_owned(), "a[".to_owned()];

        let compiled = compile_patterns(&raw);

        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].as_str(), "**/*.html");
    }

    #[test]
    fn test_start_with_invalid_pattern() {
        let dir = tempfile::TempDir::new().unwrap();
        let (hub, _requests) = crate::live_reload::hub::HubHandle::detached();
        let (_debouncer, sender) = crate::live_reload::debounce::Debouncer::new(hub);

        let result = FileWatcher::start(dir.path(), &["[".to_owned()], sender);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_start_fails_for_missing_root() {
        let (hub, _requests) = crate::live_reload::hub::HubHandle::detached();
        let (_debouncer, sender) = crate::live_reload::debounce::Debouncer::new(hub);

        let result = FileWatcher::start(Path::new("/nonexistent/site/root"), &[], sender);
        assert!(result.is_err());
    }
}
