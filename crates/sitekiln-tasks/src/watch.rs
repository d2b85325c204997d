//! Glob-bound change handlers and the filesystem watch loop.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use globset::GlobSet;
use notify::{
    EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use sitekiln_core::to_slash;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::{
    error::Result,
    files::{glob_set, split_base},
    task::Task,
};

struct Binding {
    globs: Vec<String>,
    matcher: GlobSet,
    handler: Task,
}

/// A set of `glob -> task` bindings fed by filesystem events.
#[derive(Default)]
pub struct WatchHub {
    bindings: Vec<Binding>,
}

impl WatchHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` whenever a file matching `glob` changes.
    pub fn on_change(&mut self, glob: &str, handler: Task) -> Result<&mut Self> {
        self.on_change_any(&[glob], handler)
    }

    /// Run `handler` once per batch in which any of `globs` matched.
    pub fn on_change_any<S: AsRef<str>>(&mut self, globs: &[S], handler: Task) -> Result<&mut Self> {
        self.bindings.push(Binding {
            globs: globs.iter().map(|g| g.as_ref().to_string()).collect(),
            matcher: glob_set(globs)?,
            handler,
        });
        Ok(self)
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no bindings are registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Start the handler of every binding matched by `paths`.
    ///
    /// Each binding fires at most once per call, on its own tokio task.
    /// Failures are logged.
    pub fn dispatch(&self, paths: &[PathBuf]) -> Vec<JoinHandle<()>> {
        let paths: Vec<String> = paths.iter().map(|p| to_slash(p)).collect();

        self.bindings
            .iter()
            .filter(|binding| paths.iter().any(|p| binding.matcher.is_match(p)))
            .map(|binding| {
                debug!(globs = ?binding.globs, task = binding.handler.name(), "change matched");
                let handler = binding.handler.clone();
                tokio::spawn(async move {
                    if let Err(err) = handler.run().await {
                        warn!(task = handler.name(), error = %err, "watch-triggered run failed");
                    }
                })
            })
            .collect()
    }

    /// Directories to watch: the nearest existing ancestor of each
    /// glob's wildcard-free prefix, with nested directories folded into
    /// their parents.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .bindings
            .iter()
            .flat_map(|binding| binding.globs.iter())
            .filter_map(|glob| existing_ancestor(&split_base(glob).0))
            .collect();
        roots.sort();
        roots.dedup();

        let mut folded: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !folded.iter().any(|parent| root.starts_with(parent)) {
                folded.push(root);
            }
        }
        folded
    }

    /// Watch the filesystem and dispatch change batches until the event
    /// source closes.
    ///
    /// Events arriving within `delay` of the first one form one batch.
    /// Returns at once when no bindings are registered.
    pub async fn run(self, delay: Duration) -> Result<()> {
        if self.is_empty() {
            debug!("no watch bindings");
            return Ok(());
        }

        let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(256);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) if is_change(&event.kind) => {
                    let _ = tx.blocking_send(event.paths);
                }
                Ok(event) => trace!(kind = ?event.kind, "ignored event"),
                Err(err) => warn!(error = %err, "watch error"),
            },
            notify::Config::default(),
        )?;

        for root in self.watch_roots() {
            watcher.watch(&root, RecursiveMode::Recursive)?;
            info!(dir = %root.display(), "watching");
        }

        while let Some(first) = rx.recv().await {
            let batch = collect_batch(&mut rx, first, delay).await;
            trace!(paths = batch.len(), "change batch");
            self.dispatch(&batch);
        }

        drop(watcher);
        Ok(())
    }
}

/// Gather events arriving within `delay` after `first`.
async fn collect_batch(
    rx: &mut mpsc::Receiver<Vec<PathBuf>>,
    first: Vec<PathBuf>,
    delay: Duration,
) -> Vec<PathBuf> {
    let mut batch = first;
    let deadline = tokio::time::sleep(delay);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            more = rx.recv() => match more {
                Some(paths) => batch.extend(paths),
                None => break,
            },
        }
    }

    batch.sort();
    batch.dedup();
    batch
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(
                ModifyKind::Data(_)
                    | ModifyKind::Any
                    | ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any)
            )
    )
}

fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors().find(|p| p.is_dir()).map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn counting(name: &'static str) -> (Task, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = Task::new(name, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (task, count)
    }

    async fn settle(handles: Vec<JoinHandle<()>>) -> usize {
        let fired = handles.len();
        for handle in handles {
            handle.await.expect("handler task");
        }
        fired
    }

    #[tokio::test]
    async fn test_dispatch_fires_each_binding_once_per_batch() {
        let (views, views_count) = counting("views");
        let (styles, styles_count) = counting("styles");
        let mut hub = WatchHub::new();
        hub.on_change("/site/src/views/**/*.pug", views)
            .expect("valid glob")
            .on_change("/site/src/scss/**/*.scss", styles)
            .expect("valid glob");

        let fired = settle(hub.dispatch(&[
            PathBuf::from("/site/src/views/partials/nav.pug"),
            PathBuf::from("/site/src/views/index.pug"),
        ]))
        .await;

        assert_eq!(fired, 1);
        assert_eq!(views_count.load(Ordering::SeqCst), 1);
        assert_eq!(styles_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_ignores_unmatched_paths() {
        let (views, views_count) = counting("views");
        let mut hub = WatchHub::new();
        hub.on_change("/site/src/views/**/*.pug", views).expect("valid glob");

        let fired = settle(hub.dispatch(&[
            PathBuf::from("/site/README.md"),
            PathBuf::from("/site/src/views/notes.txt"),
        ]))
        .await;

        assert_eq!(fired, 0);
        assert_eq!(views_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_multi_glob_binding_fires_once() {
        let (reload, reload_count) = counting("reload");
        let mut hub = WatchHub::new();
        hub.on_change_any(&["/site/dist/*.html", "/site/dist/css/*.css"], reload)
            .expect("valid globs");

        let fired = settle(hub.dispatch(&[
            PathBuf::from("/site/dist/index.html"),
            PathBuf::from("/site/dist/css/styles.min.css"),
        ]))
        .await;

        assert_eq!(fired, 1);
        assert_eq!(reload_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_handler_is_contained() {
        let mut hub = WatchHub::new();
        hub.on_change(
            "/site/dist/*.html",
            Task::new("broken", || async {
                Err(crate::error::TaskError::io("x", std::io::Error::other("boom")))
            }),
        )
        .expect("valid glob");

        let fired = settle(hub.dispatch(&[PathBuf::from("/site/dist/index.html")])).await;
        assert_eq!(fired, 1);
    }

    #[tokio::test]
    async fn test_collect_batch_merges_within_window() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(vec![PathBuf::from("/a")]).await.expect("send");
        tx.send(vec![PathBuf::from("/b"), PathBuf::from("/a")]).await.expect("send");

        let batch = collect_batch(&mut rx, vec![PathBuf::from("/c")], Duration::from_millis(50)).await;
        assert_eq!(
            batch,
            vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]
        );
    }

    #[test]
    fn test_watch_roots_folds_nested() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("src/views")).expect("create views");
        std::fs::create_dir_all(dir.path().join("dist")).expect("create dist");
        let root = to_slash(dir.path());

        let noop = || Task::new("noop", || async { Ok(()) });
        let mut hub = WatchHub::new();
        hub.on_change(&format!("{root}/src/views/**/*.pug"), noop())
            .expect("valid glob")
            .on_change(&format!("{root}/src/scss/**/*.scss"), noop())
            .expect("valid glob")
            .on_change(&format!("{root}/dist/img/*"), noop())
            .expect("valid glob");

        assert_eq!(
            hub.watch_roots(),
            vec![dir.path().join("dist"), dir.path().join("src")]
        );
    }

    #[tokio::test]
    async fn test_empty_hub_returns_immediately() {
        let run = WatchHub::new().run(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("returns without events")
            .expect("no error");
    }

    async fn wait_for(count: &AtomicUsize, expected: usize) -> usize {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < expected && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        count.load(Ordering::SeqCst)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_filesystem_changes_trigger_matching_binding() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let base = dir.path().canonicalize().expect("canonical temp dir");
        let partials = base.join("src/views/partials");
        std::fs::create_dir_all(&partials).expect("create partials");
        std::fs::write(partials.join("nav.pug"), "nav\n").expect("write partial");
        let root = to_slash(&base);

        let (views, views_count) = counting("views");
        let mut hub = WatchHub::new();
        hub.on_change(&format!("{root}/src/views/**/*.pug"), views)
            .expect("valid glob");
        let watcher = tokio::spawn(hub.run(Duration::from_millis(200)));

        // Give the backend time to register its watches.
        tokio::time::sleep(Duration::from_millis(300)).await;
        std::fs::write(partials.join("nav.pug"), "nav\n  a(href=\"/\") Home\n").expect("rewrite partial");
        assert_eq!(wait_for(&views_count, 1).await, 1);

        std::fs::write(base.join("README.md"), "# notes\n").expect("write outside file");
        std::fs::write(base.join("src/views/notes.txt"), "todo\n").expect("write non-template");
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(views_count.load(Ordering::SeqCst), 1);

        watcher.abort();
    }

    #[test]
    fn test_is_change() {
        assert!(is_change(&EventKind::Create(notify::event::CreateKind::File)));
        assert!(is_change(&EventKind::Modify(ModifyKind::Data(
            notify::event::DataChange::Content
        ))));
        assert!(!is_change(&EventKind::Access(notify::event::AccessKind::Read)));
        assert!(!is_change(&EventKind::Modify(ModifyKind::Metadata(
            notify::event::MetadataKind::Any
        ))));
    }
}
