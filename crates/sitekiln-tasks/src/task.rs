//! Named tasks and the `series`/`parallel` combinators.

use std::{fmt, future::Future, pin::Pin, sync::Arc, time::Instant};

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::error::{Result, TaskError};

/// Future returned by a task body.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// How a task is composed, used for listing.
#[derive(Clone)]
enum Kind {
    Leaf,
    Series(Vec<Task>),
    Parallel(Vec<Task>),
}

/// A named, re-runnable unit of work.
///
/// Cloning is cheap; clones share the same body.
#[derive(Clone)]
pub struct Task {
    name: Arc<str>,
    kind: Kind,
    body: TaskFn,
}

impl Task {
    /// Create a task from an async body.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: Kind::Leaf,
            body: Arc::new(move || -> TaskFuture { Box::pin(body()) }),
        }
    }

    /// Create a task whose body is CPU-bound or does blocking IO.
    ///
    /// The body runs on tokio's blocking pool.
    pub fn blocking<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        Self::new(name, move || {
            let body = Arc::clone(&body);
            async move { tokio::task::spawn_blocking(move || (*body)()).await? }
        })
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the task, logging its start and completion.
    pub async fn run(&self) -> Result<()> {
        info!("Starting '{}'...", self.name);
        let started = Instant::now();

        let result = (self.body)().await;
        let elapsed = started.elapsed().as_millis();

        match &result {
            Ok(()) => info!("Finished '{}' after {elapsed}ms", self.name),
            Err(err) => error!(task = %self.name, error = %err, "'{}' errored after {elapsed}ms", self.name),
        }
        result
    }

    /// Render the task tree, one task per line.
    pub fn tree(&self) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, "", "");
        out
    }

    fn write_tree(&self, out: &mut String, lead: &str, rest: &str) {
        let (label, children) = match &self.kind {
            Kind::Leaf => ("", &[][..]),
            Kind::Series(children) => (" (series)", children.as_slice()),
            Kind::Parallel(children) => (" (parallel)", children.as_slice()),
        };
        out.push_str(&format!("{lead}{}{label}\n", self.name));

        for (idx, child) in children.iter().enumerate() {
            let last = idx + 1 == children.len();
            let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
            child.write_tree(out, &format!("{rest}{branch}"), &format!("{rest}{indent}"));
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Compose tasks to run one after another, stopping at the first failure.
pub fn series(name: impl Into<Arc<str>>, tasks: Vec<Task>) -> Task {
    let members: Arc<[Task]> = tasks.clone().into();
    let mut task = Task::new(name, move || {
        let members = Arc::clone(&members);
        async move {
            for member in members.iter() {
                member.run().await?;
            }
            Ok(())
        }
    });
    task.kind = Kind::Series(tasks);
    task
}

/// Compose tasks to run concurrently.
///
/// Every member runs to completion even when a sibling fails; the first
/// failure to complete is returned, tagged with the member's name.
pub fn parallel(name: impl Into<Arc<str>>, tasks: Vec<Task>) -> Task {
    let members: Arc<[Task]> = tasks.clone().into();
    let mut task = Task::new(name, move || {
        let members = Arc::clone(&members);
        async move {
            let mut set = JoinSet::new();
            for member in members.iter().cloned() {
                set.spawn(async move {
                    let result = member.run().await;
                    (member.name.clone(), result)
                });
            }

            let mut first_error = None;
            while let Some(joined) = set.join_next().await {
                let failure = match joined {
                    Ok((_, Ok(()))) => continue,
                    Ok((name, Err(source))) => TaskError::Failed {
                        task: name.to_string(),
                        source: Box::new(source),
                    },
                    Err(join) => TaskError::Join(join),
                };
                first_error.get_or_insert(failure);
            }

            first_error.map_or(Ok(()), Err)
        }
    });
    task.kind = Kind::Parallel(tasks);
    task
}
