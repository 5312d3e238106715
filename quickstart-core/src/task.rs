//! Background tasks with a modal progress indicator and exactly one terminal
//! callback.
//!
//! [`EventLoop::run_task`] shows the indicator, runs the work on its own
//! thread, and when the terminal signal comes back it hides the indicator and
//! then calls either `on_done` or `on_failed` on the interactive thread. Work
//! that returns an error, panics, or never gets a thread all end in
//! `on_failed`; the indicator never outlives its task.
use crate::event_loop::{EventLoop, Token, WorkerFault};
use thiserror::Error;

/// Shows and hides the modal progress indicator for a task.
pub trait ProgressSurface {
    fn show(&mut self, task: Token, message: &str);
    fn hide(&mut self, task: Token);
}

/// A surface for front-ends (and tests) without a progress indicator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSurface for NoProgress {
    fn show(&mut self, _task: Token, _message: &str) {}
    fn hide(&mut self, _task: Token) {}
}

/// The terminal signal a task ends with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Done,
    Failed,
}

/// Why a task ended in [`TaskStatus::Failed`].
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("{0:#}")]
    Work(anyhow::Error),
    #[error(transparent)]
    Worker(#[from] WorkerFault),
}

impl<C: 'static> EventLoop<C> {
    /// Starts a task. `progress_message`, when given, is shown until the
    /// terminal callback has been dispatched.
    pub fn run_task<T, W, D, F>(
        &mut self,
        progress_message: Option<&str>,
        work: W,
        on_done: D,
        on_failed: F,
    ) -> Token
    where
        T: Send + 'static,
        W: FnOnce() -> anyhow::Result<T> + Send + 'static,
        D: FnOnce(&mut C, T) + 'static,
        F: FnOnce(&mut C, TaskFailure) + 'static,
    {
        let token = self.allocate();
        if let Some(message) = progress_message {
            self.show_progress(token, message);
        }
        tracing::debug!(task = %token, message = progress_message.unwrap_or(""), "task started");

        self.spawn_as(token, "quickstart-task", work, move |ctx: &mut C, outcome| {
            let status = match outcome {
                Ok(Ok(value)) => {
                    tracing::debug!(task = %token, "task done");
                    on_done(ctx, value);
                    TaskStatus::Done
                }
                Ok(Err(error)) => {
                    tracing::warn!(task = %token, error = %format!("{error:#}"), "task failed");
                    on_failed(ctx, TaskFailure::Work(error));
                    TaskStatus::Failed
                }
                Err(fault) => {
                    tracing::warn!(task = %token, error = %fault, "task worker faulted");
                    on_failed(ctx, TaskFailure::Worker(fault));
                    TaskStatus::Failed
                }
            };
            tracing::trace!(task = %token, ?status, "terminal callback dispatched");
        });
        token
    }
}
