use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use tickoff_shared::{Filter, TaskId, TaskText};
use tracing::{debug, info, instrument};

use crate::api::ApiError;
use crate::bulk::BulkHandler;
use crate::cli::{Command, join_text};
use crate::gate::GateOptions;
use crate::mutation::{DebouncedMutation, TrackedMutation};
use crate::notify::{Notification, NotificationLevel, Notifier};
use crate::outcome::{CallOutcome, GateError};
use crate::render::Renderer;
use crate::selection::{SelectionMemo, select};
use crate::service::TaskService;
use crate::url_sync::{FileLocation, UrlSync, UserState};

pub const VIEW_FILE: &str = "view.url";

/// How long a request may run before its status line is printed.
const STATUS_DELAY: Duration = Duration::from_millis(400);

pub struct Session {
    service: TaskService,
    renderer: Renderer,
    gate: GateOptions,
    view_file: PathBuf,
}

impl Session {
    pub fn new(service: TaskService, renderer: Renderer, gate: GateOptions, data_dir: &Path) -> Self {
        Self {
            service,
            renderer,
            gate,
            view_file: data_dir.join(VIEW_FILE),
        }
    }

    #[instrument(skip(self))]
    pub async fn dispatch(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::List { filter } => self.list(filter).await,
            Command::Add { text } => {
                let text = TaskText::parse(join_text(&text))?;
                let service = self.service.clone();
                let task = self
                    .mutate("create", "Task created", text, move |text| {
                        let service = service.clone();
                        async move { service.create(text).await }
                    })
                    .await?;
                self.renderer.print_task(&task)
            }
            Command::Edit { id, text } => {
                let text = TaskText::parse(join_text(&text))?;
                let service = self.service.clone();
                let task = self
                    .mutate("update", "Task updated", (id, text), move |(id, text)| {
                        let service = service.clone();
                        async move { service.update(id, text).await }
                    })
                    .await?;
                self.renderer.print_task(&task)
            }
            Command::Done { id } => {
                let service = self.service.clone();
                let task = self
                    .mutate("complete", "Task completed", id, move |id| {
                        let service = service.clone();
                        async move { service.complete(id).await }
                    })
                    .await?;
                self.renderer.print_task(&task)
            }
            Command::Undo { id } => {
                let service = self.service.clone();
                let task = self
                    .mutate("incomplete", "Task marked active", id, move |id| {
                        let service = service.clone();
                        async move { service.incomplete(id).await }
                    })
                    .await?;
                self.renderer.print_task(&task)
            }
            Command::Rm { id } => {
                let service = self.service.clone();
                let removed: TaskId = self
                    .mutate("delete", "Task deleted", id, move |id| {
                        let service = service.clone();
                        async move { service.delete(id).await }
                    })
                    .await?;
                debug!(id = %removed, "task removed");
                Ok(())
            }
            Command::CompleteAll => self.complete_all().await,
            Command::ClearCompleted => self.clear_completed().await,
            Command::Filter { value } => self.filter(value),
        }
    }

    async fn list(&self, filter: Option<Filter>) -> anyhow::Result<()> {
        let filter = self.resolve_filter(filter)?;
        self.load().await?;

        let mut memo = SelectionMemo::default();
        let cache = self.service.cache().read();
        let selection = memo.get(&cache, filter);
        self.renderer.print_selection(selection, filter)
    }

    async fn complete_all(&self) -> anyhow::Result<()> {
        let filter = self.resolve_filter(None)?;
        self.load().await?;

        let ids = select(&self.service.snapshot(), filter).visible_active_ids;
        info!(count = ids.len(), %filter, "completing visible active tasks");
        let handler = BulkHandler::complete(|id| self.service.complete(id));
        self.with_status(handler.run(&ids, &self.renderer)).await;
        Ok(())
    }

    async fn clear_completed(&self) -> anyhow::Result<()> {
        let filter = self.resolve_filter(None)?;
        self.load().await?;

        let ids = select(&self.service.snapshot(), filter).visible_completed_ids;
        info!(count = ids.len(), %filter, "deleting visible completed tasks");
        let handler = BulkHandler::delete(|id| self.service.delete(id));
        self.with_status(handler.run(&ids, &self.renderer)).await;
        Ok(())
    }

    fn filter(&self, value: Option<Filter>) -> anyhow::Result<()> {
        let filter = self.resolve_filter(value)?;
        self.renderer.print_filter(filter)
    }

    /// The filter for this run: an explicit one is written back to the view
    /// URL, otherwise the stored URL decides.
    fn resolve_filter(&self, explicit: Option<Filter>) -> anyhow::Result<Filter> {
        let mut sync = UrlSync::new(FileLocation::open(&self.view_file)?);
        let mut state = UserState::default();
        sync.hydrate(&mut state);

        if let Some(filter) = explicit
            && filter != state.filter
        {
            sync.set_filter(&mut state, filter)
                .with_context(|| format!("failed to store filter in {}", self.view_file.display()))?;
        }

        Ok(state.filter)
    }

    async fn load(&self) -> anyhow::Result<()> {
        match self.with_status(self.service.refresh()).await {
            Ok(_) => Ok(()),
            Err(err) => {
                self.renderer.print_load_error(&err)?;
                Err(anyhow!(err).context("could not load tasks"))
            }
        }
    }

    async fn mutate<A, T, F, Fut>(
        &self,
        label: &'static str,
        success: &'static str,
        arg: A,
        action: F,
    ) -> anyhow::Result<T>
    where
        A: Send + 'static,
        T: Clone + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let mutation = DebouncedMutation::new(TrackedMutation::new(action), self.gate);
        let outcome: CallOutcome<T> = self.with_status(mutation.trigger(arg)).await;

        let status = mutation.status();
        debug!(
            label,
            requests = status.request_count,
            is_error = status.is_error,
            "mutation settled"
        );
        mutation.dispose();

        match outcome {
            Ok(value) => {
                self.renderer.notify(Notification::success(success));
                Ok(value)
            }
            Err(err) => {
                self.renderer
                    .notify(Notification::error(format!("{label} failed: {}", describe(&err))));
                Err(anyhow!(err).context(format!("{label} failed")))
            }
        }
    }

    /// Awaits `fut`, printing the running request lines if it is slow.
    async fn with_status<T>(&self, fut: impl Future<Output = T>) -> T {
        tokio::pin!(fut);
        tokio::select! {
            value = &mut fut => return value,
            _ = tokio::time::sleep(STATUS_DELAY) => {}
        }

        for line in self.service.running().status_lines() {
            self.renderer
                .notify(Notification::new(NotificationLevel::Info, line));
        }
        fut.await
    }
}

/// A user-facing line for a failed gated call.
pub fn describe(err: &GateError) -> String {
    match err {
        GateError::ConcurrentCallBlocked => "another request is still running".to_string(),
        GateError::CallFailed { error } => match error.downcast_ref::<ApiError>() {
            Some(api) => api.user_message(),
            None => format!("{error:#}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn describe_blocked_call() {
        assert_eq!(
            describe(&GateError::ConcurrentCallBlocked),
            "another request is still running"
        );
    }

    #[test]
    fn describe_prefers_api_user_message() {
        let err = GateError::failed(ApiError::Timeout {
            url: "http://localhost:8080/tasks".to_string(),
        });
        let api = ApiError::Timeout {
            url: "http://localhost:8080/tasks".to_string(),
        };
        assert_eq!(describe(&err), api.user_message());
    }

    #[test]
    fn describe_falls_back_to_error_chain() {
        let err = GateError::failed(io::Error::other("disk full"));
        assert_eq!(describe(&err), "disk full");
    }
}
