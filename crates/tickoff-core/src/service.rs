use std::sync::Arc;

use tickoff_shared::{CreateTaskRequest, Task, TaskId, TaskText, UpdateTaskRequest};
use tracing::{info, instrument};

use crate::api::{ApiError, TodoApi};
use crate::cache::{self, SharedTaskCache};
use crate::request_status::{RequestType, RunningOperations};

/// Remote calls plus the cache writes that follow them. The cache is only
/// touched after the backend confirmed the change.
#[derive(Debug, Clone)]
pub struct TaskService {
    api: TodoApi,
    cache: SharedTaskCache,
    running: Arc<RunningOperations>,
}

impl TaskService {
    pub fn new(api: TodoApi) -> Self {
        Self {
            api,
            cache: cache::shared(),
            running: Arc::default(),
        }
    }

    pub fn cache(&self) -> &SharedTaskCache {
        &self.cache
    }

    pub fn running(&self) -> &Arc<RunningOperations> {
        &self.running
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.cache.read().tasks().to_vec()
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Vec<Task>, ApiError> {
        let _running = self.running.begin(RequestType::Read);
        let tasks = self.api.list_tasks().await?;
        info!(count = tasks.len(), "fetched tasks");
        self.cache.write().hydrate(tasks.clone());
        Ok(tasks)
    }

    #[instrument(skip(self, text))]
    pub async fn create(&self, text: TaskText) -> Result<Task, ApiError> {
        let _running = self.running.begin(RequestType::Create);
        let task = self.api.create_task(&CreateTaskRequest { text }).await?;
        self.cache.write().append(task.clone());
        Ok(task)
    }

    #[instrument(skip(self, text), fields(%id))]
    pub async fn update(&self, id: TaskId, text: TaskText) -> Result<Task, ApiError> {
        let _running = self.running.begin(RequestType::Update);
        let task = self.api.update_task(&id, &UpdateTaskRequest { text }).await?;
        self.cache.write().replace(task.clone());
        Ok(task)
    }

    #[instrument(skip(self), fields(%id))]
    pub async fn complete(&self, id: TaskId) -> Result<Task, ApiError> {
        let _running = self.running.begin(RequestType::Update);
        let task = self.api.complete_task(&id).await?;
        self.cache.write().replace(task.clone());
        Ok(task)
    }

    #[instrument(skip(self), fields(%id))]
    pub async fn incomplete(&self, id: TaskId) -> Result<Task, ApiError> {
        let _running = self.running.begin(RequestType::Update);
        let task = self.api.incomplete_task(&id).await?;
        self.cache.write().replace(task.clone());
        Ok(task)
    }

    #[instrument(skip(self), fields(%id))]
    pub async fn delete(&self, id: TaskId) -> Result<TaskId, ApiError> {
        let _running = self.running.begin(RequestType::Delete);
        self.api.delete_task(&id).await?;
        self.cache.write().remove(&id);
        Ok(id)
    }
}
