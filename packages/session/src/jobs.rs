//! Job records mirrored from processing sessions

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub current_node: Option<String>,
    pub node_index: Option<u32>,
    pub total_nodes: Option<u32>,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Processing,
            current_node: None,
            node_index: None,
            total_nodes: None,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, update: JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if update.current_node.is_some() {
            self.current_node = update.current_node;
        }
        if update.node_index.is_some() {
            self.node_index = update.node_index;
        }
        if update.total_nodes.is_some() {
            self.total_nodes = update.total_nodes;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        if update.result.is_some() {
            self.result = update.result;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub current_node: Option<String>,
    pub node_index: Option<u32>,
    pub total_nodes: Option<u32>,
    pub error: Option<String>,
    pub result: Option<Value>,
}

impl JobUpdate {
    pub fn progress(node: &str, node_index: Option<u32>, total_nodes: Option<u32>) -> Self {
        Self {
            current_node: Some(node.to_string()),
            node_index,
            total_nodes,
            ..Default::default()
        }
    }

    pub fn completed(result: Value) -> Self {
        Self {
            status: Some(JobStatus::Complete),
            result: Some(result),
            ..Default::default()
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

/// Owner of job records that sessions report into
pub trait JobStore: Send + Sync {
    fn add_job(&self, job: JobRecord);
    fn update_job(&self, id: &str, update: JobUpdate);
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.lock().iter().find(|job| job.id == id).cloned()
    }

    /// Newest first
    pub fn jobs(&self) -> Vec<JobRecord> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<JobRecord>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl JobStore for InMemoryJobStore {
    fn add_job(&self, job: JobRecord) {
        let mut jobs = self.lock();
        jobs.retain(|existing| existing.id != job.id);
        jobs.insert(0, job);
    }

    fn update_job(&self, id: &str, update: JobUpdate) {
        match self.lock().iter_mut().find(|job| job.id == id) {
            Some(job) => job.apply(update),
            None => tracing::debug!(job_id = id, "Update for unknown job"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_and_update() {
        let store = InMemoryJobStore::new();
        store.add_job(JobRecord::new("j1"));
        store.add_job(JobRecord::new("j2"));

        store.update_job("j1", JobUpdate::progress("transcribe", Some(1), Some(4)));
        store.update_job("j1", JobUpdate::completed(json!({"manual_id": 3})));

        let job = store.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.current_node.as_deref(), Some("transcribe"));
        assert_eq!(job.total_nodes, Some(4));
        assert_eq!(job.result, Some(json!({"manual_id": 3})));

        let ids: Vec<_> = store.jobs().into_iter().map(|job| job.id).collect();
        assert_eq!(ids, vec!["j2", "j1"]);
    }

    #[test]
    fn test_re_adding_replaces() {
        let store = InMemoryJobStore::new();
        store.add_job(JobRecord::new("j1"));
        store.update_job("j1", JobUpdate::failed("boom"));
        store.add_job(JobRecord::new("j1"));

        assert_eq!(store.jobs().len(), 1);
        assert_eq!(store.get("j1").unwrap().status, JobStatus::Processing);
    }

    #[test]
    fn test_update_unknown_job_is_ignored() {
        let store = InMemoryJobStore::new();
        store.update_job("missing", JobUpdate::failed("boom"));
        assert!(store.jobs().is_empty());
    }
}
