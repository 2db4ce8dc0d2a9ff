//! Local persistent store.
//!
//! Three logical regions (the local-only task list, the completion overlay
//! map, and the pending mutation queue), each kept in its own JSON file under
//! a scoped directory. Writes replace a whole region atomically (serialize to
//! a temp file, then rename over the target); reads of missing or corrupt
//! regions fail soft to the region's empty default.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::gateway::{EventDraft, EventPatch};
use crate::model::Task;

const LOCAL_TASKS_FILE: &str = "local_tasks.json";
const COMPLETION_FILE: &str = "completed.json";
const QUEUE_FILE: &str = "pending_queue.json";

/// Kind of a queued mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationKind {
    Create { draft: EventDraft },
    Update { patch: EventPatch },
    Delete,
}

/// One durable entry of the pending mutation queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    pub task_id: String,
    #[serde(flatten)]
    pub mutation: MutationKind,
    #[serde(default)]
    pub attempts: u32,
}

/// Scoped key-value persistence for the planner's client-side state.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create store directory {}", root.display()))?;
        Ok(Self { root })
    }

    /// Open the store in the platform data directory.
    pub fn open_default() -> Result<Self> {
        let root = dirs::data_dir()
            .context("could not determine data directory")?
            .join("dayplan");
        Self::open(root)
    }

    pub fn load_local_tasks(&self) -> Vec<Task> {
        self.read_region(LOCAL_TASKS_FILE)
    }

    pub fn save_local_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.write_region(LOCAL_TASKS_FILE, &tasks)
    }

    pub fn load_completion(&self) -> HashMap<String, bool> {
        self.read_region(COMPLETION_FILE)
    }

    pub fn save_completion(&self, completion: &HashMap<String, bool>) -> Result<()> {
        self.write_region(COMPLETION_FILE, completion)
    }

    pub fn load_queue(&self) -> Vec<QueuedMutation> {
        self.read_region(QUEUE_FILE)
    }

    pub fn save_queue(&self, queue: &[QueuedMutation]) -> Result<()> {
        self.write_region(QUEUE_FILE, &queue)
    }

    fn region_path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    fn read_region<T: DeserializeOwned + Default>(&self, file: &str) -> T {
        let path = self.region_path(file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return T::default(),
        };
        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(err) => {
                warn!("store region {} is unreadable, using default: {}", file, err);
                T::default()
            }
        }
    }

    fn write_region<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.region_path(file);
        let content = serde_json::to_string_pretty(value)?;
        atomic_write(&path, &content)
            .with_context(|| format!("failed to persist store region {}", file))
    }
}

fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
