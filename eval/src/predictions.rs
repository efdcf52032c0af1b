//! The prediction store.
//!
//! One JSON array at `<root>/predictions/predictions.json`. Records are keyed
//! by `instance_id`; an upsert merges the new fields into the existing record
//! so fields the new record omits survive.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use fixer::core::types::{DiffEvaluation, MetaEvaluation};
use fixer::io::config::write_atomic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

pub const MODEL_NAME: &str = "fixer";

/// One instance's submitted patch and its grading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub instance_id: String,
    pub model_name_or_path: String,
    pub model_patch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<DiffEvaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_evaluation: Option<MetaEvaluation>,
}

impl Prediction {
    pub fn new(instance_id: &str, model_patch: String) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            model_name_or_path: MODEL_NAME.to_string(),
            model_patch,
            evaluation: None,
            meta_evaluation: None,
        }
    }
}

/// Shared handle to the store file. Writers go through one lock at a time.
pub struct PredictionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PredictionStore {
    pub fn path_for(root: &Path) -> PathBuf {
        root.join("predictions").join("predictions.json")
    }

    /// Open the store under `root`, creating an empty array when missing.
    pub fn init(root: &Path) -> Result<Self> {
        let path = Self::path_for(root);
        if !path.exists() {
            write_atomic(&path, "[]")?;
            debug!(path = %path.display(), "created prediction store");
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, instance_id: &str) -> Result<Option<Prediction>> {
        let _guard = self.lock()?;
        let records = self.read_records()?;
        records
            .into_iter()
            .find(|record| record_id(record) == Some(instance_id))
            .map(|record| serde_json::from_value(Value::Object(record)).context("parse prediction"))
            .transpose()
    }

    pub fn all(&self) -> Result<Vec<Prediction>> {
        let _guard = self.lock()?;
        self.read_records()?
            .into_iter()
            .map(|record| serde_json::from_value(Value::Object(record)).context("parse prediction"))
            .collect()
    }

    /// Insert `prediction`, or merge it into the record with the same id.
    pub fn upsert(&self, prediction: &Prediction) -> Result<()> {
        let incoming = match serde_json::to_value(prediction).context("serialize prediction")? {
            Value::Object(map) => map,
            other => bail!("prediction serialized to {other}"),
        };
        let _guard = self.lock()?;
        let mut records = self.read_records()?;
        match records
            .iter_mut()
            .find(|record| record_id(record) == Some(prediction.instance_id.as_str()))
        {
            Some(existing) => existing.extend(incoming),
            None => records.push(incoming),
        }
        let contents = serde_json::to_string_pretty(&records).context("serialize predictions")?;
        write_atomic(&self.path, &format!("{contents}\n"))?;
        debug!(instance_id = %prediction.instance_id, "prediction saved");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| anyhow!("prediction store lock poisoned"))
    }

    fn read_records(&self) -> Result<Vec<Map<String, Value>>> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", self.path.display()))
    }
}

fn record_id(record: &Map<String, Value>) -> Option<&str> {
    record.get("instance_id").and_then(Value::as_str)
}
