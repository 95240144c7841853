//! Durable local audit trail: the last completed booking+payment bundle and
//! the last receipt, keyed by fixed identifiers. Diagnostic only — the
//! backends keep the authoritative records.

use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const LAST_COMPLETED_BOOKING_KEY: &str = "last_completed_booking";
pub const LAST_RECEIPT_URL_KEY: &str = "last_receipt_url";

/// Everything support needs to look up a completed saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub saga_id: Uuid,
    pub booking_id: String,
    pub payment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    pub service_names: Vec<String>,
    pub team_member_id: String,
    pub start_at: DateTime<Utc>,
    /// Deposit actually charged, minor units
    pub amount: i64,
    pub currency: String,
    pub completed_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record_completed(&self, record: &AuditRecord) -> Result<(), ServiceError>;
    async fn last_completed(&self) -> Result<Option<AuditRecord>, ServiceError>;
}

/// JSON-file store written via temp-file + rename so a crash mid-write never
/// leaves a truncated file.
pub struct FileAuditStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<Map<String, Value>, ServiceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let value: Value = serde_json::from_slice(&bytes)?;
                match value {
                    Value::Object(map) => Ok(map),
                    _ => Ok(Map::new()),
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(ServiceError::InternalError(format!(
                "audit store unreadable: {err}"
            ))),
        }
    }

    async fn write_map(&self, map: &Map<String, Value>) -> Result<(), ServiceError> {
        let bytes = serde_json::to_vec_pretty(&Value::Object(map.clone()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| ServiceError::InternalError(format!("audit store write: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ServiceError::InternalError(format!("audit store rename: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn record_completed(&self, record: &AuditRecord) -> Result<(), ServiceError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(
            LAST_COMPLETED_BOOKING_KEY.to_string(),
            serde_json::to_value(record)?,
        );
        if let Some(receipt) = &record.receipt_url {
            map.insert(
                LAST_RECEIPT_URL_KEY.to_string(),
                Value::String(receipt.clone()),
            );
        }
        self.write_map(&map).await
    }

    async fn last_completed(&self) -> Result<Option<AuditRecord>, ServiceError> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;
        match map.get(LAST_COMPLETED_BOOKING_KEY) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}
