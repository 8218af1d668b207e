use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config_store::{now_ms, restrict_to_owner};
use crate::paths::{resolve_within_base, PathError};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ServiceEnable,
    ServiceDisable,
    PermissionChange,
    PiiToggle,
    ConfigReset,
    Startup,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub service_id: String,
    pub previous_value: Option<Value>,
    pub new_value: Option<Value>,
    pub source: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub event: AuditEvent,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit append failed: {0}")]
    Write(String),
    #[error("audit rotation failed: {0}")]
    Rotate(String),
    #[error("audit path rejected: {0}")]
    Path(#[from] PathError),
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
    fn recent(&self, count: usize) -> Vec<AuditRecord>;
}

pub struct InMemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.records.lock().push(AuditRecord {
            timestamp_ms: now_ms(),
            event,
        });
        Ok(())
    }

    fn recent(&self, count: usize) -> Vec<AuditRecord> {
        let records = self.records.lock();
        let start = records.len().saturating_sub(count);
        records[start..].to_vec()
    }
}

struct ActiveFile {
    file: File,
    written: u64,
}

pub struct FileAuditSink {
    path: PathBuf,
    rotate_bytes: u64,
    retain: usize,
    state: Mutex<ActiveFile>,
}

impl FileAuditSink {
    pub fn open(
        path: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
        rotate_bytes: u64,
        retain: usize,
    ) -> Result<Self, AuditError> {
        let path = resolve_within_base(path.as_ref(), base_dir.as_ref())?;
        let state = open_active(&path)?;
        Ok(Self {
            path,
            rotate_bytes: rotate_bytes.max(1),
            retain: retain.max(1),
            state: Mutex::new(state),
        })
    }

    pub fn shared(
        path: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
        rotate_bytes: u64,
        retain: usize,
    ) -> Result<Arc<Self>, AuditError> {
        Ok(Arc::new(Self::open(path, base_dir, rotate_bytes, retain)?))
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("audit.log");
        self.path.with_file_name(format!("{name}.{index}"))
    }

    fn rotate_locked(&self, state: &mut ActiveFile) -> Result<(), AuditError> {
        let oldest = self.backup_path(self.retain);
        if oldest.exists() {
            fs::remove_file(&oldest).map_err(|err| AuditError::Rotate(err.to_string()))?;
        }
        for index in (1..self.retain).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))
                    .map_err(|err| AuditError::Rotate(err.to_string()))?;
            }
        }
        state
            .file
            .flush()
            .map_err(|err| AuditError::Rotate(err.to_string()))?;
        fs::rename(&self.path, self.backup_path(1))
            .map_err(|err| AuditError::Rotate(err.to_string()))?;
        *state = open_active(&self.path)?;
        Ok(())
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let record = AuditRecord {
            timestamp_ms: now_ms(),
            event,
        };
        let mut line =
            serde_json::to_string(&record).map_err(|err| AuditError::Write(err.to_string()))?;
        line.push('\n');

        let mut state = self.state.lock();
        if state.written > 0 && state.written + line.len() as u64 > self.rotate_bytes {
            self.rotate_locked(&mut state)?;
        }
        state
            .file
            .write_all(line.as_bytes())
            .map_err(|err| AuditError::Write(err.to_string()))?;
        state.written += line.len() as u64;
        Ok(())
    }

    fn recent(&self, count: usize) -> Vec<AuditRecord> {
        let _state = self.state.lock();
        let mut records = read_records(&self.path);
        if records.len() < count {
            let backup = read_records(&self.backup_path(1));
            let missing = count - records.len();
            let start = backup.len().saturating_sub(missing);
            let mut combined = backup[start..].to_vec();
            combined.append(&mut records);
            records = combined;
        }
        let start = records.len().saturating_sub(count);
        records[start..].to_vec()
    }
}

fn open_active(path: &Path) -> Result<ActiveFile, AuditError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| AuditError::Write(err.to_string()))?;
    restrict_to_owner(path);
    let written = file
        .metadata()
        .map(|meta| meta.len())
        .map_err(|err| AuditError::Write(err.to_string()))?;
    Ok(ActiveFile { file, written })
}

fn read_records(path: &Path) -> Vec<AuditRecord> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return Vec::new(),
    };
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        // a line interrupted mid-append parses as garbage; drop it, keep the rest
        if let Ok(record) = serde_json::from_str::<AuditRecord>(&line) {
            records.push(record);
        }
    }
    records
}
