//! Recording metadata.
//!
//! The relay never captures media. A recording is a metadata record plus
//! an empty placeholder file at `<dir>/<room_id>_<recording_id>.webm` that
//! an external recorder is expected to fill.

use crate::errors::RelayError;
use crate::observability::metrics;
use crate::rooms::is_valid_room_id;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recording {
    pub id: String,
    pub room_id: String,
    pub filename: PathBuf,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    pub status: RecordingStatus,
}

impl Recording {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RecordingStatus::Active
    }
}

#[derive(Debug)]
pub struct RecordingStore {
    dir: PathBuf,
    recordings: RwLock<HashMap<String, Recording>>,
}

impl RecordingStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            recordings: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Begin a recording for `room_id` and create its placeholder file.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if `room_id` is not a valid room identifier
    /// - `Storage` if the directory or file cannot be created
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn start(&self, room_id: &str) -> Result<Recording, RelayError> {
        // room_id becomes part of a path
        if !is_valid_room_id(room_id) {
            return Err(RelayError::BadRequest("Invalid room_id".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let filename = self.dir.join(format!("{room_id}_{id}.webm"));

        let created = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::File::create(&filename).await
        }
        .await;
        if let Err(e) = created {
            metrics::record_recording("failed");
            warn!(
                target: "relay.recording",
                room_id = %room_id,
                path = %filename.display(),
                error = %e,
                "Failed to create recording file"
            );
            return Err(RelayError::Storage(format!(
                "failed to create recording file: {e}"
            )));
        }

        let recording = Recording {
            id: id.clone(),
            room_id: room_id.to_string(),
            filename,
            started_at: Utc::now(),
            ended_at: None,
            duration_seconds: None,
            status: RecordingStatus::Active,
        };
        self.recordings
            .write()
            .await
            .insert(id.clone(), recording.clone());

        metrics::record_recording("started");
        info!(
            target: "relay.recording",
            room_id = %room_id,
            recording_id = %id,
            "Recording started"
        );
        Ok(recording)
    }

    /// Mark an active recording completed.
    ///
    /// # Errors
    ///
    /// - `RecordingNotFound` for an unknown id
    /// - `Conflict` if the recording is not active
    pub async fn stop(&self, recording_id: &str) -> Result<Recording, RelayError> {
        let mut recordings = self.recordings.write().await;
        let recording = recordings
            .get_mut(recording_id)
            .ok_or_else(|| RelayError::RecordingNotFound(recording_id.to_string()))?;
        if !recording.is_active() {
            return Err(RelayError::Conflict(format!(
                "Recording is not active: {recording_id}"
            )));
        }

        let ended_at = Utc::now();
        recording.status = RecordingStatus::Completed;
        recording.ended_at = Some(ended_at);
        recording.duration_seconds = Some((ended_at - recording.started_at).num_seconds());
        let stopped = recording.clone();
        drop(recordings);

        metrics::record_recording("completed");
        info!(
            target: "relay.recording",
            room_id = %stopped.room_id,
            recording_id = %recording_id,
            "Recording stopped"
        );
        Ok(stopped)
    }

    pub async fn get(&self, recording_id: &str) -> Option<Recording> {
        self.recordings.read().await.get(recording_id).cloned()
    }

    /// Recordings of one room, oldest first.
    pub async fn list(&self, room_id: &str) -> Vec<Recording> {
        let mut found: Vec<Recording> = self
            .recordings
            .read()
            .await
            .values()
            .filter(|r| r.room_id == room_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        found
    }

    /// Remove a recording and its placeholder file. A file that is already
    /// gone is not an error.
    ///
    /// # Errors
    ///
    /// - `RecordingNotFound` for an unknown id
    /// - `Storage` if the file exists but cannot be removed
    pub async fn delete(&self, recording_id: &str) -> Result<Recording, RelayError> {
        let recording = self
            .recordings
            .write()
            .await
            .remove(recording_id)
            .ok_or_else(|| RelayError::RecordingNotFound(recording_id.to_string()))?;

        match tokio::fs::remove_file(&recording.filename).await {
            Ok(()) => Ok(recording),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(recording),
            Err(e) => {
                warn!(
                    target: "relay.recording",
                    recording_id = %recording_id,
                    path = %recording.filename.display(),
                    error = %e,
                    "Failed to delete recording file"
                );
                // Put the record back so the delete can be retried.
                self.recordings
                    .write()
                    .await
                    .insert(recording.id.clone(), recording);
                Err(RelayError::Storage(format!(
                    "failed to delete recording file: {e}"
                )))
            }
        }
    }

    /// Drop the metadata of every recording in `room_id`. Placeholder
    /// files stay on disk. Returns the forgotten recordings.
    pub async fn forget_room(&self, room_id: &str) -> Vec<Recording> {
        let mut recordings = self.recordings.write().await;
        let ids: Vec<String> = recordings
            .values()
            .filter(|r| r.room_id == room_id)
            .map(|r| r.id.clone())
            .collect();
        let forgotten: Vec<Recording> = ids
            .iter()
            .filter_map(|id| recordings.remove(id))
            .collect();
        drop(recordings);

        if !forgotten.is_empty() {
            info!(
                target: "relay.recording",
                room_id = %room_id,
                count = forgotten.len(),
                "Recording metadata released"
            );
        }
        forgotten
    }
}
