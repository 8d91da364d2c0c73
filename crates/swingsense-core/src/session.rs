//! Numbered recording files.
//!
//! A [`SessionManager`] turns Start/Sample/Stop frames into files named
//! `<root>/<base>/<base>_<N>.csv`. It is owned by the supervisor's task. A
//! cloneable [`SessionHandle`] gives the command-intake thread access to
//! [`undo_last`](SessionHandle::undo_last).
//!
//! Both sides share one [`Mutex`] around the open session, the last closed
//! session and the next index. The open file itself stays with the manager,
//! so sample writes happen outside the lock.
//!
//! # Example
//!
//! ```no_run
//! use swingsense_core::session::SessionManager;
//! use swingsense_types::SampleRecord;
//!
//! # fn main() -> swingsense_core::Result<()> {
//! let mut sessions = SessionManager::new(".", "swing");
//! let undo = sessions.handle();
//!
//! sessions.on_start()?;
//! sessions.on_sample(&SampleRecord::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0))?;
//! sessions.on_stop();
//!
//! undo.undo_last()?; // deletes swing/swing_1.csv
//! # Ok(())
//! # }
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use swingsense_types::SampleRecord;

use crate::error::{Error, Result, StorageAction};
use crate::events::{EventSender, SupervisorEvent};

/// Base name used when the operator supplies an empty one.
pub const DEFAULT_BASE: &str = "recording";

/// Whether a recording file is still being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// Identity of one recording file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSession {
    /// Positive file number.
    pub index: u32,
    /// Full path of the CSV file.
    pub path: PathBuf,
    pub status: SessionStatus,
    /// Sample lines written so far.
    pub line_count: u64,
}

/// Point-in-time copy of the shared session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub open: Option<RecordingSession>,
    pub last_closed: Option<RecordingSession>,
    pub next_index: u32,
}

/// Result of a successful undo.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UndoOutcome {
    /// The file was deleted.
    Deleted {
        /// The session whose file was removed.
        session: RecordingSession,
        /// Whether the next Start will reuse its index.
        index_reclaimed: bool,
    },
}

#[derive(Debug)]
struct SessionState {
    open: Option<RecordingSession>,
    last_closed: Option<RecordingSession>,
    next_index: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            open: None,
            last_closed: None,
            next_index: 1,
        }
    }
}

type SharedState = Arc<Mutex<SessionState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, SessionState> {
    // Critical sections only assign fields; a poisoned state is still consistent.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the recording file lifecycle.
pub struct SessionManager {
    directory: PathBuf,
    base: String,
    state: SharedState,
    writer: Option<LineWriter<File>>,
    events: Option<EventSender>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("directory", &self.directory)
            .field("base", &self.base)
            .field("recording", &self.writer.is_some())
            .finish()
    }
}

impl SessionManager {
    /// Create a manager writing under `<root>/<base>/`.
    ///
    /// A blank `base` falls back to [`DEFAULT_BASE`].
    pub fn new(root: impl AsRef<Path>, base: impl Into<String>) -> Self {
        let base = base.into();
        let base = match base.trim() {
            "" => DEFAULT_BASE.to_string(),
            trimmed => trimmed.to_string(),
        };
        Self {
            directory: root.as_ref().join(&base),
            base,
            state: SharedState::default(),
            writer: None,
            events: None,
        }
    }

    /// Publish session events on `sender`.
    pub fn set_event_sender(&mut self, sender: EventSender) {
        self.events = Some(sender);
    }

    /// Handle for the command-intake context.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Directory recordings are written to.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The base file name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path of recording number `index`.
    pub fn path_for(&self, index: u32) -> PathBuf {
        self.directory.join(format!("{}_{}.csv", self.base, index))
    }

    /// Whether a recording file is open.
    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    /// Copy of the shared state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.handle().snapshot()
    }

    /// Open the next numbered file.
    ///
    /// A session that is still open is closed first. The index is consumed
    /// even when the directory or file cannot be created; in that case no
    /// session is left open.
    pub fn on_start(&mut self) -> Result<RecordingSession> {
        if let Some(previous) = self.close_open(false) {
            warn!(
                index = previous.index,
                "Start received while recording; closed previous session"
            );
        }

        let index = {
            let mut state = lock(&self.state);
            let index = state.next_index;
            state.next_index += 1;
            state.last_closed = None;
            index
        };
        let path = self.path_for(index);

        fs::create_dir_all(&self.directory).map_err(|e| {
            Error::storage(StorageAction::CreateDirectory, &self.directory, e)
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::storage(StorageAction::OpenFile, &path, e))?;

        let session = RecordingSession {
            index,
            path,
            status: SessionStatus::Open,
            line_count: 0,
        };
        lock(&self.state).open = Some(session.clone());
        self.writer = Some(LineWriter::new(file));

        info!(index, path = %session.path.display(), "Recording started");
        self.emit(SupervisorEvent::SessionOpened {
            index,
            path: session.path.clone(),
        });
        Ok(session)
    }

    /// Append one sample to the open file.
    ///
    /// Returns `Ok(false)` when nothing is recording. A write failure leaves
    /// the session open.
    pub fn on_sample(&mut self, record: &SampleRecord) -> Result<bool> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(false);
        };

        let line = record.to_csv_line();
        if let Err(e) = writer.write_all(line.as_bytes()) {
            let path = lock(&self.state)
                .open
                .as_ref()
                .map(|s| s.path.clone())
                .unwrap_or_else(|| self.directory.clone());
            return Err(Error::storage(StorageAction::WriteFile, path, e));
        }

        if let Some(open) = lock(&self.state).open.as_mut() {
            open.line_count += 1;
        }
        Ok(true)
    }

    /// Close the open file after a Stop frame.
    ///
    /// Returns `None` when nothing was recording.
    pub fn on_stop(&mut self) -> Option<RecordingSession> {
        let closed = self.close_open(false);
        if closed.is_none() {
            debug!("Stop received with no open session");
        }
        closed
    }

    /// Close the open file because the link went down.
    pub fn close_inferred(&mut self) -> Option<RecordingSession> {
        self.close_open(true)
    }

    fn close_open(&mut self, inferred: bool) -> Option<RecordingSession> {
        let writer = self.writer.take();

        let closed = {
            let mut state = lock(&self.state);
            let mut session = state.open.take()?;
            session.status = SessionStatus::Closed;
            state.last_closed = Some(session.clone());
            session
        };

        if let Some(mut writer) = writer
            && let Err(e) = writer.flush()
        {
            warn!("{}", Error::storage(StorageAction::CloseFile, &closed.path, e));
        }

        info!(
            index = closed.index,
            lines = closed.line_count,
            inferred,
            path = %closed.path.display(),
            "Recording closed"
        );
        self.emit(SupervisorEvent::SessionClosed {
            index: closed.index,
            path: closed.path.clone(),
            lines: closed.line_count,
            inferred,
        });
        Some(closed)
    }

    fn emit(&self, event: SupervisorEvent) {
        if let Some(sender) = &self.events {
            // Ignore error if no receivers
            let _ = sender.send(event);
        }
    }
}

/// Cloneable access to the shared session state from another thread.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: SharedState,
}

impl SessionHandle {
    /// Delete the most recently closed recording.
    ///
    /// The index is handed back only if it is the most recently issued one.
    /// An open session is never touched.
    ///
    /// # Errors
    ///
    /// [`Error::NothingToUndo`] if no closed session is pending or its file
    /// no longer exists; [`Error::Storage`] if the delete fails. State is
    /// unchanged in both cases.
    pub fn undo_last(&self) -> Result<UndoOutcome> {
        let mut state = lock(&self.state);
        let Some(session) = state.last_closed.clone() else {
            return Err(Error::NothingToUndo);
        };
        if !session.path.is_file() {
            debug!(path = %session.path.display(), "Undo target already gone");
            return Err(Error::NothingToUndo);
        }

        fs::remove_file(&session.path)
            .map_err(|e| Error::storage(StorageAction::DeleteFile, &session.path, e))?;

        let index_reclaimed = session.index.checked_add(1) == Some(state.next_index);
        if index_reclaimed {
            state.next_index = session.index;
        }
        state.last_closed = None;
        drop(state);

        info!(
            index = session.index,
            index_reclaimed,
            path = %session.path.display(),
            "Recording deleted"
        );
        Ok(UndoOutcome::Deleted {
            session,
            index_reclaimed,
        })
    }

    /// Copy of the shared state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = lock(&self.state);
        SessionSnapshot {
            open: state.open.clone(),
            last_closed: state.last_closed.clone(),
            next_index: state.next_index,
        }
    }
}
