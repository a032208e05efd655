pub mod export;
pub mod results;

use std::sync::Arc;

use log::{debug, info, warn};
use rand::seq::IndexedRandom;
use serde::Serialize;
use strum_macros::{Display, EnumString};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::config::Config;
use crate::converter::compress::compress_image;
use crate::converter::format::{available_formats, TargetFormat};
use crate::converter::level::CompressionLevel;
use crate::converter::{ConversionProvider, ConversionRequest, SimulatedConverter};
use crate::job::intake::{self, FileSelection};
use crate::job::{FileTask, MediaKind, TaskSnapshot, TaskStatus};
use crate::notify::Notifier;
use export::{build_archive, download_name, original_extension, Export, ExportError};
use results::ResultStore;

const FUN_MESSAGES: [&str; 4] = [
    "Flipping your files…",
    "Crunching pixels…",
    "Almost there…",
    "Making magic happen…",
];

const COMPRESS_MESSAGE: &str = "Squeezing files tight...";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Convert,
    Compress,
}

impl Mode {
    pub fn archive_name(self) -> &'static str {
        match self {
            Mode::Convert => "flipped_files.zip",
            Mode::Compress => "compressed_files.zip",
        }
    }

    fn completion_message(self) -> &'static str {
        match self {
            Mode::Convert => "All files flipped!",
            Mode::Compress => "All files compressed!",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("a batch is already running")]
    Busy,
    #[error("no files to process")]
    NoFiles,
    #[error("Pick a format first!")]
    NoFormat,
    #[error("Pick a compression level!")]
    NoLevel,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("selections are locked while a batch is running")]
    Busy,
    #[error("{0} is not offered for the files in this session")]
    Unavailable(TargetFormat),
}

/// What the main button does right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryAction {
    Process,
    Download,
}

/// Outcome of one dispatch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<Uuid>,
    pub failed: Vec<Uuid>,
    /// Set when a reset landed while the batch was running.
    pub abandoned: bool,
}

/// A task moved: published on every status or progress change while a batch
/// runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TaskProgress {
    pub id: Uuid,
    pub status: TaskStatus,
    pub progress: u8,
}

impl From<&FileTask> for TaskProgress {
    fn from(task: &FileTask) -> Self {
        Self {
            id: task.id,
            status: task.status,
            progress: task.progress,
        }
    }
}

fn publish(progress: &broadcast::Sender<TaskProgress>, task: &FileTask) {
    // no subscribers is fine
    let _ = progress.send(TaskProgress::from(task));
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub output_format: Option<TargetFormat>,
    pub compression_level: Option<CompressionLevel>,
    pub converting: bool,
    pub status_message: Option<String>,
    pub primary_action: PrimaryAction,
    pub primary_label: &'static str,
    pub available_formats: Vec<TargetFormat>,
    pub files: Vec<TaskSnapshot>,
}

#[derive(Default)]
struct SessionState {
    tasks: Vec<FileTask>,
    mode: Mode,
    output_format: Option<TargetFormat>,
    compression_level: Option<CompressionLevel>,
    converting: bool,
    status_message: Option<String>,
    results: ResultStore,
    /// Bumped by every reset so a running batch can tell it was cut off.
    generation: u64,
}

impl SessionState {
    fn task_mut(&mut self, id: Uuid) -> Option<&mut FileTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    fn available_formats(&self) -> Vec<TargetFormat> {
        available_formats(self.tasks.iter().map(|t| t.kind))
    }

    fn primary_action(&self) -> PrimaryAction {
        if !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == TaskStatus::Done) {
            PrimaryAction::Download
        } else {
            PrimaryAction::Process
        }
    }

    fn primary_label(&self) -> &'static str {
        match (self.primary_action(), self.mode, self.converting) {
            (PrimaryAction::Download, _, _) => "Download All",
            (PrimaryAction::Process, Mode::Convert, true) => "Flipping...",
            (PrimaryAction::Process, Mode::Compress, true) => "Squeezing...",
            (PrimaryAction::Process, Mode::Convert, false) => "Flip All Files →",
            (PrimaryAction::Process, Mode::Compress, false) => "Compress All →",
        }
    }

    /// Undoes a dispatch that stopped part way. Nothing to do when a reset
    /// has happened since it started.
    fn abandon_batch(
        &mut self,
        generation: u64,
        current: Option<Uuid>,
        progress: &broadcast::Sender<TaskProgress>,
    ) {
        if self.generation != generation {
            return;
        }
        warn!("dispatch dropped before it finished, back to idle");
        if let Some(task) = current.and_then(|id| self.task_mut(id)) {
            task.fail();
            publish(progress, task);
        }
        self.converting = false;
        self.status_message = None;
    }
}

/// Puts the session back to idle if `process` is dropped before it finishes,
/// e.g. by a timeout or a `select!` around it.
struct BatchGuard {
    state: Arc<Mutex<SessionState>>,
    progress: broadcast::Sender<TaskProgress>,
    generation: u64,
    current: Option<Uuid>,
    armed: bool,
}

impl BatchGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let (generation, current) = (self.generation, self.current);
        if let Ok(mut state) = self.state.try_lock() {
            state.abandon_batch(generation, current, &self.progress);
            return;
        }

        // someone else holds the lock; clean up once they let go
        let state = Arc::clone(&self.state);
        let progress = self.progress.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    state.lock().await.abandon_batch(generation, current, &progress);
                });
            }
            Err(_) => warn!("dispatch dropped outside a runtime, session stays busy"),
        }
    }
}

/// Copy of what a task needs while its work runs outside the lock.
struct PendingWork {
    name: String,
    kind: MediaKind,
    bytes: Arc<[u8]>,
}

/// The intake-and-processing widget: owns the task list, the selections,
/// the result store and the notifications that report on all of them.
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    notifier: Notifier,
    provider: Arc<dyn ConversionProvider>,
    progress: broadcast::Sender<TaskProgress>,
}

impl Session {
    /// Progress events a slow subscriber may fall behind by before it lags.
    pub const PROGRESS_CAPACITY: usize = 256;

    pub fn new(notifier: Notifier, provider: Arc<dyn ConversionProvider>) -> Self {
        let (progress, _) = broadcast::channel(Self::PROGRESS_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            notifier,
            provider,
            progress,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Notifier::new(config.toast_lifetime, config.toast_exit_delay),
            Arc::new(SimulatedConverter::new(config.simulated_delay)),
        )
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Every task transition from now on, in the order they happen.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<TaskProgress> {
        self.progress.subscribe()
    }

    /// Validates and appends files. Returns the ids of the accepted ones.
    pub async fn add_files<I>(&self, selections: I) -> Vec<Uuid>
    where
        I: IntoIterator<Item = FileSelection>,
    {
        let mut accepted = Vec::new();
        for selection in selections {
            match intake::validate(selection) {
                Ok(task) => accepted.push(task),
                Err(e) => {
                    self.notifier.error(e.to_string());
                }
            }
        }

        if accepted.is_empty() {
            return Vec::new();
        }

        let ids: Vec<Uuid> = accepted.iter().map(|t| t.id).collect();
        let count = ids.len();
        self.state.lock().await.tasks.extend(accepted);
        info!("accepted {} file(s)", count);
        self.notifier.success(format!(
            "Added {} file{}.",
            count,
            if count > 1 { "s" } else { "" }
        ));
        ids
    }

    /// Drops a task and releases its result. Unknown ids and tasks that are
    /// mid-conversion are left alone.
    pub async fn remove_file(&self, id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        let Some(index) = state.tasks.iter().position(|t| t.id == id) else {
            return false;
        };
        if state.tasks[index].status == TaskStatus::Converting {
            warn!("not removing {} while it is converting", id);
            return false;
        }

        let mut task = state.tasks.remove(index);
        if let Some(handle) = task.result.take() {
            state.results.revoke(handle);
        }
        debug!("removed {}", task.original_name);
        true
    }

    pub async fn set_mode(&self, mode: Mode) -> Result<(), SelectionError> {
        let mut state = self.state.lock().await;
        if state.converting {
            return Err(SelectionError::Busy);
        }
        state.mode = mode;
        Ok(())
    }

    pub async fn select_format(&self, format: TargetFormat) -> Result<(), SelectionError> {
        let mut state = self.state.lock().await;
        if state.converting {
            return Err(SelectionError::Busy);
        }
        if !state.available_formats().contains(&format) {
            return Err(SelectionError::Unavailable(format));
        }
        state.output_format = Some(format);
        Ok(())
    }

    pub async fn select_level(&self, level: CompressionLevel) -> Result<(), SelectionError> {
        let mut state = self.state.lock().await;
        if state.converting {
            return Err(SelectionError::Busy);
        }
        state.compression_level = Some(level);
        Ok(())
    }

    pub async fn available_formats(&self) -> Vec<TargetFormat> {
        self.state.lock().await.available_formats()
    }

    pub async fn is_converting(&self) -> bool {
        self.state.lock().await.converting
    }

    pub async fn primary_action(&self) -> PrimaryAction {
        self.state.lock().await.primary_action()
    }

    /// Live result handles; drops back to zero after a reset.
    pub async fn live_results(&self) -> usize {
        self.state.lock().await.results.live_count()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            mode: state.mode,
            output_format: state.output_format,
            compression_level: state.compression_level,
            converting: state.converting,
            status_message: state.status_message.clone(),
            primary_action: state.primary_action(),
            primary_label: state.primary_label(),
            available_formats: state.available_formats(),
            files: state.tasks.iter().map(FileTask::snapshot).collect(),
        }
    }

    /// Runs every task that is not done yet, one after another in the order
    /// they were added. A failing task is reported and left idle; the rest of
    /// the batch carries on.
    pub async fn process(&self) -> Result<BatchReport, DispatchError> {
        let (ids, mode, format, level, generation) = {
            let mut state = self.state.lock().await;
            if state.converting {
                return Err(DispatchError::Busy);
            }
            if state.tasks.is_empty() {
                return Err(DispatchError::NoFiles);
            }
            match state.mode {
                Mode::Convert if state.output_format.is_none() => {
                    self.notifier.warning(DispatchError::NoFormat.to_string());
                    return Err(DispatchError::NoFormat);
                }
                Mode::Compress if state.compression_level.is_none() => {
                    self.notifier.warning(DispatchError::NoLevel.to_string());
                    return Err(DispatchError::NoLevel);
                }
                _ => {}
            }

            state.converting = true;
            state.status_message = Some(match state.mode {
                Mode::Convert => FUN_MESSAGES
                    .choose(&mut rand::rng())
                    .copied()
                    .unwrap_or(FUN_MESSAGES[0])
                    .to_string(),
                Mode::Compress => COMPRESS_MESSAGE.to_string(),
            });

            let ids: Vec<Uuid> = state
                .tasks
                .iter()
                .filter(|t| t.status != TaskStatus::Done)
                .map(|t| t.id)
                .collect();
            (
                ids,
                state.mode,
                state.output_format,
                state.compression_level,
                state.generation,
            )
        };

        let mut guard = BatchGuard {
            state: Arc::clone(&self.state),
            progress: self.progress.clone(),
            generation,
            current: None,
            armed: true,
        };

        info!("processing {} file(s) in {} mode", ids.len(), mode);
        let mut report = BatchReport::default();

        for id in ids {
            let work = {
                let mut state = self.state.lock().await;
                if state.generation != generation {
                    guard.disarm();
                    report.abandoned = true;
                    return Ok(report);
                }
                let Some(task) = state.task_mut(id) else {
                    debug!("{} was removed before its turn", id);
                    continue;
                };
                if task.status != TaskStatus::Idle {
                    continue;
                }
                task.start();
                publish(&self.progress, task);
                guard.current = Some(id);
                PendingWork {
                    name: task.original_name.clone(),
                    kind: task.kind,
                    bytes: task.bytes.clone(),
                }
            };

            let outcome = self
                .run(id, &work, mode, format, level, generation)
                .await;

            let mut state = self.state.lock().await;
            if state.generation != generation {
                guard.disarm();
                report.abandoned = true;
                return Ok(report);
            }

            guard.current = None;
            let SessionState { tasks, results, .. } = &mut *state;
            match outcome {
                Ok((bytes, compressed_size)) => {
                    if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                        task.finish(results.create(bytes), compressed_size);
                        publish(&self.progress, task);
                        report.completed.push(id);
                    }
                }
                Err(e) => {
                    warn!("failed to process {}: {:#}", work.name, e);
                    if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                        task.fail();
                        publish(&self.progress, task);
                    }
                    report.failed.push(id);
                    self.notifier.error(format!("Failed to process {}", work.name));
                }
            }
        }

        let mut state = self.state.lock().await;
        guard.disarm();
        if state.generation != generation {
            report.abandoned = true;
            return Ok(report);
        }
        state.converting = false;
        state.status_message = None;
        drop(state);

        info!(
            "batch finished: {} done, {} failed",
            report.completed.len(),
            report.failed.len()
        );
        self.notifier.success(mode.completion_message());
        Ok(report)
    }

    async fn run(
        &self,
        id: Uuid,
        work: &PendingWork,
        mode: Mode,
        format: Option<TargetFormat>,
        level: Option<CompressionLevel>,
        generation: u64,
    ) -> anyhow::Result<(Arc<[u8]>, Option<u64>)> {
        if mode == Mode::Compress && work.kind == MediaKind::Image {
            self.set_progress(id, 30, generation).await;
            let bytes = work.bytes.clone();
            let compressed =
                tokio::task::spawn_blocking(move || compress_image(&bytes, level)).await??;
            self.set_progress(id, 70, generation).await;

            let size = compressed.bytes.len() as u64;
            debug!(
                "{}: {:?} {}x{}, {} -> {} bytes",
                work.name,
                compressed.format,
                compressed.width,
                compressed.height,
                work.bytes.len(),
                size
            );
            return Ok((Arc::from(compressed.bytes), Some(size)));
        }

        let target = match mode {
            Mode::Convert => format,
            Mode::Compress => None,
        };
        let bytes = self
            .provider
            .convert(ConversionRequest {
                name: work.name.clone(),
                kind: work.kind,
                bytes: work.bytes.clone(),
                target,
            })
            .await?;
        Ok((bytes, None))
    }

    async fn set_progress(&self, id: Uuid, progress: u8, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        if let Some(task) = state.task_mut(id) {
            task.set_progress(progress);
            publish(&self.progress, task);
        }
    }

    /// Packages every finished result. `None` when nothing is done yet.
    pub async fn export(&self) -> Result<Option<Export>, ExportError> {
        let files = {
            let state = self.state.lock().await;
            let mut files = Vec::new();
            for task in state.tasks.iter().filter(|t| t.status == TaskStatus::Done) {
                let Some(bytes) = task.result.as_ref().and_then(|h| state.results.resolve(h)) else {
                    continue;
                };
                let extension = match (state.mode, state.output_format) {
                    (Mode::Convert, Some(format)) => format.extension(),
                    _ => original_extension(&task.original_name),
                };
                files.push((download_name(&task.original_name, &extension), bytes));
            }
            (files, state.mode)
        };

        let (mut files, mode) = files;
        match files.len() {
            0 => Ok(None),
            1 => {
                let (name, bytes) = files.remove(0);
                Ok(Some(Export::File { name, bytes }))
            }
            _ => {
                let (bytes, entries) = build_archive(files)?;
                Ok(Some(Export::Archive {
                    name: mode.archive_name().to_string(),
                    bytes,
                    entries,
                }))
            }
        }
    }

    /// Clears every file and selection. Mode is kept. Safe to call at any
    /// time, including mid-batch: the running batch discards its work.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let tasks = std::mem::take(&mut state.tasks);
        let mut released = 0;
        for mut task in tasks {
            if let Some(handle) = task.result.take() {
                if state.results.revoke(handle) {
                    released += 1;
                }
            }
        }
        state.output_format = None;
        state.compression_level = None;
        state.converting = false;
        state.status_message = None;
        state.generation += 1;
        debug!("session reset, released {} result(s)", released);
    }
}
