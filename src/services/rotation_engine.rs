//! Circular wallpaper rotation
//!
//! The engine owns the playback queue and runs as a single task consuming
//! commands and timer ticks from one `select!` loop, so tick handling can
//! never overlap command handling or another tick. Observers receive
//! [`RotationSnapshot`]s through a watch channel.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use photos_picker::{BearerTokenProvider, BlobCache, DownloadError, ImageFetcher, Photo};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::services::display::WallpaperTarget;

/// Error type for rotation control operations
#[derive(Debug)]
pub enum RotationError {
    /// The engine task is no longer running
    EngineUnavailable,
}

impl std::fmt::Display for RotationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationError::EngineUnavailable => write!(f, "Rotation engine is not running"),
        }
    }
}

impl std::error::Error for RotationError {}

/// Source of local full-resolution image files for the engine to apply
pub trait WallpaperSource: Send + Sync + 'static {
    fn full_resolution_file(
        &self,
        photo: &Photo,
    ) -> impl Future<Output = Result<PathBuf, DownloadError>> + Send;
}

impl<T, C> WallpaperSource for Arc<ImageFetcher<T, C>>
where
    T: BearerTokenProvider + 'static,
    C: BlobCache + 'static,
{
    fn full_resolution_file(
        &self,
        photo: &Photo,
    ) -> impl Future<Output = Result<PathBuf, DownloadError>> + Send {
        ImageFetcher::full_resolution_file(self.as_ref(), photo)
    }
}

/// The rotation queue state
///
/// Invariants: `current_index` is `0` whenever `photos` is empty, and
/// `0 <= current_index < photos.len()` otherwise.
#[derive(Debug, Clone, Default)]
pub struct RotationState {
    pub active: bool,
    pub paused: bool,
    pub current_index: usize,
    pub photos: Vec<Photo>,
    pub interval: Duration,
    pub last_rotation_at: Option<DateTime<Utc>>,
}

impl RotationState {
    /// The photo currently on the displays; undefined (not an error) while
    /// the queue is empty
    pub fn current_photo(&self) -> Option<&Photo> {
        self.photos.get(self.current_index)
    }

    /// Circular advance: wraps after the last photo back to the first, so
    /// advancing `photos.len()` times returns to the starting index.
    /// A no-op on an empty queue.
    pub fn advance(&mut self) {
        if self.photos.is_empty() {
            return;
        }
        self.current_index = (self.current_index + 1) % self.photos.len();
        self.last_rotation_at = Some(Utc::now());
    }

    fn begin(&mut self, photos: Vec<Photo>, interval: Duration) {
        self.active = true;
        self.paused = false;
        self.current_index = 0;
        self.photos = photos;
        self.interval = interval;
        self.last_rotation_at = None;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn snapshot(&self) -> RotationSnapshot {
        RotationSnapshot {
            active: self.active,
            paused: self.paused,
            current_index: self.current_index,
            photo_count: self.photos.len(),
            current_photo_id: self.current_photo().map(|p| p.id.clone()),
            last_rotation_at: self.last_rotation_at,
        }
    }
}

/// Observable state emitted on every transition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RotationSnapshot {
    pub active: bool,
    pub paused: bool,
    pub current_index: usize,
    pub photo_count: usize,
    pub current_photo_id: Option<String>,
    pub last_rotation_at: Option<DateTime<Utc>>,
}

enum Command {
    Start {
        photos: Vec<Photo>,
        interval: Duration,
    },
    Pause,
    Resume,
    Stop,
    DisplaysChanged,
}

/// Cloneable control surface for the engine task
#[derive(Clone)]
pub struct RotationHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<RotationSnapshot>,
}

impl RotationHandle {
    pub async fn start(
        &self,
        photos: Vec<Photo>,
        interval: Duration,
    ) -> Result<(), RotationError> {
        self.send(Command::Start { photos, interval }).await
    }

    pub async fn pause(&self) -> Result<(), RotationError> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<(), RotationError> {
        self.send(Command::Resume).await
    }

    pub async fn stop(&self) -> Result<(), RotationError> {
        self.send(Command::Stop).await
    }

    /// Notify the engine that displays were connected or disconnected; the
    /// current photo is re-applied without advancing the queue
    pub async fn displays_changed(&self) -> Result<(), RotationError> {
        self.send(Command::DisplaysChanged).await
    }

    pub fn subscribe(&self) -> watch::Receiver<RotationSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> RotationSnapshot {
        self.snapshots.borrow().clone()
    }

    async fn send(&self, command: Command) -> Result<(), RotationError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RotationError::EngineUnavailable)
    }
}

/// The engine itself; owns the state exclusively for its whole lifetime
pub struct RotationEngine<S: WallpaperSource, W: WallpaperTarget> {
    source: S,
    target: W,
    state: RotationState,
    snapshots: watch::Sender<RotationSnapshot>,
}

impl<S: WallpaperSource, W: WallpaperTarget> RotationEngine<S, W> {
    /// Spawn the engine task and return its control handle
    pub fn spawn(source: S, target: W) -> RotationHandle {
        let (commands, receiver) = mpsc::channel(16);
        let (snapshots, snapshot_rx) = watch::channel(RotationSnapshot::default());

        let engine = RotationEngine {
            source,
            target,
            state: RotationState::default(),
            snapshots,
        };
        tokio::spawn(engine.run(receiver));

        RotationHandle {
            commands,
            snapshots: snapshot_rx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        // Deadline of the next advance; None while stopped or paused
        let mut next_tick_at: Option<Instant> = None;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &mut next_tick_at).await,
                    None => break, // every handle dropped
                },
                _ = sleep_until_deadline(next_tick_at), if next_tick_at.is_some() => {
                    self.on_tick().await;
                    // Scheduling the next tick after the work completes keeps
                    // ticks from bunching up when a download overruns.
                    next_tick_at = Some(Instant::now() + self.state.interval);
                }
            }
        }

        log::debug!("Rotation engine task exiting");
    }

    async fn handle_command(&mut self, command: Command, next_tick_at: &mut Option<Instant>) {
        match command {
            Command::Start { photos, interval } => {
                if photos.is_empty() {
                    // Starting with nothing to show is not an error; the UI
                    // normally disables the action. Refuse quietly.
                    log::warn!("Rotation start requested with an empty photo queue; ignoring");
                    return;
                }
                self.state.begin(photos, interval);
                self.publish();
                log::info!(
                    "Rotation started: {} photos every {:?}",
                    self.state.photos.len(),
                    interval
                );
                // The first photo goes up immediately; the timer only governs
                // subsequent advances.
                self.apply_current().await;
                *next_tick_at = Some(Instant::now() + interval);
            }
            Command::Pause => {
                if self.state.active && !self.state.paused {
                    // Cancel the pending tick so nothing fires while paused
                    *next_tick_at = None;
                    self.state.paused = true;
                    self.publish();
                    log::info!("Rotation paused");
                }
            }
            Command::Resume => {
                if self.state.active && self.state.paused {
                    self.state.paused = false;
                    // Re-arm with the original interval; no photo advances or
                    // re-applies until the next natural tick
                    *next_tick_at = Some(Instant::now() + self.state.interval);
                    self.publish();
                    log::info!("Rotation resumed");
                }
            }
            Command::Stop => {
                *next_tick_at = None;
                self.state.reset();
                self.publish();
                log::info!("Rotation stopped");
            }
            Command::DisplaysChanged => {
                if self.state.active && self.state.current_photo().is_some() {
                    log::info!("Display topology changed; re-applying current photo");
                    self.apply_current().await;
                }
            }
        }
    }

    async fn on_tick(&mut self) {
        if self.state.photos.is_empty() {
            return;
        }
        self.state.advance();
        self.publish();
        self.apply_current().await;
    }

    /// Download-and-apply for the current photo. Failures are logged and
    /// swallowed: one bad photo must not halt the queue, and rotation keeps
    /// attempting subsequent ticks.
    async fn apply_current(&mut self) {
        let photo = match self.state.current_photo() {
            Some(photo) => photo.clone(),
            None => return,
        };

        let file = match self.source.full_resolution_file(&photo).await {
            Ok(file) => file,
            Err(e) => {
                log::error!("Failed to download photo {}: {}", photo.id, e);
                return;
            }
        };

        if let Err(e) = self.target.apply(&file) {
            log::error!("Failed to apply wallpaper for photo {}: {}", photo.id, e);
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.state.snapshot());
    }
}

fn sleep_until_deadline(deadline: Option<Instant>) -> tokio::time::Sleep {
    // The `if` guard on the select branch keeps this from being polled when
    // there is no deadline; the fallback instant is never awaited.
    tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now))
}
