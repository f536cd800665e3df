//! Playback state machine
//!
//! Drives a recorded sequence at a fixed cadence: every tick consumes the
//! prefetched result for the cursor (or falls back to a direct fetch),
//! evaluates it, and emits it as the current frame. All mutable state lives
//! in a single driver task, so ticks are serialized by construction and a
//! slow fetch can never overlap the next tick.

use crate::error::StreamError;
use crate::evaluate::{DelayPolicy, FrameEvaluator, StreamedFrame};
use crate::fetch::RetryPolicy;
use crate::frame_fetcher::FrameFetcher;
use crate::manifest::Manifest;
use crate::prefetch::PrefetchScheduler;
use crate::source::FrameSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Fallback playback rate when neither the caller nor the manifest says.
const DEFAULT_FPS: f64 = 10.0;

/// Playback status as exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Stopped,
    Playing,
    Paused,
    Error,
}

/// Per-sequence playback configuration.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Playback rate override; falls back to the manifest fps, then 10.
    pub fps: Option<f64>,
    /// Prefetch window size.
    pub prefetch_count: usize,
    /// Wrap back to frame 0 at the end of the sequence.
    pub looping: bool,
    /// Consecutive misses before playback halts with an error.
    pub max_misses: u32,
    /// Minimum detection score admitted to classification.
    pub min_score: f64,
    /// IoU threshold for tp/fp assignment.
    pub iou_threshold: f64,
    /// Branch evaluated against delayed ground truth, if any.
    pub baseline_branch: Option<String>,
    pub delay: Option<DelayPolicy>,
    pub retry: RetryPolicy,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            fps: None,
            prefetch_count: 4,
            looping: false,
            max_misses: 3,
            min_score: 0.3,
            iou_threshold: boxeval::DEFAULT_IOU_THRESHOLD,
            baseline_branch: None,
            delay: None,
            retry: RetryPolicy::default(),
        }
    }
}

enum Command {
    Start {
        manifest: Box<Manifest>,
        options: StreamOptions,
    },
    Pause,
    Resume,
    Seek(usize),
    Stop,
}

/// Handle to the playback driver task.
///
/// Outputs are watch channels: the latest frame (`None` when nothing is
/// playing), the status, and the latest error message. Dropping the
/// controller shuts the driver down and cancels outstanding prefetches.
pub struct StreamController {
    command_tx: mpsc::UnboundedSender<Command>,
    frame_rx: watch::Receiver<Option<Arc<StreamedFrame>>>,
    status_rx: watch::Receiver<StreamStatus>,
    error_rx: watch::Receiver<Option<String>>,
}

impl StreamController {
    /// Spawn the driver task for `source`.
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(StreamStatus::Stopped);
        let (error_tx, error_rx) = watch::channel(None);

        let driver = Driver {
            source,
            command_rx,
            frame_tx,
            status_tx,
            error_tx,
            session: None,
            ticker: new_ticker(DEFAULT_FPS),
        };
        tokio::spawn(driver.run());

        Self {
            command_tx,
            frame_rx,
            status_rx,
            error_rx,
        }
    }

    /// Begin playback of `manifest` from frame 0, replacing any prior
    /// sequence.
    pub fn start(&self, manifest: Manifest, options: StreamOptions) {
        let _ = self.command_tx.send(Command::Start {
            manifest: Box::new(manifest),
            options,
        });
    }

    pub fn pause(&self) {
        let _ = self.command_tx.send(Command::Pause);
    }

    pub fn resume(&self) {
        let _ = self.command_tx.send(Command::Resume);
    }

    /// Move the cursor; the index is clamped into the sequence bounds.
    pub fn seek(&self, index: usize) {
        let _ = self.command_tx.send(Command::Seek(index));
    }

    pub fn stop(&self) {
        let _ = self.command_tx.send(Command::Stop);
    }

    /// Current-frame observable.
    pub fn frames(&self) -> watch::Receiver<Option<Arc<StreamedFrame>>> {
        self.frame_rx.clone()
    }

    /// Status observable.
    pub fn status(&self) -> watch::Receiver<StreamStatus> {
        self.status_rx.clone()
    }

    /// Latest-error observable; `None` once playback recovers.
    pub fn errors(&self) -> watch::Receiver<Option<String>> {
        self.error_rx.clone()
    }
}

/// Everything tied to one started sequence.
struct Session {
    fetcher: Arc<FrameFetcher>,
    scheduler: PrefetchScheduler,
    evaluator: FrameEvaluator,
    cursor: usize,
    misses: u32,
    looping: bool,
    max_misses: u32,
}

/// The driver task: sole owner of playback state.
struct Driver {
    source: Arc<dyn FrameSource>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    frame_tx: watch::Sender<Option<Arc<StreamedFrame>>>,
    status_tx: watch::Sender<StreamStatus>,
    error_tx: watch::Sender<Option<String>>,
    session: Option<Session>,
    ticker: tokio::time::Interval,
}

fn new_ticker(fps: f64) -> tokio::time::Interval {
    let period = Duration::from_secs_f64(1.0 / fps.max(0.001));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl Driver {
    async fn run(mut self) {
        log::info!("stream driver started");
        loop {
            let playing =
                self.session.is_some() && *self.status_tx.borrow() == StreamStatus::Playing;
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break, // controller dropped
                },
                _ = self.ticker.tick(), if playing => self.tick().await,
            }
        }
        if let Some(session) = self.session.as_mut() {
            session.scheduler.cancel_all();
        }
        log::info!("stream driver stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { manifest, options } => self.start(*manifest, options),
            Command::Pause => {
                if *self.status_tx.borrow() == StreamStatus::Playing {
                    log::info!("playback paused");
                    self.status_tx.send_replace(StreamStatus::Paused);
                }
            }
            Command::Resume => self.resume(),
            Command::Seek(index) => self.seek(index),
            Command::Stop => self.stop(),
        }
    }

    fn start(&mut self, manifest: Manifest, options: StreamOptions) {
        // Tear down any previous sequence first.
        if let Some(session) = self.session.as_mut() {
            session.scheduler.cancel_all();
        }

        let fps = options.fps.or(manifest.fps).unwrap_or(DEFAULT_FPS);
        let fetcher = Arc::new(FrameFetcher::new(
            self.source.clone(),
            &manifest,
            options.retry.clone(),
            options.min_score,
        ));
        let mut scheduler =
            PrefetchScheduler::new(fetcher.clone(), options.prefetch_count, options.looping);
        scheduler.schedule(0);

        log::info!(
            "starting sequence '{}' ({} frames, {} fps, window {})",
            manifest.sequence_id,
            manifest.frame_count(),
            fps,
            options.prefetch_count
        );

        self.session = Some(Session {
            fetcher,
            scheduler,
            evaluator: FrameEvaluator::new(
                options.iou_threshold,
                options.baseline_branch,
                options.delay,
            ),
            cursor: 0,
            misses: 0,
            looping: options.looping,
            max_misses: options.max_misses,
        });
        self.ticker = new_ticker(fps);
        self.frame_tx.send_replace(None);
        self.error_tx.send_replace(None);
        self.status_tx.send_replace(StreamStatus::Playing);
    }

    fn resume(&mut self) {
        if self.session.is_none() {
            log::warn!("resume ignored: no sequence started");
            return;
        }
        let status = *self.status_tx.borrow();
        if status == StreamStatus::Paused || status == StreamStatus::Error {
            if let Some(session) = self.session.as_mut() {
                session.misses = 0;
            }
            self.error_tx.send_replace(None);
            self.ticker.reset();
            self.status_tx.send_replace(StreamStatus::Playing);
            log::info!("playback resumed");
        }
    }

    fn seek(&mut self, index: usize) {
        let Some(session) = self.session.as_mut() else {
            log::warn!("seek ignored: no sequence started");
            return;
        };
        let count = session.fetcher.frame_count();
        let target = index.min(count.saturating_sub(1));
        log::debug!("seeking to frame {target}");

        session.scheduler.cancel_all();
        session.cursor = target;
        session.misses = 0;
        session.evaluator.reset();
        session.scheduler.schedule(target);
        self.error_tx.send_replace(None);
    }

    fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.scheduler.cancel_all();
        }
        self.frame_tx.send_replace(None);
        self.error_tx.send_replace(None);
        self.status_tx.send_replace(StreamStatus::Stopped);
        log::info!("playback stopped");
    }

    /// One playback step. Runs only while `Playing`; never re-entered.
    async fn tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if session.cursor >= session.fetcher.frame_count() {
            if session.looping {
                log::debug!("sequence end reached, looping to frame 0");
                session.cursor = 0;
                session.scheduler.cancel_all();
                session.evaluator.reset();
                session.scheduler.schedule(0);
            } else {
                log::info!("sequence end reached");
                // Natural end keeps the last frame on screen; only an
                // explicit stop clears it.
                if let Some(mut session) = self.session.take() {
                    session.scheduler.cancel_all();
                }
                self.status_tx.send_replace(StreamStatus::Stopped);
                return;
            }
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let cursor = session.cursor;

        let result = match session.scheduler.consume(cursor) {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(join_error) if join_error.is_cancelled() => Err(StreamError::Cancelled),
                Err(join_error) => Err(StreamError::transport(format!(
                    "prefetch task failed: {join_error}"
                ))),
            },
            None => {
                log::debug!("frame {cursor} not prefetched, fetching directly");
                session.fetcher.fetch_frame(cursor).await
            }
        };

        match result {
            Ok(raw) => {
                let frame = session.evaluator.evaluate(raw);
                session.misses = 0;
                self.error_tx.send_replace(None);
                self.frame_tx.send_replace(Some(Arc::new(frame)));
            }
            Err(error) if error.is_cancelled() => {
                // Expected teardown noise, not a miss.
                log::debug!("fetch for frame {cursor} was cancelled");
            }
            Err(error) => {
                session.misses += 1;
                log::warn!(
                    "frame {} failed to load ({} of {} consecutive misses allowed): {}",
                    cursor,
                    session.misses,
                    session.max_misses,
                    error
                );
                if session.misses >= session.max_misses {
                    let message = format!(
                        "playback halted after {} consecutive frame misses",
                        session.misses
                    );
                    log::error!("{message}");
                    self.error_tx.send_replace(Some(message));
                    self.status_tx.send_replace(StreamStatus::Error);
                }
            }
        }

        session.cursor += 1;
        session.scheduler.schedule(session.cursor);
    }
}
