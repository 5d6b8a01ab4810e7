//! Live tracking with one worker thread per source.
//!
//! Each worker owns its source's [`SourceState`] exclusively. Track creations
//! and frame completions from all workers funnel into a single aggregator
//! thread, the only writer of [`UniqueCounts`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::error::{LiveError, OutOfOrderFrame};
use crate::tracker::{Frame, FrameUpdate, SourceState, TrackCreated, TrackerConfig, UniqueCounts};

enum AggregateMsg {
    Created(TrackCreated),
    FrameDone,
    Snapshot(Sender<UniqueCounts>),
}

/// What one source worker produced.
#[derive(Debug, Clone, Default)]
pub struct SourceOutcome {
    pub updates: Vec<FrameUpdate>,
    /// Frames refused because they were older than the last processed one
    pub skipped: Vec<OutOfOrderFrame>,
}

#[derive(Debug, Clone)]
pub struct LiveReport {
    pub counts: UniqueCounts,
    pub sources: BTreeMap<String, SourceOutcome>,
}

struct Worker {
    frames: Sender<Frame>,
    handle: JoinHandle<SourceOutcome>,
}

pub struct LiveTracker {
    config: Arc<TrackerConfig>,
    workers: BTreeMap<String, Worker>,
    aggregate: Sender<AggregateMsg>,
    aggregator: JoinHandle<UniqueCounts>,
}

impl LiveTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, LiveError> {
        config.validate()?;
        let (aggregate, rx) = unbounded();
        let counts = UniqueCounts::new(config.person_label.clone());
        let aggregator = thread::Builder::new()
            .name("framedup-aggregator".to_string())
            .spawn(move || aggregator_thread(rx, counts))?;
        Ok(Self {
            config: Arc::new(config),
            workers: BTreeMap::new(),
            aggregate,
            aggregator,
        })
    }

    /// Queue a frame on its source's worker, starting the worker on first use.
    ///
    /// Frames of one source must be submitted in timestamp order; an older
    /// frame is skipped by the worker and reported in [`SourceOutcome`].
    pub fn submit(&mut self, frame: Frame) -> Result<(), LiveError> {
        if !self.workers.contains_key(&frame.source_id) {
            let worker = self.spawn_worker(&frame.source_id)?;
            self.workers.insert(frame.source_id.clone(), worker);
        }
        let source_id = frame.source_id.clone();
        let worker = self
            .workers
            .get(&source_id)
            .ok_or_else(|| LiveError::WorkerStopped(source_id.clone()))?;
        worker
            .frames
            .send(frame)
            .map_err(|_| LiveError::WorkerStopped(source_id))
    }

    fn spawn_worker(&self, source_id: &str) -> Result<Worker, LiveError> {
        log::debug!("starting worker for source {source_id}");
        let (frames, rx) = unbounded();
        let state = SourceState::new(source_id);
        let config = Arc::clone(&self.config);
        let aggregate = self.aggregate.clone();
        let handle = thread::Builder::new()
            .name(format!("framedup-{source_id}"))
            .spawn(move || worker_thread(rx, aggregate, state, config))?;
        Ok(Worker { frames, handle })
    }

    /// Counters as of the messages the aggregator has drained so far.
    ///
    /// Frames still queued on workers are not reflected.
    pub fn snapshot(&self) -> Result<UniqueCounts, LiveError> {
        let (reply, rx) = bounded(1);
        self.aggregate
            .send(AggregateMsg::Snapshot(reply))
            .map_err(|_| LiveError::AggregatorPanicked)?;
        rx.recv().map_err(|_| LiveError::AggregatorPanicked)
    }

    /// Drain every worker and the aggregator and return the final state.
    pub fn finish(self) -> Result<LiveReport, LiveError> {
        let LiveTracker {
            workers,
            aggregate,
            aggregator,
            ..
        } = self;

        let mut sources = BTreeMap::new();
        for (source_id, worker) in workers {
            drop(worker.frames);
            let outcome = worker
                .handle
                .join()
                .map_err(|_| LiveError::WorkerPanicked(source_id.clone()))?;
            sources.insert(source_id, outcome);
        }

        drop(aggregate);
        let counts = aggregator.join().map_err(|_| LiveError::AggregatorPanicked)?;
        Ok(LiveReport { counts, sources })
    }
}

fn worker_thread(
    rx: Receiver<Frame>,
    aggregate: Sender<AggregateMsg>,
    mut state: SourceState,
    config: Arc<TrackerConfig>,
) -> SourceOutcome {
    let mut outcome = SourceOutcome::default();
    while let Ok(frame) = rx.recv() {
        match state.advance(&frame, &config) {
            Ok(update) => {
                for event in &update.created {
                    // The aggregator outlives every worker.
                    let _ = aggregate.send(AggregateMsg::Created(event.clone()));
                }
                let _ = aggregate.send(AggregateMsg::FrameDone);
                outcome.updates.push(update);
            }
            Err(err) => {
                log::warn!("skipping frame: {err}");
                outcome.skipped.push(err);
            }
        }
    }
    outcome
}

fn aggregator_thread(rx: Receiver<AggregateMsg>, mut counts: UniqueCounts) -> UniqueCounts {
    while let Ok(msg) = rx.recv() {
        match msg {
            AggregateMsg::Created(event) => counts.apply(&event),
            AggregateMsg::FrameDone => counts.record_frame(),
            AggregateMsg::Snapshot(reply) => {
                let _ = reply.send(counts.clone());
            }
        }
    }
    counts
}
