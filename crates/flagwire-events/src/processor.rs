// crates/flagwire-events/src/processor.rs
// ============================================================================
// Module: Flagwire Event Processor
// Description: Queue-fed worker buffering events and feeding the summarizer.
// Purpose: Move event recording off caller threads onto one owner thread.
// Dependencies: flagwire-core, tokio, tracing
// ============================================================================

//! ## Overview
//! Callers on any thread hand events to an unbounded channel; a single
//! worker thread owns the buffer and the summarizer, so the summarizer
//! itself needs no locking. Evaluation events are always summarized
//! (unless excluded) and buffered as full events only when the flag tracks
//! them and sampling keeps them. `flush` swaps out the buffer and summary
//! and returns them to the caller; delivery is the host's concern.
//! Invariants:
//! - Buffer overflow drops new events and warns once per flush interval.
//! - `close` drains the queue and stops the worker.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tracing::warn;

use crate::event::CustomEvent;
use crate::event::EvaluationEvent;
use crate::event::EventInput;
use crate::event::IdentifyEvent;
use crate::event::MigrationOpEvent;
use crate::sampling::sample_ratio;
use crate::summary::EventSummarizer;
use crate::summary::EventSummary;

// ============================================================================
// SECTION: Interface
// ============================================================================

/// One flush interval's worth of buffered events and counters.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    /// Buffered full events in arrival order.
    pub events: Vec<EventInput>,
    /// Summary counters for the interval.
    pub summary: EventSummary,
}

/// Accepts analytics events from any thread.
pub trait EventProcessor: Send + Sync {
    /// Records one flag evaluation.
    fn record_evaluation_event(&self, event: EvaluationEvent);

    /// Records a context registration.
    fn record_identify_event(&self, event: IdentifyEvent);

    /// Records a custom event.
    fn record_custom_event(&self, event: CustomEvent);

    /// Records a migration operation.
    fn record_migration_event(&self, event: MigrationOpEvent);

    /// Returns everything buffered since the previous flush.
    ///
    /// `None` means the worker has stopped.
    fn flush(&self) -> Option<EventBatch>;

    /// Stops the worker after draining pending events.
    fn close(&self);
}

// ============================================================================
// SECTION: Default Processor
// ============================================================================

/// Messages crossing the producer/worker boundary.
enum Message {
    /// One event to record.
    Record(Box<EventInput>),
    /// Flush request with its reply channel.
    Flush(mpsc::Sender<EventBatch>),
    /// Stop the worker.
    Close,
}

/// The default queue-fed event processor.
///
/// # Invariants
/// - Exactly one worker thread owns the buffer and summarizer.
pub struct DefaultEventProcessor {
    /// Producer side of the event queue.
    sender: UnboundedSender<Message>,
    /// Worker join handle, taken on close.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DefaultEventProcessor {
    /// Creates a processor whose buffer holds at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, mut receiver) = unbounded_channel();
        let worker = std::thread::spawn(move || {
            let mut buffer: Vec<EventInput> = Vec::new();
            let mut summarizer = EventSummarizer::new();
            let mut overflow_warned = false;
            while let Some(message) = receiver.blocking_recv() {
                match message {
                    Message::Record(event) => {
                        record(&mut buffer, &mut summarizer, capacity, &mut overflow_warned, *event);
                    }
                    Message::Flush(reply) => {
                        let batch = EventBatch {
                            events: std::mem::take(&mut buffer),
                            summary: summarizer.snapshot(),
                        };
                        summarizer.clear();
                        overflow_warned = false;
                        let _ = reply.send(batch);
                    }
                    Message::Close => break,
                }
            }
        });
        Self {
            sender,
            worker: Mutex::new(Some(worker)),
        }
    }
}

/// Worker-side handling of one event.
fn record(
    buffer: &mut Vec<EventInput>,
    summarizer: &mut EventSummarizer,
    capacity: usize,
    overflow_warned: &mut bool,
    event: EventInput,
) {
    let buffered = match event {
        EventInput::Evaluation(evaluation) => {
            summarizer.summarize(&evaluation);
            if evaluation.track_events && sample_ratio(evaluation.sampling_ratio) {
                Some(EventInput::Evaluation(evaluation))
            } else {
                None
            }
        }
        EventInput::MigrationOp(migration) => {
            sample_ratio(migration.sampling_ratio).then_some(EventInput::MigrationOp(migration))
        }
        other => Some(other),
    };
    let Some(event) = buffered else {
        return;
    };
    if buffer.len() >= capacity {
        if !*overflow_warned {
            warn!(capacity, "event buffer is full; dropping events until the next flush");
            *overflow_warned = true;
        }
        return;
    }
    buffer.push(event);
}

impl EventProcessor for DefaultEventProcessor {
    fn record_evaluation_event(&self, event: EvaluationEvent) {
        let _ = self.sender.send(Message::Record(Box::new(EventInput::Evaluation(event))));
    }

    fn record_identify_event(&self, event: IdentifyEvent) {
        let _ = self.sender.send(Message::Record(Box::new(EventInput::Identify(event))));
    }

    fn record_custom_event(&self, event: CustomEvent) {
        let _ = self.sender.send(Message::Record(Box::new(EventInput::Custom(event))));
    }

    fn record_migration_event(&self, event: MigrationOpEvent) {
        let _ = self.sender.send(Message::Record(Box::new(EventInput::MigrationOp(event))));
    }

    fn flush(&self) -> Option<EventBatch> {
        let (reply, result) = mpsc::channel();
        self.sender.send(Message::Flush(reply)).ok()?;
        result.recv_timeout(Duration::from_secs(5)).ok()
    }

    fn close(&self) {
        let _ = self.sender.send(Message::Close);
        if let Ok(mut worker) = self.worker.lock()
            && let Some(handle) = worker.take()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for DefaultEventProcessor {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Close);
    }
}
