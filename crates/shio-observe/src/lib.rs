//! shio-observe: observability ABI for the shio log engine.
//!
//! The engine emits typed lifecycle events through the [`Meter`] trait and
//! never inspects them again; backends (exporters, live dashboards, test
//! collectors) decide what each event becomes. Record payloads are never
//! included in an event.

/// Sink for log engine lifecycle events.
pub trait Meter: Send + Sync + 'static {
    fn emit(&self, evt: WalEvent);
}

/// Meter that drops every event, for embedders without telemetry.
#[derive(Clone, Copy, Default)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn emit(&self, _evt: WalEvent) {}
}

/// Typed lifecycle events from the log engine.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum WalEvent {
    /// The tail segment rolled over to a new file.
    SegmentRoll { segment_id: u64, start_offset: u64 },
    /// A flush + fsync of the tail completed.
    Fsync { micros: u64 },
    /// Retention deleted the oldest segment.
    SegmentGc { segment_id: u64 },
    /// Recovery cut a partial frame off the tail.
    TailTruncated { bytes: u64 },
}
