//! Per-request phase timing
//!
//! The fetch layer reports phase transitions as [`PhaseMark`]s. A
//! [`PhaseClock`] belongs to exactly one in-flight request: start marks are
//! remembered, done marks produce a duration that is written into the node's
//! [`PhaseTiming`].

use std::time::{Duration, Instant};

use crate::tree::PhaseTiming;

/// A phase transition reported by the fetch layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseEvent {
    DnsStart,
    DnsDone,
    ConnectStart,
    ConnectDone,
    TlsStart,
    TlsDone,
    FirstByte,
    Downloaded,
}

/// A phase transition and when it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseMark {
    pub event: PhaseEvent,
    pub at: Instant,
}

impl PhaseMark {
    pub fn new(event: PhaseEvent, at: Instant) -> Self {
        Self { event, at }
    }

    pub fn now(event: PhaseEvent) -> Self {
        Self::new(event, Instant::now())
    }
}

/// Start timestamps for the request currently in flight
#[derive(Debug, Clone, Copy)]
pub struct PhaseClock {
    started: Instant,
    dns: Option<Instant>,
    connect: Option<Instant>,
    tls: Option<Instant>,
    first_byte: Option<Instant>,
}

impl PhaseClock {
    pub fn start(at: Instant) -> Self {
        Self {
            started: at,
            dns: None,
            connect: None,
            tls: None,
            first_byte: None,
        }
    }

    /// Applies one phase transition to `timing`
    ///
    /// Done events without a matching start are ignored.
    pub fn apply(&mut self, mark: PhaseMark, timing: &mut PhaseTiming) {
        let at = mark.at;
        match mark.event {
            PhaseEvent::DnsStart => self.dns = Some(at),
            PhaseEvent::ConnectStart => self.connect = Some(at),
            PhaseEvent::TlsStart => self.tls = Some(at),
            PhaseEvent::DnsDone => {
                if let Some(d) = elapsed(self.dns, at) {
                    timing.dns = d;
                }
            }
            PhaseEvent::ConnectDone => {
                if let Some(d) = elapsed(self.connect, at) {
                    timing.connect = d;
                }
            }
            PhaseEvent::TlsDone => {
                if let Some(d) = elapsed(self.tls, at) {
                    timing.tls_handshake = d;
                }
            }
            PhaseEvent::FirstByte => {
                self.first_byte = Some(at);
                timing.first_byte = at.saturating_duration_since(self.started);
            }
            PhaseEvent::Downloaded => {
                if let Some(d) = elapsed(self.first_byte, at) {
                    timing.download = d;
                }
            }
        }
    }
}

fn elapsed(start: Option<Instant>, end: Instant) -> Option<Duration> {
    start.map(|s| end.saturating_duration_since(s))
}
