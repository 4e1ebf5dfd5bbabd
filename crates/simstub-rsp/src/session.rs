//! RSP session state machine.

use std::sync::atomic::{AtomicBool, Ordering};

use simstub_target::{Execution, Signal, TargetAdapter};
use tracing::{debug, info, warn};

use crate::breakpoint::BreakpointSet;
use crate::error::SessionError;

/// Tunables for one debugger session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Largest packet payload we accept and send, advertised in `qSupported`.
    pub max_packet_size: usize,
    /// Consecutive NAKs tolerated for one frame before the session is dropped.
    pub max_retransmits: u32,
    /// Consecutive corrupt inbound frames tolerated before the session is dropped.
    pub max_framing_errors: u32,
    /// Run-length compress outgoing frames.
    pub compress_replies: bool,
    /// Halt the target as soon as a debugger attaches.
    pub halt_on_attach: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_packet_size: 4096,
            max_retransmits: 5,
            max_framing_errors: 10,
            compress_replies: false,
            halt_on_attach: true,
        }
    }
}

/// Why the target stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The program counter reached a breakpoint.
    Breakpoint,
    /// A single step completed.
    StepComplete,
    /// Interrupted by the debugger or by a target fault.
    Signal(Signal),
    /// The program exited with a status code.
    Exited(u8),
}

impl StopReason {
    /// The reason reported before the target has ever run.
    pub fn initial() -> Self {
        StopReason::Signal(Signal::TRAP)
    }

    /// The stop reply payload, e.g. `S05` or `W00`.
    pub fn to_payload(self) -> String {
        match self {
            StopReason::Breakpoint | StopReason::StepComplete => {
                format!("S{:02x}", Signal::TRAP.number())
            }
            StopReason::Signal(signal) => format!("S{:02x}", signal.number()),
            StopReason::Exited(code) => format!("W{code:02x}"),
        }
    }
}

/// The lifecycle state of a debugger session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No debugger attached.
    Idle,
    /// Attached, target halted, waiting for commands.
    Connected,
    /// The target is executing a continue or step.
    Running,
    /// Execution ceased; the reason is pending for the debugger.
    Stopped(StopReason),
}

/// Which kind of execution a resume performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeKind {
    /// Run until a breakpoint, interrupt, exit or fault.
    Continue,
    /// Execute exactly one instruction.
    Step,
}

/// A pending resume, produced by [`Session::resume`].
///
/// Running it drives the target synchronously until it stops. It carries
/// a snapshot of the breakpoint set so it can run on another thread while
/// the session keeps ownership of the original.
#[derive(Debug, Clone)]
pub struct ResumeRequest {
    kind: ResumeKind,
    address: Option<u64>,
    breakpoints: BreakpointSet,
}

impl ResumeRequest {
    /// Continue or step.
    pub fn kind(&self) -> ResumeKind {
        self.kind
    }

    /// Address execution resumes from, if the debugger supplied one.
    pub fn address(&self) -> Option<u64> {
        self.address
    }

    /// Execute on `target` until it stops.
    ///
    /// A continue checks `interrupt` and the breakpoint set before every
    /// instruction; the instruction at the resume address is always
    /// executed, so continuing from a breakpoint makes progress.
    pub fn run<T: TargetAdapter + ?Sized>(&self, target: &mut T, interrupt: &AtomicBool) -> StopReason {
        if let Some(address) = self.address {
            target.set_program_counter(address);
        }

        match self.kind {
            ResumeKind::Step => match target.step() {
                Ok(Execution::Executed) => StopReason::StepComplete,
                Ok(Execution::Exited(code)) => StopReason::Exited(code),
                Err(fault) => {
                    warn!(%fault, "target fault during step");
                    StopReason::Signal(fault.signal())
                }
            },
            ResumeKind::Continue => {
                let mut first = true;
                loop {
                    if interrupt.load(Ordering::Acquire) {
                        target.halt();
                        return StopReason::Signal(Signal::INT);
                    }
                    let pc = target.program_counter();
                    if !first && self.breakpoints.contains(pc) {
                        return StopReason::Breakpoint;
                    }
                    first = false;
                    match target.step() {
                        Ok(Execution::Executed) => {}
                        Ok(Execution::Exited(code)) => return StopReason::Exited(code),
                        Err(fault) => {
                            warn!(%fault, "target fault during continue");
                            return StopReason::Signal(fault.signal());
                        }
                    }
                }
            }
        }
    }
}

/// State of one debugger connection.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    last_stop: StopReason,
    breakpoints: BreakpointSet,
    last_sent: Option<Vec<u8>>,
    retransmits: u32,
    framing_errors: u32,
    packets_received: u64,
    packets_sent: u64,
}

impl Session {
    /// Create a session in the [`Idle`](SessionState::Idle) state.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            last_stop: StopReason::initial(),
            breakpoints: BreakpointSet::new(),
            last_sent: None,
            retransmits: 0,
            framing_errors: 0,
            packets_received: 0,
            packets_sent: 0,
        }
    }

    /// Return the current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Return the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The stop reason reported by `?`.
    pub fn last_stop(&self) -> StopReason {
        self.last_stop
    }

    /// Return the breakpoint set.
    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    /// Return the breakpoint set for modification.
    pub fn breakpoints_mut(&mut self) -> &mut BreakpointSet {
        &mut self.breakpoints
    }

    /// The last frame sent and not yet acknowledged.
    pub fn unacknowledged(&self) -> Option<&[u8]> {
        self.last_sent.as_deref()
    }

    /// Packets received with a valid checksum.
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Frames handed to the transport, retransmissions excluded.
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Transition: Idle → Connected.
    ///
    /// Halts the target first when `halt_on_attach` is set.
    pub fn attach<T: TargetAdapter + ?Sized>(&mut self, target: &mut T) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyAttached);
        }
        if self.config.halt_on_attach {
            target.halt();
        }
        self.state = SessionState::Connected;
        self.last_stop = StopReason::initial();
        info!(
            registers = target.register_count(),
            width = target.register_width(),
            big_endian = target.is_big_endian(),
            "debugger attached"
        );
        Ok(())
    }

    /// Transition: Stopped → Connected, when the debugger sends its next
    /// command. The stop reason stays available to `?`.
    pub fn begin_command(&mut self) {
        if let SessionState::Stopped(_) = self.state {
            self.state = SessionState::Connected;
        }
    }

    /// Transition: Connected | Stopped → Running.
    pub fn resume(&mut self, kind: ResumeKind, address: Option<u64>) -> Result<ResumeRequest, SessionError> {
        match self.state {
            SessionState::Connected | SessionState::Stopped(_) => {}
            SessionState::Idle => return Err(SessionError::NotAttached),
            SessionState::Running => return Err(SessionError::Busy),
        }
        debug!(?kind, ?address, "resuming target");
        self.state = SessionState::Running;
        Ok(ResumeRequest {
            kind,
            address,
            breakpoints: self.breakpoints.clone(),
        })
    }

    /// Transition: Running → Stopped.
    pub fn finish(&mut self, stop: StopReason) -> Result<(), SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::NotRunning);
        }
        debug!(?stop, "target stopped");
        self.last_stop = stop;
        self.state = SessionState::Stopped(stop);
        Ok(())
    }

    /// Transition: any → Idle. Clears breakpoints and retransmission state.
    pub fn detach(&mut self) {
        if self.state != SessionState::Idle {
            info!(
                received = self.packets_received,
                sent = self.packets_sent,
                "debugger detached"
            );
        }
        self.state = SessionState::Idle;
        self.last_stop = StopReason::initial();
        self.breakpoints.clear();
        self.last_sent = None;
        self.retransmits = 0;
        self.framing_errors = 0;
    }

    /// Remember a frame handed to the transport until it is acknowledged.
    pub fn record_sent(&mut self, frame: Vec<u8>) {
        self.packets_sent += 1;
        self.retransmits = 0;
        self.last_sent = Some(frame);
    }

    /// The debugger acknowledged the last frame.
    pub fn acknowledge(&mut self) {
        self.last_sent = None;
        self.retransmits = 0;
    }

    /// The debugger rejected the last frame: return it for retransmission.
    ///
    /// Returns `Ok(None)` when nothing is outstanding. Exceeding
    /// `max_retransmits` drops the session.
    pub fn retransmit(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        let Some(frame) = self.last_sent.clone() else {
            return Ok(None);
        };
        self.retransmits += 1;
        if self.retransmits > self.config.max_retransmits {
            let attempts = self.retransmits - 1;
            self.detach();
            return Err(SessionError::TooManyRetransmits(attempts));
        }
        debug!(attempt = self.retransmits, "retransmitting last frame");
        Ok(Some(frame))
    }

    /// A frame with a valid checksum arrived.
    pub fn record_packet(&mut self) {
        self.packets_received += 1;
        self.framing_errors = 0;
    }

    /// A corrupt frame arrived. Exceeding `max_framing_errors` in a row
    /// drops the session.
    pub fn record_framing_error(&mut self) -> Result<(), SessionError> {
        self.framing_errors += 1;
        if self.framing_errors > self.config.max_framing_errors {
            let errors = self.framing_errors;
            self.detach();
            return Err(SessionError::TooManyFramingErrors(errors));
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
