//! Transport-independent protocol engine.
//!
//! [`Engine`] consumes raw bytes from the debugger and produces
//! [`Action`]s for the transport: bytes to write, a resume to run, or the
//! end of the session. Running the target is left to the caller so it can
//! happen off the I/O task while interrupts keep flowing in.

use std::sync::atomic::AtomicBool;

use simstub_target::TargetAdapter;
use tracing::{debug, trace, warn};

use crate::codec::{self, FrameDecoder, Inbound, ACK, NAK};
use crate::command::Command;
use crate::dispatch::{dispatch, Outcome};
use crate::error::SessionError;
use crate::reply::Reply;
use crate::session::{ResumeRequest, Session, SessionConfig, SessionState, StopReason};

/// Work for the transport.
#[derive(Debug)]
pub enum Action {
    /// Write these bytes to the debugger.
    Transmit(Vec<u8>),
    /// Run the target, then report the stop through
    /// [`Engine::complete_resume`].
    Resume(ResumeRequest),
    /// Close the connection.
    Close,
}

/// Framing, acknowledgment and dispatch for one debugger connection.
#[derive(Debug)]
pub struct Engine {
    session: Session,
    decoder: FrameDecoder,
}

impl Engine {
    /// Create an engine with an idle session.
    pub fn new(config: SessionConfig) -> Self {
        // Room for a fully escaped maximum-size packet plus framing.
        let max_frame = config.max_packet_size.saturating_mul(2).saturating_add(4);
        Self {
            session: Session::new(config),
            decoder: FrameDecoder::new(max_frame),
        }
    }

    /// Return the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Attach the debugger to `target`.
    pub fn attach<T: TargetAdapter + ?Sized>(&mut self, target: &mut T) -> Result<(), SessionError> {
        self.session.attach(target)
    }

    /// End the session, discarding buffered input.
    pub fn detach(&mut self) {
        self.decoder.clear();
        self.session.detach();
    }

    /// Buffer bytes read from the debugger.
    pub fn receive(&mut self, bytes: &[u8]) {
        self.decoder.push(bytes);
    }

    /// Consume any buffered `0x03` that sits outside a frame.
    ///
    /// The transport calls this when a resume starts and after every read
    /// while the target runs; `true` means the run must be interrupted.
    /// Frames queued alongside the interrupt stay buffered for
    /// [`poll`](Self::poll).
    pub fn take_pending_interrupt(&mut self) -> bool {
        self.decoder.take_interrupts()
    }

    /// Handle the next buffered inbound event.
    ///
    /// Returns `None` once the buffer holds no complete event. Must not be
    /// called while a resume is outstanding; interrupts for a running
    /// target are the transport's business.
    pub fn poll<T: TargetAdapter + ?Sized>(&mut self, target: &mut T) -> Option<Vec<Action>> {
        if self.session.state() == SessionState::Idle {
            if self.decoder.pending() > 0 {
                debug!(bytes = self.decoder.pending(), "discarding input for idle session");
                self.decoder.clear();
            }
            return None;
        }

        let inbound = self.decoder.next_inbound()?;
        trace!(?inbound, "inbound");
        Some(match inbound {
            Inbound::Ack => {
                self.session.acknowledge();
                Vec::new()
            }
            Inbound::Nak => match self.session.retransmit() {
                Ok(Some(frame)) => vec![Action::Transmit(frame)],
                Ok(None) => Vec::new(),
                Err(err) => {
                    warn!(%err, "dropping session");
                    vec![Action::Close]
                }
            },
            Inbound::Interrupt => {
                // The target is halted whenever the engine is polled; a
                // late interrupt has nothing left to stop.
                debug!("ignoring interrupt for halted target");
                Vec::new()
            }
            Inbound::Corrupt(err) => {
                debug!(%err, "rejecting frame");
                match self.session.record_framing_error() {
                    Ok(()) => vec![Action::Transmit(vec![NAK])],
                    Err(err) => {
                        warn!(%err, "dropping session");
                        vec![Action::Transmit(vec![NAK]), Action::Close]
                    }
                }
            }
            Inbound::Packet(packet) => {
                self.session.record_packet();
                debug!(%packet, "packet");
                let mut out = vec![ACK];
                let outcome = match Command::parse(packet.payload()) {
                    Ok(command) => dispatch(command, &mut self.session, target),
                    Err(err) => {
                        debug!(%err, "unparseable command");
                        Outcome::Reply(Reply::Error(err))
                    }
                };
                match outcome {
                    Outcome::Reply(reply) => {
                        out.extend(self.frame(&reply));
                        vec![Action::Transmit(out)]
                    }
                    Outcome::Resume(request) => vec![Action::Transmit(out), Action::Resume(request)],
                    Outcome::Detach(reply) => {
                        out.extend(self.frame(&reply));
                        vec![Action::Transmit(out), Action::Close]
                    }
                    Outcome::Kill => vec![Action::Transmit(out), Action::Close],
                }
            }
        })
    }

    /// Record the end of a resume and return the framed stop reply.
    pub fn complete_resume(&mut self, stop: StopReason) -> Vec<u8> {
        if let Err(err) = self.session.finish(stop) {
            warn!(%err, ?stop, "unexpected stop report");
        }
        self.frame(&Reply::Stop(stop))
    }

    /// Feed `bytes` and run every resulting action to completion,
    /// executing resumes inline. Returns everything written to the
    /// debugger.
    pub fn process<T: TargetAdapter + ?Sized>(&mut self, bytes: &[u8], target: &mut T) -> Vec<u8> {
        self.receive(bytes);
        let mut out = Vec::new();
        while let Some(actions) = self.poll(target) {
            for action in actions {
                match action {
                    Action::Transmit(bytes) => out.extend(bytes),
                    Action::Resume(request) => {
                        let interrupt = AtomicBool::new(self.take_pending_interrupt());
                        let stop = request.run(target, &interrupt);
                        out.extend(self.complete_resume(stop));
                    }
                    Action::Close => {
                        self.detach();
                        return out;
                    }
                }
            }
        }
        out
    }

    fn frame(&mut self, reply: &Reply) -> Vec<u8> {
        let payload = reply.to_payload();
        let frame = if self.session.config().compress_replies {
            codec::encode_compressed(&payload)
        } else {
            codec::encode(&payload)
        };
        self.session.record_sent(frame.clone());
        frame
    }
}
