//! Command execution against a target.

use simstub_target::TargetAdapter;
use tracing::{debug, trace};

use crate::codec::encode_hex;
use crate::command::Command;
use crate::error::ProtocolError;
use crate::registers;
use crate::reply::Reply;
use crate::session::{ResumeKind, ResumeRequest, Session};

/// What the engine must do after a command.
#[derive(Debug)]
pub enum Outcome {
    /// Send a reply.
    Reply(Reply),
    /// Run the target; the stop reply is sent when it halts.
    Resume(ResumeRequest),
    /// Send the reply, then end the session.
    Detach(Reply),
    /// End the session without a reply.
    Kill,
}

/// Execute one command.
///
/// Every failure is turned into an `Exx` reply; nothing here aborts the
/// session except `D` and `k`.
pub fn dispatch<T: TargetAdapter + ?Sized>(
    command: Command,
    session: &mut Session,
    target: &mut T,
) -> Outcome {
    trace!(?command, "dispatch");
    if !command.resumes() {
        session.begin_command();
    }

    let result = match command {
        Command::Continue(address) => return resume(session, ResumeKind::Continue, address),
        Command::Step(address) => return resume(session, ResumeKind::Step, address),
        Command::Detach => {
            session.detach();
            return Outcome::Detach(Reply::Ok);
        }
        Command::Kill => {
            session.detach();
            return Outcome::Kill;
        }
        Command::ReadRegisters => Ok(Reply::Data(registers::read_all(target))),
        Command::WriteRegisters(hex) => registers::write_all(target, &hex).map(|()| Reply::Ok),
        Command::ReadRegister(index) => registers::read_one(target, index).map(Reply::Data),
        Command::WriteRegister { index, value } => {
            registers::write_one(target, index, &value).map(|()| Reply::Ok)
        }
        Command::ReadMemory { address, length } => read_memory(session, target, address, length),
        Command::WriteMemory { address, data } => {
            for (offset, &byte) in data.iter().enumerate() {
                target.write_byte(address.wrapping_add(offset as u64), byte);
            }
            Ok(Reply::Ok)
        }
        Command::HaltReason => Ok(Reply::Stop(session.last_stop())),
        Command::SetBreakpoint { kind, address } => {
            let count = session.breakpoints_mut().insert(address);
            debug!(?kind, address = format_args!("{address:#x}"), count, "breakpoint set");
            Ok(Reply::Ok)
        }
        Command::ClearBreakpoint { kind, address } => {
            if !session.breakpoints_mut().remove(address) {
                debug!(?kind, address = format_args!("{address:#x}"), "clearing absent breakpoint");
            }
            Ok(Reply::Ok)
        }
        Command::QuerySupported => Ok(Reply::Data(format!(
            "PacketSize={:x}",
            session.config().max_packet_size
        ))),
        Command::QueryAttached => Ok(Reply::Data("1".into())),
        Command::SetThread => Ok(Reply::Ok),
        Command::Unsupported => Ok(Reply::Empty),
    };

    Outcome::Reply(result.unwrap_or_else(|err| {
        debug!(%err, "command failed");
        Reply::Error(err)
    }))
}

fn resume(session: &mut Session, kind: ResumeKind, address: Option<u64>) -> Outcome {
    match session.resume(kind, address) {
        Ok(request) => Outcome::Resume(request),
        Err(err) => {
            debug!(%err, "resume refused");
            Outcome::Reply(Reply::Error(err.into()))
        }
    }
}

// Each byte becomes two hex digits, so half the packet size is the most
// that fits a reply.
fn read_memory<T: TargetAdapter + ?Sized>(
    session: &Session,
    target: &T,
    address: u64,
    length: u64,
) -> Result<Reply, ProtocolError> {
    let limit = (session.config().max_packet_size / 2) as u64;
    if length > limit {
        return Err(ProtocolError::RequestTooLarge {
            requested: length,
            limit,
        });
    }
    let bytes: Vec<u8> = (0..length)
        .map(|offset| target.read_byte(address.wrapping_add(offset)))
        .collect();
    Ok(Reply::Data(encode_hex(&bytes)))
}
