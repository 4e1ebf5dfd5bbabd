//! Parsed debugger requests.

use crate::codec::{decode_hex, parse_hex_u64};
use crate::error::ProtocolError;

/// Breakpoint flavours accepted by `Z`/`z`.
///
/// The stub implements both the same way: by checking the program counter
/// before every instruction while continuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    /// `Z0`.
    Software,
    /// `Z1`.
    Hardware,
}

/// A request from the debugger, parsed from one packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `g`
    ReadRegisters,
    /// `G XX…`: the raw hex digits, validated against the register file
    /// by the dispatcher.
    WriteRegisters(Vec<u8>),
    /// `p n`
    ReadRegister(usize),
    /// `P n=v`: `value` holds the register bytes in target byte order.
    WriteRegister { index: usize, value: Vec<u8> },
    /// `m addr,length`
    ReadMemory { address: u64, length: u64 },
    /// `M addr,length:XX…` or `X addr,length:bin`
    WriteMemory { address: u64, data: Vec<u8> },
    /// `c [addr]` (also `C sig[;addr]`, signal ignored)
    Continue(Option<u64>),
    /// `s [addr]` (also `S sig[;addr]`, signal ignored)
    Step(Option<u64>),
    /// `?`
    HaltReason,
    /// `Z0`/`Z1`
    SetBreakpoint { kind: BreakpointKind, address: u64 },
    /// `z0`/`z1`
    ClearBreakpoint { kind: BreakpointKind, address: u64 },
    /// `D`
    Detach,
    /// `k`
    Kill,
    /// `qSupported`
    QuerySupported,
    /// `qAttached`
    QueryAttached,
    /// `H op thread`. There is a single thread, so any selection is accepted.
    SetThread,
    /// Anything else. Answered with an empty packet.
    Unsupported,
}

impl Command {
    /// Parse a packet payload.
    ///
    /// Unknown commands are not errors; they parse as
    /// [`Command::Unsupported`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedCommand`] when a known command has
    /// arguments that do not parse.
    pub fn parse(payload: &[u8]) -> Result<Command, ProtocolError> {
        let Some((&head, args)) = payload.split_first() else {
            return Ok(Command::Unsupported);
        };

        match head {
            b'g' if args.is_empty() => Ok(Command::ReadRegisters),
            b'G' => Ok(Command::WriteRegisters(args.to_vec())),
            b'p' => Ok(Command::ReadRegister(parse_index(args)?)),
            b'P' => parse_write_register(args),
            b'm' => {
                let (address, length) = parse_address_length(args)?;
                Ok(Command::ReadMemory { address, length })
            }
            b'M' => parse_write_memory(args, true),
            b'X' => parse_write_memory(args, false),
            b'c' => Ok(Command::Continue(parse_optional_address(args)?)),
            b's' => Ok(Command::Step(parse_optional_address(args)?)),
            b'C' => Ok(Command::Continue(parse_signal_resume(args)?)),
            b'S' => Ok(Command::Step(parse_signal_resume(args)?)),
            b'?' if args.is_empty() => Ok(Command::HaltReason),
            b'Z' | b'z' => parse_breakpoint(head == b'Z', args),
            b'D' => Ok(Command::Detach),
            b'k' => Ok(Command::Kill),
            b'H' => Ok(Command::SetThread),
            b'q' => Ok(parse_query(args)),
            _ => Ok(Command::Unsupported),
        }
    }

    /// Whether this command hands control to the target.
    pub fn resumes(&self) -> bool {
        matches!(self, Command::Continue(_) | Command::Step(_))
    }
}

fn malformed(what: &str, args: &[u8]) -> ProtocolError {
    ProtocolError::MalformedCommand(format!("{what}: {:?}", args.escape_ascii().to_string()))
}

fn split_at_byte(bytes: &[u8], sep: u8) -> Option<(&[u8], &[u8])> {
    let pos = bytes.iter().position(|&b| b == sep)?;
    Some((&bytes[..pos], &bytes[pos + 1..]))
}

fn parse_index(args: &[u8]) -> Result<usize, ProtocolError> {
    parse_hex_u64(args)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| malformed("register number", args))
}

fn parse_address_length(args: &[u8]) -> Result<(u64, u64), ProtocolError> {
    let (address, length) =
        split_at_byte(args, b',').ok_or_else(|| malformed("address,length", args))?;
    let address = parse_hex_u64(address).ok_or_else(|| malformed("address", address))?;
    let length = parse_hex_u64(length).ok_or_else(|| malformed("length", length))?;
    Ok((address, length))
}

fn parse_optional_address(args: &[u8]) -> Result<Option<u64>, ProtocolError> {
    if args.is_empty() {
        return Ok(None);
    }
    parse_hex_u64(args)
        .map(Some)
        .ok_or_else(|| malformed("resume address", args))
}

fn parse_signal_resume(args: &[u8]) -> Result<Option<u64>, ProtocolError> {
    let (signal, address) = match split_at_byte(args, b';') {
        Some((signal, address)) => (signal, address),
        None => (args, &[][..]),
    };
    parse_hex_u64(signal).ok_or_else(|| malformed("signal", signal))?;
    parse_optional_address(address)
}

fn parse_write_register(args: &[u8]) -> Result<Command, ProtocolError> {
    let (index, value) = split_at_byte(args, b'=').ok_or_else(|| malformed("n=value", args))?;
    let index = parse_index(index)?;
    let value = decode_hex(value).ok_or_else(|| malformed("register value", value))?;
    Ok(Command::WriteRegister { index, value })
}

fn parse_write_memory(args: &[u8], hex: bool) -> Result<Command, ProtocolError> {
    let (header, data) = split_at_byte(args, b':').ok_or_else(|| malformed("addr,length:data", args))?;
    let (address, length) = parse_address_length(header)?;
    let data = if hex {
        decode_hex(data).ok_or_else(|| malformed("memory data", data))?
    } else {
        data.to_vec()
    };
    if data.len() as u64 != length {
        return Err(ProtocolError::MalformedCommand(format!(
            "length {length} does not match {} data bytes",
            data.len()
        )));
    }
    Ok(Command::WriteMemory { address, data })
}

fn parse_breakpoint(insert: bool, args: &[u8]) -> Result<Command, ProtocolError> {
    let mut fields = args.splitn(3, |&b| b == b',');
    let kind = match fields.next() {
        Some(b"0") => BreakpointKind::Software,
        Some(b"1") => BreakpointKind::Hardware,
        // Watchpoints.
        Some(_) => return Ok(Command::Unsupported),
        None => return Err(malformed("breakpoint type", args)),
    };
    let address = fields
        .next()
        .and_then(parse_hex_u64)
        .ok_or_else(|| malformed("breakpoint address", args))?;
    // The kind field (instruction size) may carry `;cond` extensions.
    let size = fields.next().map(|f| split_at_byte(f, b';').map_or(f, |(k, _)| k));
    if !size.is_some_and(|s| parse_hex_u64(s).is_some()) {
        return Err(malformed("breakpoint kind", args));
    }
    Ok(if insert {
        Command::SetBreakpoint { kind, address }
    } else {
        Command::ClearBreakpoint { kind, address }
    })
}

fn parse_query(args: &[u8]) -> Command {
    let name = split_at_byte(args, b':').map_or(args, |(name, _)| name);
    match name {
        b"Supported" => Command::QuerySupported,
        b"Attached" => Command::QueryAttached,
        _ => Command::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Command {
        Command::parse(s.as_bytes()).unwrap()
    }

    #[test]
    fn parse_register_commands() {
        assert_eq!(parse("g"), Command::ReadRegisters);
        assert_eq!(parse("G0100"), Command::WriteRegisters(b"0100".to_vec()));
        assert_eq!(parse("p1f"), Command::ReadRegister(0x1f));
        assert_eq!(
            parse("P20=efbeadde"),
            Command::WriteRegister {
                index: 0x20,
                value: vec![0xef, 0xbe, 0xad, 0xde]
            }
        );
    }

    #[test]
    fn parse_memory_commands() {
        assert_eq!(
            parse("m1000,4"),
            Command::ReadMemory {
                address: 0x1000,
                length: 4
            }
        );
        assert_eq!(
            parse("M2000,2:abcd"),
            Command::WriteMemory {
                address: 0x2000,
                data: vec![0xab, 0xcd]
            }
        );
        assert_eq!(
            Command::parse(b"X10,3:a:\x00").unwrap(),
            Command::WriteMemory {
                address: 0x10,
                data: vec![b'a', b':', 0]
            }
        );
        assert_eq!(
            parse("X10,0:"),
            Command::WriteMemory {
                address: 0x10,
                data: vec![]
            }
        );
    }

    #[test]
    fn parse_memory_length_mismatch_is_malformed() {
        assert!(matches!(
            Command::parse(b"M2000,4:abcd"),
            Err(ProtocolError::MalformedCommand(_))
        ));
        assert!(matches!(
            Command::parse(b"X2000,1:"),
            Err(ProtocolError::MalformedCommand(_))
        ));
    }

    #[test]
    fn parse_malformed_arguments() {
        for bad in [
            "m1000", "mzz,4", "m1000,", "m+10,4", "m10,+4", "pxyz", "p+1", "P1", "P1=abc", "cxyz",
            "c+10", "M10,1",
        ] {
            assert!(
                matches!(
                    Command::parse(bad.as_bytes()),
                    Err(ProtocolError::MalformedCommand(_))
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn parse_execution_control() {
        assert_eq!(parse("c"), Command::Continue(None));
        assert_eq!(parse("c400"), Command::Continue(Some(0x400)));
        assert_eq!(parse("s"), Command::Step(None));
        assert_eq!(parse("s8"), Command::Step(Some(8)));
        assert_eq!(parse("C05"), Command::Continue(None));
        assert_eq!(parse("S05;100"), Command::Step(Some(0x100)));
        assert!(parse("c").resumes());
        assert!(!parse("g").resumes());
    }

    #[test]
    fn parse_breakpoints() {
        assert_eq!(
            parse("Z0,1000,4"),
            Command::SetBreakpoint {
                kind: BreakpointKind::Software,
                address: 0x1000
            }
        );
        assert_eq!(
            parse("z1,20,2"),
            Command::ClearBreakpoint {
                kind: BreakpointKind::Hardware,
                address: 0x20
            }
        );
        assert_eq!(
            parse("Z0,1000,4;X1,ff"),
            Command::SetBreakpoint {
                kind: BreakpointKind::Software,
                address: 0x1000
            }
        );
        assert_eq!(parse("Z2,1000,4"), Command::Unsupported);
        assert!(Command::parse(b"Z0,1000").is_err());
        assert!(Command::parse(b"Z0,,4").is_err());
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse("?"), Command::HaltReason);
        assert_eq!(parse("D"), Command::Detach);
        assert_eq!(parse("D;1"), Command::Detach);
        assert_eq!(parse("k"), Command::Kill);
        assert_eq!(parse("Hg0"), Command::SetThread);
        assert_eq!(parse("Hc-1"), Command::SetThread);
    }

    #[test]
    fn parse_queries() {
        assert_eq!(
            parse("qSupported:multiprocess+;swbreak+"),
            Command::QuerySupported
        );
        assert_eq!(parse("qSupported"), Command::QuerySupported);
        assert_eq!(parse("qAttached"), Command::QueryAttached);
        assert_eq!(parse("qAttached:1"), Command::QueryAttached);
        assert_eq!(parse("qTStatus"), Command::Unsupported);
    }

    #[test]
    fn parse_unknown_is_unsupported() {
        assert_eq!(parse(""), Command::Unsupported);
        assert_eq!(parse("vUnknown"), Command::Unsupported);
        assert_eq!(parse("vCont?"), Command::Unsupported);
        assert_eq!(parse("gx"), Command::Unsupported);
        assert_eq!(parse("!"), Command::Unsupported);
    }
}
