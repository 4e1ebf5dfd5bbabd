//! RSP packet codec: `$payload#cc` framing.
//!
//! The codec is stateless apart from [`FrameDecoder`], which buffers a raw
//! byte stream and cuts it into frames and acknowledgment symbols.

use std::fmt;

use crate::error::FramingError;

/// Frame start marker.
pub const START: u8 = b'$';
/// Payload/checksum delimiter.
pub const END: u8 = b'#';
/// Escape prefix; the next byte is XOR-ed with `0x20`.
pub const ESCAPE: u8 = b'}';
/// Run-length marker.
pub const REPEAT: u8 = b'*';
/// Positive acknowledgment.
pub const ACK: u8 = b'+';
/// Negative acknowledgment.
pub const NAK: u8 = b'-';
/// Out-of-band interrupt request (`^C`).
pub const INTERRUPT: u8 = 0x03;

const ESCAPE_XOR: u8 = 0x20;
const RLE_BIAS: u8 = 29;
/// Largest repeat count whose count byte stays printable (`~`).
const MAX_RUN: usize = 126 - RLE_BIAS as usize;
/// Default upper bound on a buffered, still incomplete frame.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

/// One decoded protocol message: the payload with escapes and run-length
/// encoding already expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Vec<u8>,
}

impl Packet {
    /// Wrap a payload.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the packet, returning the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.payload.escape_ascii())
    }
}

/// The 8-bit checksum of `data`: sum of all bytes modulo 256.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &b| acc.wrapping_add(b))
}

/// Frame `payload` as `$…#cc`, escaping reserved bytes.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    frame(&escape(payload, false))
}

/// Like [`encode`], additionally run-length compressing repeated bytes.
pub fn encode_compressed(payload: &[u8]) -> Vec<u8> {
    frame(&escape(payload, true))
}

fn frame(body: &[u8]) -> Vec<u8> {
    let sum = checksum(body);
    let mut out = Vec::with_capacity(body.len() + 4);
    out.push(START);
    out.extend_from_slice(body);
    out.push(END);
    out.extend_from_slice(format!("{sum:02x}").as_bytes());
    out
}

fn needs_escape(byte: u8) -> bool {
    matches!(byte, START | END | ESCAPE | REPEAT)
}

fn escape(payload: &[u8], compress: bool) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len());
    let mut i = 0;
    while i < payload.len() {
        let byte = payload[i];
        i += 1;
        if needs_escape(byte) {
            body.push(ESCAPE);
            body.push(byte ^ ESCAPE_XOR);
            continue;
        }
        body.push(byte);
        if !compress {
            continue;
        }

        let run = payload[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == byte)
            .count();
        // Counts of 6 and 7 would produce `#` and `$` as the count byte.
        let run = if run == 6 || run == 7 { 5 } else { run };
        if run >= 3 {
            body.push(REPEAT);
            body.push(run as u8 + RLE_BIAS);
            i += run;
        }
    }
    body
}

/// Decode exactly one complete frame.
///
/// # Errors
///
/// [`FramingError::Truncated`] when `raw` ends early,
/// [`FramingError::ChecksumMismatch`] on a bad checksum and
/// [`FramingError::Malformed`] for anything else that is not a frame.
pub fn decode(raw: &[u8]) -> Result<Packet, FramingError> {
    let (packet, used) = decode_frame(raw)?;
    if used != raw.len() {
        return Err(FramingError::Malformed(format!(
            "{} trailing bytes after checksum",
            raw.len() - used
        )));
    }
    Ok(packet)
}

/// Decode the frame at the start of `raw`.
///
/// Returns the packet and the number of bytes the frame occupied.
pub fn decode_frame(raw: &[u8]) -> Result<(Packet, usize), FramingError> {
    match raw.first() {
        None => return Err(FramingError::Truncated),
        Some(&START) => {}
        Some(other) => {
            return Err(FramingError::Malformed(format!(
                "missing start marker, found {:?}",
                other.escape_ascii().to_string()
            )))
        }
    }

    let end = raw[1..]
        .iter()
        .position(|&b| b == END)
        .map(|p| p + 1)
        .ok_or(FramingError::Truncated)?;
    let body = &raw[1..end];
    if body.contains(&START) {
        return Err(FramingError::Malformed("unexpected start marker".into()));
    }
    let digits = raw.get(end + 1..end + 3).ok_or(FramingError::Truncated)?;
    let expected = parse_hex_u8(digits).ok_or_else(|| {
        FramingError::Malformed(format!(
            "invalid checksum digits {:?}",
            digits.escape_ascii().to_string()
        ))
    })?;

    let computed = checksum(body);
    if computed != expected {
        return Err(FramingError::ChecksumMismatch { expected, computed });
    }

    Ok((Packet::new(unescape(body)?), end + 3))
}

fn unescape(body: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut out = Vec::with_capacity(body.len());
    let mut bytes = body.iter().copied();
    while let Some(byte) = bytes.next() {
        match byte {
            ESCAPE => {
                let next = bytes
                    .next()
                    .ok_or_else(|| FramingError::Malformed("dangling escape".into()))?;
                out.push(next ^ ESCAPE_XOR);
            }
            REPEAT => {
                let previous = *out.last().ok_or_else(|| {
                    FramingError::Malformed("repeat marker with no preceding byte".into())
                })?;
                let count = bytes
                    .next()
                    .ok_or_else(|| FramingError::Malformed("repeat marker without count".into()))?;
                let extra = count.checked_sub(RLE_BIAS).ok_or_else(|| {
                    FramingError::Malformed(format!("repeat count byte {count:#04x} out of range"))
                })?;
                out.extend(std::iter::repeat(previous).take(usize::from(extra)));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// An event recognised in the inbound byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `+`: the last frame we sent arrived intact.
    Ack,
    /// `-`: the last frame we sent must be retransmitted.
    Nak,
    /// `0x03` outside a frame: stop the running target.
    Interrupt,
    /// A frame with a valid checksum.
    Packet(Packet),
    /// A complete frame that failed to decode.
    Corrupt(FramingError),
}

/// Buffers raw bytes from the transport and splits them into [`Inbound`]
/// events.
///
/// Bytes outside a frame other than `+`, `-` and `0x03` are discarded. A
/// `$` seen inside a frame abandons the partial frame and starts over.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame: usize,
}

impl FrameDecoder {
    /// Create a decoder that gives up on frames longer than `max_frame` bytes.
    pub fn new(max_frame: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame,
        }
    }

    /// Append bytes read from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet turned into events.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Remove every buffered `0x03` that lies outside a frame.
    ///
    /// Returns whether any was found. Frame boundaries follow
    /// [`next_inbound`](Self::next_inbound): a frame runs from `$` to the
    /// two checksum digits after `#`, and a new `$` restarts it. Bytes
    /// inside a frame, including a trailing partial one, are left alone.
    pub fn take_interrupts(&mut self) -> bool {
        enum Scan {
            Outside,
            Body,
            Checksum(u8),
        }

        let mut scan = Scan::Outside;
        let mut found = false;
        self.buffer.retain(|&byte| {
            scan = match (&scan, byte) {
                (Scan::Outside, INTERRUPT) => {
                    found = true;
                    return false;
                }
                (Scan::Outside, START) | (Scan::Body, START) => Scan::Body,
                (Scan::Outside, _) => Scan::Outside,
                (Scan::Body, END) => Scan::Checksum(2),
                (Scan::Body, _) => Scan::Body,
                (Scan::Checksum(1), _) => Scan::Outside,
                (Scan::Checksum(n), _) => Scan::Checksum(n - 1),
            };
            true
        });
        found
    }

    /// Take the next complete event, or `None` when more bytes are needed.
    pub fn next_inbound(&mut self) -> Option<Inbound> {
        loop {
            let first = *self.buffer.first()?;
            match first {
                ACK => {
                    self.buffer.remove(0);
                    return Some(Inbound::Ack);
                }
                NAK => {
                    self.buffer.remove(0);
                    return Some(Inbound::Nak);
                }
                INTERRUPT => {
                    self.buffer.remove(0);
                    return Some(Inbound::Interrupt);
                }
                START => {
                    let boundary = self.buffer[1..]
                        .iter()
                        .position(|&b| b == END || b == START)
                        .map(|p| p + 1);
                    match boundary {
                        None => {
                            if self.buffer.len() > self.max_frame {
                                let len = self.buffer.len();
                                self.buffer.clear();
                                return Some(Inbound::Corrupt(FramingError::Malformed(format!(
                                    "frame exceeds {} bytes ({len} buffered)",
                                    self.max_frame
                                ))));
                            }
                            return None;
                        }
                        Some(p) if self.buffer[p] == START => {
                            tracing::debug!(dropped = p, "resynchronising on new start marker");
                            self.buffer.drain(..p);
                        }
                        Some(p) => {
                            if self.buffer.len() < p + 3 {
                                return None;
                            }
                            let raw: Vec<u8> = self.buffer.drain(..p + 3).collect();
                            return Some(match decode(&raw) {
                                Ok(packet) => Inbound::Packet(packet),
                                Err(err) => Inbound::Corrupt(err),
                            });
                        }
                    }
                }
                _ => {
                    self.buffer.remove(0);
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME)
    }
}

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

/// Parse a hex number of up to 16 digits.
pub fn parse_hex_u64(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() || digits.len() > 16 || !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    u64::from_str_radix(text, 16).ok()
}

fn parse_hex_u8(digits: &[u8]) -> Option<u8> {
    if digits.len() != 2 {
        return None;
    }
    parse_hex_u64(digits).map(|v| v as u8)
}

/// Decode a string of hex pairs into bytes.
pub fn decode_hex(digits: &[u8]) -> Option<Vec<u8>> {
    hex::decode(digits).ok()
}

/// Encode bytes as lowercase hex pairs.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_byte_sum() {
        assert_eq!(checksum(b""), 0);
        assert_eq!(checksum(b"g"), 0x67);
        assert_eq!(checksum(b"OK"), 0x9a);
        assert_eq!(checksum(&[0xff, 0x02]), 0x01);
    }

    #[test]
    fn encode_frames_payload() {
        assert_eq!(encode(b"OK"), b"$OK#9a");
        assert_eq!(encode(b""), b"$#00");
    }

    #[test]
    fn encode_escapes_reserved_bytes() {
        let framed = encode(b"a#b");
        assert_eq!(&framed[..5], b"$a}\x03b");
        assert_eq!(decode(&framed).unwrap().payload(), b"a#b");
    }

    #[test]
    fn roundtrip_every_byte_value() {
        let payload: Vec<u8> = (0..=255).collect();
        assert_eq!(decode(&encode(&payload)).unwrap().payload(), &payload[..]);
        assert_eq!(
            decode(&encode_compressed(&payload)).unwrap().payload(),
            &payload[..]
        );
    }

    #[test]
    fn compressed_roundtrip_runs_of_every_length() {
        for len in 1..300 {
            let payload = vec![b'0'; len];
            let framed = encode_compressed(&payload);
            assert_eq!(
                decode(&framed).unwrap().payload(),
                &payload[..],
                "run of {len}"
            );
            let body = &framed[1..framed.len() - 3];
            assert!(!body.contains(&START) && !body.contains(&END), "run of {len}");
        }
    }

    #[test]
    fn compression_shortens_long_runs() {
        let payload = vec![b'0'; 32];
        assert!(encode_compressed(&payload).len() < encode(&payload).len());
        assert_eq!(&encode_compressed(b"0000")[..4], b"$0*\x20");
    }

    #[test]
    fn decode_expands_run_length() {
        // '0' followed by 3 extra repeats: count byte is 3 + 29 = ' '.
        let body = b"0* ";
        let mut raw = vec![START];
        raw.extend_from_slice(body);
        raw.push(END);
        raw.extend_from_slice(format!("{:02x}", checksum(body)).as_bytes());
        assert_eq!(decode(&raw).unwrap().payload(), b"0000");
    }

    #[test]
    fn decode_rejects_leading_repeat_marker() {
        let raw = format!("$*!#{:02x}", checksum(b"*!"));
        assert!(matches!(
            decode(raw.as_bytes()),
            Err(FramingError::Malformed(_))
        ));
    }

    #[test]
    fn decode_rejects_dangling_escape() {
        let raw = format!("$a}}#{:02x}", checksum(b"a}"));
        assert!(matches!(
            decode(raw.as_bytes()),
            Err(FramingError::Malformed(_))
        ));
    }

    #[test]
    fn decode_detects_checksum_bit_flips() {
        let framed = encode(b"m1000,4");
        let digits_at = framed.len() - 2;
        for offset in 0..2 {
            for bit in 0..4 {
                let mut corrupt = framed.clone();
                let idx = digits_at + offset;
                let value = (corrupt[idx] as char).to_digit(16).unwrap() as u8 ^ (1 << bit);
                corrupt[idx] = format!("{value:x}").as_bytes()[0];
                assert!(
                    matches!(
                        decode(&corrupt),
                        Err(FramingError::ChecksumMismatch { .. })
                    ),
                    "offset {offset} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn decode_reports_truncation() {
        assert_eq!(decode(b""), Err(FramingError::Truncated));
        assert_eq!(decode(b"$m1000"), Err(FramingError::Truncated));
        assert_eq!(decode(b"$g#6"), Err(FramingError::Truncated));
    }

    #[test]
    fn decode_rejects_missing_start_and_bad_digits() {
        assert!(matches!(decode(b"g#67"), Err(FramingError::Malformed(_))));
        assert!(matches!(decode(b"$g#zz"), Err(FramingError::Malformed(_))));
        assert!(matches!(decode(b"$g#67x"), Err(FramingError::Malformed(_))));
    }

    #[test]
    fn decode_frame_reports_consumed_length() {
        let mut raw = encode(b"g");
        raw.extend_from_slice(b"+");
        let (packet, used) = decode_frame(&raw).unwrap();
        assert_eq!(packet.payload(), b"g");
        assert_eq!(used, 5);
    }

    #[test]
    fn decoder_splits_stream() {
        let mut dec = FrameDecoder::default();
        dec.push(b"+$g#67-\x03");
        assert_eq!(dec.next_inbound(), Some(Inbound::Ack));
        assert_eq!(dec.next_inbound(), Some(Inbound::Packet(Packet::new("g"))));
        assert_eq!(dec.next_inbound(), Some(Inbound::Nak));
        assert_eq!(dec.next_inbound(), Some(Inbound::Interrupt));
        assert_eq!(dec.next_inbound(), None);
    }

    #[test]
    fn decoder_waits_for_partial_frames() {
        let mut dec = FrameDecoder::default();
        dec.push(b"$m10");
        assert_eq!(dec.next_inbound(), None);
        dec.push(b"00,4#");
        assert_eq!(dec.next_inbound(), None);
        dec.push(b"8");
        assert_eq!(dec.next_inbound(), None);
        dec.push(b"e");
        assert_eq!(
            dec.next_inbound(),
            Some(Inbound::Packet(Packet::new("m1000,4")))
        );
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn decoder_reports_corrupt_frames() {
        let mut dec = FrameDecoder::default();
        dec.push(b"$m1000,4#11$g#67");
        assert!(matches!(
            dec.next_inbound(),
            Some(Inbound::Corrupt(FramingError::ChecksumMismatch {
                expected: 0x11,
                computed: 0x8e
            }))
        ));
        assert_eq!(dec.next_inbound(), Some(Inbound::Packet(Packet::new("g"))));
    }

    #[test]
    fn decoder_resyncs_on_new_start_marker() {
        let mut dec = FrameDecoder::default();
        dec.push(b"$garbage$g#67");
        assert_eq!(dec.next_inbound(), Some(Inbound::Packet(Packet::new("g"))));
    }

    #[test]
    fn decoder_discards_noise() {
        let mut dec = FrameDecoder::default();
        dec.push(b"xyz\r\n$?#3f");
        assert_eq!(dec.next_inbound(), Some(Inbound::Packet(Packet::new("?"))));
    }

    #[test]
    fn decoder_bounds_incomplete_frames() {
        let mut dec = FrameDecoder::new(8);
        dec.push(b"$0123456789");
        assert!(matches!(
            dec.next_inbound(),
            Some(Inbound::Corrupt(FramingError::Malformed(_)))
        ));
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn decoder_takes_interrupts_outside_frames() {
        let mut dec = FrameDecoder::default();
        dec.push(b"\x03$X10,1:\x03#53\x03+$m1");
        assert!(dec.take_interrupts());
        assert!(!dec.take_interrupts());
        assert_eq!(dec.pending(), 15);
        assert!(matches!(dec.next_inbound(), Some(Inbound::Packet(p)) if p.payload() == b"X10,1:\x03"));
        assert_eq!(dec.next_inbound(), Some(Inbound::Ack));
        assert_eq!(dec.next_inbound(), None);
    }

    #[test]
    fn decoder_leaves_interrupt_in_partial_frame() {
        let mut dec = FrameDecoder::default();
        dec.push(b"$X10,1:\x03");
        assert!(!dec.take_interrupts());
        assert_eq!(dec.pending(), 8);
    }

    #[test]
    fn decode_rejects_signed_checksum_digits() {
        assert!(matches!(
            decode(b"$g#+7"),
            Err(FramingError::Malformed(_))
        ));
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(parse_hex_u64(b"1000"), Some(0x1000));
        assert_eq!(parse_hex_u64(b""), None);
        assert_eq!(parse_hex_u64(b"xyz"), None);
        assert_eq!(parse_hex_u64(b"+10"), None);
        assert_eq!(parse_hex_u64(b"-1"), None);
        assert_eq!(parse_hex_u64(b"11112222333344445"), None);
        assert_eq!(decode_hex(b"aabb"), Some(vec![0xaa, 0xbb]));
        assert_eq!(decode_hex(b"abc"), None);
        assert_eq!(encode_hex(&[0xaa, 0x01]), "aa01");
    }

    #[test]
    fn packet_display_escapes_binary() {
        let p = Packet::new(vec![b'X', 0x00]);
        assert_eq!(p.to_string(), "X\\x00");
    }
}
