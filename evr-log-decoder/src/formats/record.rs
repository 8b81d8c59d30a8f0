//! Event recorder binary record decoder
//!
//! Wire layout of one record:
//!
//! ```text
//! [u16 type tag][u16 length][length bytes]
//!                            ├─ u64 ticks        (LE)
//!                            ├─ u16 id           (LE)
//!                            ├─ u16 length info  (LE, bit 15 = irq)
//!                            └─ payload
//! ```
//!
//! ## Supported Record Types
//! - Type 1 (EventRecordData): byte blob of `length info & 0x7FFF` bytes
//! - Type 2 (EventRecord2): two signed 32-bit values
//! - Type 3 (EventRecord4): four signed 32-bit values
//!
//! Unknown types decode to their header only. A stream that ends inside a
//! record header or body reports [`DecoderError::EndOfStream`], exactly like a
//! clean end after the last record.

use crate::types::{DecoderError, Payload, RawRecord, Result, TypeTag};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::collections::HashSet;
use std::io::{self, Read};

/// Bytes of ticks, id and length info at the start of every record body
pub const RECORD_HEADER_LEN: usize = 12;

const TWO_VALUES_LEN: usize = RECORD_HEADER_LEN + 8;
const FOUR_VALUES_LEN: usize = RECORD_HEADER_LEN + 16;

/// Sequential reader of records from a trace stream
pub struct RecordReader<R: Read> {
    reader: R,
    records_read: u64,
    finished: bool,
    unknown_tags: HashSet<u16>,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            records_read: 0,
            finished: false,
            unknown_tags: HashSet::new(),
        }
    }

    /// Number of records decoded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Read the next record
    ///
    /// Returns `Err(DecoderError::EndOfStream)` when no complete record is left.
    pub fn read_record(&mut self) -> Result<RawRecord> {
        let tag = self.reader.read_u16::<LittleEndian>().map_err(end_or_io)?;
        let length = self.reader.read_u16::<LittleEndian>().map_err(end_or_io)?;

        let mut body = vec![0u8; length as usize];
        self.reader.read_exact(&mut body).map_err(end_or_io)?;

        let record = decode_record(tag, &body)?;
        if let TypeTag::Unknown(raw) = record.type_tag {
            if self.unknown_tags.insert(raw) {
                log::warn!(
                    "Record type {} is not supported, decoding header only (id 0x{:04X})",
                    raw,
                    record.id
                );
            }
        }

        self.records_read += 1;
        log::trace!(
            "Record {}: type {} id 0x{:04X} ticks {}",
            self.records_read,
            record.type_tag,
            record.id,
            record.ticks
        );
        Ok(record)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_record() {
            Ok(record) => Some(Ok(record)),
            Err(DecoderError::EndOfStream) => {
                log::debug!("End of event stream after {} records", self.records_read);
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Short reads end the stream, anything else is a real I/O failure
fn end_or_io(err: io::Error) -> DecoderError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        DecoderError::EndOfStream
    } else {
        DecoderError::IoError(err)
    }
}

/// Decode one record body of type `tag`
pub fn decode_record(tag: u16, body: &[u8]) -> Result<RawRecord> {
    if body.len() < RECORD_HEADER_LEN {
        return Err(DecoderError::EndOfStream);
    }

    let ticks = LittleEndian::read_u64(&body[0..8]);
    let id = LittleEndian::read_u16(&body[8..10]);
    let length_info = LittleEndian::read_u16(&body[10..12]);
    let type_tag = TypeTag::from_raw(tag);

    let payload = match type_tag {
        TypeTag::Blob => {
            let end = RECORD_HEADER_LEN + (length_info & 0x7FFF) as usize;
            if body.len() < end {
                return Err(DecoderError::EndOfStream);
            }
            Payload::Blob(body[RECORD_HEADER_LEN..end].to_vec())
        }
        TypeTag::Two => {
            if body.len() < TWO_VALUES_LEN {
                return Err(DecoderError::EndOfStream);
            }
            Payload::Two([
                LittleEndian::read_i32(&body[12..16]),
                LittleEndian::read_i32(&body[16..20]),
            ])
        }
        TypeTag::Four => {
            if body.len() < FOUR_VALUES_LEN {
                return Err(DecoderError::EndOfStream);
            }
            Payload::Four([
                LittleEndian::read_i32(&body[12..16]),
                LittleEndian::read_i32(&body[16..20]),
                LittleEndian::read_i32(&body[20..24]),
                LittleEndian::read_i32(&body[24..28]),
            ])
        }
        TypeTag::Unknown(_) => Payload::Empty,
    };

    Ok(RawRecord {
        ticks,
        type_tag,
        id,
        length_info,
        payload,
    })
}
