//! Core types for the event recorder log decoder
//!
//! This module defines the records the decoder reads from a trace stream, the
//! decomposition of event ids, the scalar values produced by the expression
//! evaluator and the error taxonomy shared by every stage of a run.

use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Event class of start/stop interval events
pub const CLASS_INTERVAL: u8 = 0xEF;
/// Event class of system events (stdout redirection etc.)
pub const CLASS_SYSTEM: u8 = 0xFE;
/// Event class of recorder control events
pub const CLASS_CONTROL: u8 = 0xFF;

/// `EventRecorderInitialize`: value2 carries the timestamp frequency
pub const ID_INITIALIZE: u16 = 0xFF00;
/// `EventRecorderClock`: value1 carries the timestamp frequency
pub const ID_CLOCK: u16 = 0xFF03;
/// Redirected stdout of the target, carried as a blob
pub const ID_STDOUT: u16 = 0xFE00;

/// Errors that can occur during decoding, evaluation and rendering
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    /// The stream ended, either cleanly or inside a truncated record.
    #[error("End of event stream")]
    EndOfStream,

    #[error("Syntax error: {0}")]
    SyntaxError(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Enum value not found: {0}")]
    EnumNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON output error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML output error: {0}")]
    XmlError(String),
}

impl DecoderError {
    /// True for the normal end-of-stream outcome
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DecoderError::EndOfStream)
    }
}

/// Record type tag as found on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// `EventRecordData`: variable length byte blob
    Blob,
    /// `EventRecord2`: two 32-bit values
    Two,
    /// `EventRecord4`: four 32-bit values
    Four,
    /// Anything else; only the header is decoded
    Unknown(u16),
}

impl TypeTag {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            1 => TypeTag::Blob,
            2 => TypeTag::Two,
            3 => TypeTag::Four,
            other => TypeTag::Unknown(other),
        }
    }

    pub fn raw(&self) -> u16 {
        match self {
            TypeTag::Blob => 1,
            TypeTag::Two => 2,
            TypeTag::Four => 3,
            TypeTag::Unknown(raw) => *raw,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Blob => write!(f, "Blob"),
            TypeTag::Two => write!(f, "Two"),
            TypeTag::Four => write!(f, "Four"),
            TypeTag::Unknown(raw) => write!(f, "Unknown({})", raw),
        }
    }
}

/// Record body, shaped by the record's type tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Blob(Vec<u8>),
    Two([i32; 2]),
    Four([i32; 4]),
    /// Unknown type tag: header only
    Empty,
}

/// One record decoded from the trace stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Raw timer ticks at the time of recording
    pub ticks: u64,
    pub type_tag: TypeTag,
    /// Event id, see [`split_id`]
    pub id: u16,
    /// Bit 15: recorded from interrupt context, bits 0-14: blob length
    pub length_info: u16,
    pub payload: Payload,
}

impl RawRecord {
    /// True if the event was recorded from interrupt context
    pub fn irq(&self) -> bool {
        self.length_info & 0x8000 != 0
    }

    /// Declared blob length (lower 15 bits of the length info)
    pub fn data_length(&self) -> u16 {
        self.length_info & 0x7FFF
    }

    /// Decomposed event id
    pub fn parts(&self) -> IdParts {
        split_id(self.id)
    }

    /// Discrete value `index` (0-based) of a Two/Four record
    pub fn value(&self, index: usize) -> Option<i32> {
        match &self.payload {
            Payload::Two(values) => values.get(index).copied(),
            Payload::Four(values) => values.get(index).copied(),
            _ => None,
        }
    }

    /// The four operand words bound to `val1`..`val4` while evaluating this record
    ///
    /// Blob records expose their first 8 bytes as two big-endian words; missing
    /// bytes read as zero and `val3`/`val4` are always zero.
    pub fn operands(&self) -> [i64; 4] {
        match &self.payload {
            Payload::Two([v1, v2]) => [*v1 as i64, *v2 as i64, 0, 0],
            Payload::Four(values) => values.map(|v| v as i64),
            Payload::Blob(data) => {
                let mut bytes = [0u8; 8];
                let n = data.len().min(8);
                bytes[..n].copy_from_slice(&data[..n]);
                let word1 = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let word2 = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
                [word1 as i64, word2 as i64, 0, 0]
            }
            Payload::Empty => [0; 4],
        }
    }

    /// Redirected stdout text, shown quoted in text reports
    pub fn is_stdout_text(&self) -> bool {
        self.id == ID_STDOUT && matches!(self.payload, Payload::Blob(_))
    }

    /// Numeric rendering used when no schema entry exists for the id
    pub fn values_as_string(&self) -> String {
        match &self.payload {
            Payload::Blob(data) => {
                let mut out = String::with_capacity(7 + data.len() * 2);
                out.push_str("data=0x");
                for byte in data {
                    out.push_str(&format!("{:02x}", byte));
                }
                out
            }
            Payload::Two([v1, v2]) => {
                format!("val1=0x{:08x}, val2=0x{:08x}", *v1 as u32, *v2 as u32)
            }
            Payload::Four([v1, v2, v3, v4]) => format!(
                "val1=0x{:08x}, val2=0x{:08x}, val3=0x{:08x}, val4=0x{:08x}",
                *v1 as u32, *v2 as u32, *v3 as u32, *v4 as u32
            ),
            Payload::Empty => String::new(),
        }
    }
}

/// Start or stop half of an interval event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    Stop,
}

/// An event id split into its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdParts {
    /// Bits 8-15
    pub class: u8,
    /// Bits 6-7, displayed as A..D
    pub group: u8,
    /// Bits 0-3
    pub slot: u8,
    /// Bit 5
    pub phase: Phase,
}

impl IdParts {
    pub fn is_start(&self) -> bool {
        self.phase == Phase::Start
    }
}

/// Split an event id into class, group, slot and phase
pub fn split_id(id: u16) -> IdParts {
    IdParts {
        class: (id >> 8) as u8,
        group: ((id >> 6) & 0x3) as u8,
        slot: (id & 0xF) as u8,
        phase: if (id >> 5) & 1 == 0 {
            Phase::Start
        } else {
            Phase::Stop
        },
    }
}

/// Scalar produced by the expression evaluator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
}

impl Default for Value {
    fn default() -> Self {
        Value::Integer(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:.6}", v),
        }
    }
}

impl Value {
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    /// Signed view; floats are truncated toward zero
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Integer(v) => *v,
            Value::Float(v) => *v as i64,
        }
    }

    /// Unsigned view; negative integers keep their two's complement bits
    pub fn as_u64(&self) -> u64 {
        match self {
            Value::Integer(v) => *v as u64,
            Value::Float(v) => *v as u64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Integer(v) => *v as f64,
            Value::Float(v) => *v,
        }
    }

    /// Sum of two values; integer only if both sides are integers
    pub fn add(self, other: Value) -> Value {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_add(b)),
            (a, b) => Value::Float(a.as_f64() + b.as_f64()),
        }
    }
}
