//! Trace stream readers
//!
//! This module contains the record decoder for the event recorder's binary
//! stream and the sources a stream can be (re)opened from. Each pipeline pass
//! opens its own reader, so a source must be able to hand out fresh readers.

use crate::types::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

pub mod record;

// Re-export reader types
pub use record::{decode_record, RecordReader, RECORD_HEADER_LEN};

/// Something a trace stream can be read from, once per pass
pub trait TraceSource {
    type Reader<'a>: Read
    where
        Self: 'a;

    /// Open the stream positioned at its first record
    fn open(&self) -> Result<Self::Reader<'_>>;
}

/// Trace stream stored in a file
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TraceSource for FileSource {
    type Reader<'a> = BufReader<File>;

    fn open(&self) -> Result<Self::Reader<'_>> {
        log::debug!("Opening event file: {:?}", self.path);
        let file = File::open(&self.path)?;
        Ok(BufReader::new(file))
    }
}

impl TraceSource for [u8] {
    type Reader<'a> = &'a [u8];

    fn open(&self) -> Result<Self::Reader<'_>> {
        Ok(self)
    }
}

impl TraceSource for Vec<u8> {
    type Reader<'a> = &'a [u8];

    fn open(&self) -> Result<Self::Reader<'_>> {
        Ok(self.as_slice())
    }
}
