//! Forward-reading ZIP extractor.
//!
//! The classic way to read a ZIP archive is from the end: find the End of
//! Central Directory, then the Central Directory, then seek to each member.
//! A streaming load never has the tail until last, so this extractor walks
//! the archive front to back instead, parsing each Local File Header as soon
//! as its bytes arrive and surfacing the decoded entry immediately.
//!
//! The first Central Directory (or End of Central Directory) signature marks
//! the end of the member area and finishes the walk.
//!
//! ## Supported
//!
//! - STORED (no compression) and DEFLATE members
//! - ZIP64 member sizes via the 0x0001 extended-information extra field
//!
//! ## Limitations
//!
//! - Members written with the data-descriptor flag (general purpose bit 3)
//!   carry their sizes *after* the data; a forward pass cannot know where the
//!   data ends, so such archives are rejected as malformed.
//! - No encryption, no multi-disk archives.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;
use std::io::{Cursor, Read};

use super::{ArchiveExtractor, ExtractSignal, UnarchiveError};

/// Local File Header signature (PK\x03\x04) and fixed size
const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
const LFH_SIZE: usize = 30;

/// Central Directory File Header signature (PK\x01\x02)
const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";

/// End of Central Directory signature (PK\x05\x06)
const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";

/// General purpose flag bit 3: sizes deferred to a trailing data descriptor
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

enum Record {
    Member,
    Tail,
    Unknown,
}

/// Streaming ZIP extractor over a growing buffer
#[derive(Debug)]
pub struct ZipStreamExtractor {
    buf: Vec<u8>,
    cursor: usize,
    entries_seen: usize,
    done: bool,
}

impl ZipStreamExtractor {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            cursor: 0,
            entries_seen: 0,
            done: false,
        }
    }

    /// Check whether the leading bytes look like a ZIP archive.
    ///
    /// An archive normally opens with a Local File Header; an empty archive
    /// is nothing but its End of Central Directory.
    pub fn matches(leading: &[u8]) -> bool {
        leading.starts_with(LFH_SIGNATURE) || leading.starts_with(EOCD_SIGNATURE)
    }

    /// Decode as many complete members as the buffer currently holds.
    fn drain(&mut self) -> Result<Vec<ExtractSignal>, UnarchiveError> {
        let mut signals = Vec::new();

        while !self.done {
            if self.buf.len() - self.cursor < 4 {
                break;
            }

            let record = {
                let sig = &self.buf[self.cursor..self.cursor + 4];
                if sig == LFH_SIGNATURE {
                    Record::Member
                } else if sig == CDFH_SIGNATURE
                    || sig == EOCD_SIGNATURE
                    || sig[0..3] == *b"PK\x06"
                {
                    Record::Tail
                } else {
                    Record::Unknown
                }
            };

            match record {
                Record::Member => {
                    let Some(consumed) = self.parse_member(&mut signals)? else {
                        break;
                    };
                    self.cursor += consumed;
                }
                Record::Tail => {
                    // Member area is over; the central directory is not needed
                    self.done = true;
                    signals.push(ExtractSignal::Finished);
                }
                Record::Unknown => {
                    return Err(UnarchiveError::Malformed(
                        "unrecognized record signature".to_string(),
                    ));
                }
            }
        }

        Ok(signals)
    }

    /// Parse one member at the cursor.
    ///
    /// Returns the number of bytes the member occupies, or `None` when the
    /// buffer does not yet hold the whole member.
    fn parse_member(
        &mut self,
        signals: &mut Vec<ExtractSignal>,
    ) -> Result<Option<usize>, UnarchiveError> {
        let rest = &self.buf[self.cursor..];
        if rest.len() < LFH_SIZE {
            return Ok(None);
        }

        let mut header = Cursor::new(&rest[4..LFH_SIZE]);
        let _version_needed = header.read_u16::<LittleEndian>()?;
        let flags = header.read_u16::<LittleEndian>()?;
        let method = header.read_u16::<LittleEndian>()?;
        let _last_mod_time = header.read_u16::<LittleEndian>()?;
        let _last_mod_date = header.read_u16::<LittleEndian>()?;
        let _crc32 = header.read_u32::<LittleEndian>()?;
        let mut compressed_size = header.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = header.read_u32::<LittleEndian>()? as u64;
        let file_name_length = header.read_u16::<LittleEndian>()? as usize;
        let extra_field_length = header.read_u16::<LittleEndian>()? as usize;

        if flags & FLAG_DATA_DESCRIPTOR != 0 {
            return Err(UnarchiveError::Malformed(
                "data-descriptor member sizes cannot be read in a forward pass".to_string(),
            ));
        }

        let extra_start = LFH_SIZE + file_name_length;
        let data_start = extra_start + extra_field_length;
        if rest.len() < data_start {
            return Ok(None);
        }

        // ZIP64 extended information extra field (id 0x0001).
        // Size fields are present only when the header field is 0xFFFFFFFF.
        let mut extra = Cursor::new(&rest[extra_start..data_start]);
        while extra.position() + 4 <= extra_field_length as u64 {
            let header_id = extra.read_u16::<LittleEndian>()?;
            let field_size = extra.read_u16::<LittleEndian>()?;

            if header_id == 0x0001 {
                if uncompressed_size == 0xFFFFFFFF {
                    uncompressed_size = extra.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF {
                    compressed_size = extra.read_u64::<LittleEndian>()?;
                }
                break;
            }
            extra.set_position(extra.position() + field_size as u64);
        }

        let data_len = compressed_size as usize;
        if rest.len() < data_start + data_len {
            return Ok(None);
        }

        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let file_name = String::from_utf8_lossy(&rest[LFH_SIZE..extra_start]).to_string();
        let consumed = data_start + data_len;

        // Directory entries end with '/' and never become pages
        if file_name.ends_with('/') {
            return Ok(Some(consumed));
        }

        let raw = &rest[data_start..data_start + data_len];
        let data = match method {
            0 => raw.to_vec(),
            8 => inflate(raw, uncompressed_size)?,
            m => return Err(UnarchiveError::UnsupportedCompression(m)),
        };

        self.entries_seen += 1;
        signals.push(ExtractSignal::Progress {
            total_entries: self.entries_seen,
            compressed_bytes_read: (self.cursor + consumed) as u64,
        });
        signals.push(ExtractSignal::Entry { file_name, data });

        Ok(Some(consumed))
    }
}

impl Default for ZipStreamExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractor for ZipStreamExtractor {
    fn start(&mut self) -> Result<Vec<ExtractSignal>, UnarchiveError> {
        self.drain()
    }

    fn update(&mut self, bytes: &[u8]) -> Result<Vec<ExtractSignal>, UnarchiveError> {
        if self.done {
            return Ok(Vec::new());
        }
        self.buf.extend_from_slice(bytes);
        self.drain()
    }

    fn stop(&mut self) {
        self.buf = Vec::new();
        self.cursor = 0;
        self.done = true;
    }
}

fn inflate(raw: &[u8], expected_size: u64) -> Result<Vec<u8>, UnarchiveError> {
    let mut out = Vec::with_capacity(expected_size as usize);
    let mut decoder = DeflateDecoder::new(raw);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
