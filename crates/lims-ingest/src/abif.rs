//! Read-only access to ABIF (`.fsa`) capillary electrophoresis files.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! 0   "ABIF"                 magic
//! 4   u16                    version
//! 6   28-byte entry "tdir"   root directory entry
//! ```
//!
//! The root entry's element count is the number of directory entries and
//! its data offset points at them. Each 28-byte entry is
//! `name[4] number:i32 type:i16 size:i16 count:i32 data_size:i32
//! data_offset:i32 handle:i32`; payloads of four bytes or fewer are stored
//! in the data-offset field itself.
//!
//! Only directory and metadata access is provided. Peak calling stays with
//! the external analysis software.

use serde::Serialize;
use thiserror::Error;

pub const ABIF_MAGIC: [u8; 4] = *b"ABIF";

const ROOT_ENTRY_AT: usize = 6;
const HEADER_LEN: usize = ROOT_ENTRY_AT + ENTRY_LEN;
const ENTRY_LEN: usize = 28;

/// ABIF element type codes used by the accessors.
mod element {
    pub const CHAR: i16 = 2;
    pub const SHORT: i16 = 4;
    pub const PSTRING: i16 = 18;
    pub const CSTRING: i16 = 19;
}

/// Raw trace channel numbers: four dye channels plus the size-standard channel.
const TRACE_CHANNELS: [i32; 5] = [1, 2, 3, 4, 105];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbifError {
    #[error("missing ABIF signature")]
    BadMagic,

    #[error("file truncated: {needed} bytes needed at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("directory of {count} entries at offset {offset} lies outside the file")]
    DirectoryOutOfBounds { offset: i64, count: i64 },
}

/// One tag in the ABIF directory, with its payload resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub number: i32,
    pub element_type: i16,
    pub element_size: i16,
    pub element_count: i32,
    pub data: Vec<u8>,
}

impl DirEntry {
    /// Decode the payload as text for string and char-array tags.
    pub fn as_text(&self) -> Option<String> {
        let raw = match self.element_type {
            element::PSTRING => {
                let (&len, rest) = self.data.split_first()?;
                &rest[..rest.len().min(usize::from(len))]
            }
            element::CSTRING | element::CHAR => {
                let end = self
                    .data
                    .iter()
                    .position(|&b| b == 0)
                    .unwrap_or(self.data.len());
                &self.data[..end]
            }
            _ => return None,
        };
        Some(String::from_utf8_lossy(raw).trim().to_string())
    }

    /// Decode a short-array payload.
    pub fn as_shorts(&self) -> Option<Vec<i16>> {
        if self.element_type != element::SHORT {
            return None;
        }
        Some(
            self.data
                .chunks_exact(2)
                .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }
}

/// A parsed ABIF container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbifFile {
    version: u16,
    entries: Vec<DirEntry>,
}

/// Metadata digest of an ABIF file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbifSummary {
    pub version: u16,
    pub sample_name: Option<String>,
    pub instrument: Option<String>,
    pub dye_names: Vec<String>,
    pub channel_count: usize,
    pub entry_count: usize,
}

impl AbifFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, AbifError> {
        if bytes.get(..4) != Some(ABIF_MAGIC.as_slice()) {
            return Err(AbifError::BadMagic);
        }
        if bytes.len() < HEADER_LEN {
            return Err(AbifError::Truncated {
                offset: 0,
                needed: HEADER_LEN,
            });
        }
        let version = u16::from_be_bytes([bytes[4], bytes[5]]);
        let root = read_raw_entry(bytes, ROOT_ENTRY_AT)?;

        let count = i64::from(root.element_count);
        let offset = i64::from(root.data_offset);
        let dir_len = count * ENTRY_LEN as i64;
        if count < 0 || offset < 0 || offset + dir_len > bytes.len() as i64 {
            return Err(AbifError::DirectoryOutOfBounds { offset, count });
        }

        // Bounds were checked above, so the casts cannot truncate.
        let start = offset as usize;
        let entries = (0..count as usize)
            .map(|i| read_raw_entry(bytes, start + i * ENTRY_LEN)?.resolve(bytes))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(version, entries = entries.len(), "parsed ABIF directory");
        Ok(Self { version, entries })
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str, number: i32) -> Option<&DirEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name == name && entry.number == number)
    }

    pub fn text(&self, name: &str, number: i32) -> Option<String> {
        self.entry(name, number).and_then(DirEntry::as_text)
    }

    pub fn sample_name(&self) -> Option<String> {
        self.text("SMPL", 1)
    }

    pub fn instrument(&self) -> Option<String> {
        self.text("MCHN", 1)
    }

    /// Dye names in tag-number order.
    pub fn dye_names(&self) -> Vec<String> {
        let mut dyes: Vec<&DirEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.name == "DyeN")
            .collect();
        dyes.sort_by_key(|entry| entry.number);
        dyes.into_iter().filter_map(DirEntry::as_text).collect()
    }

    /// Number of raw trace channels present.
    pub fn channel_count(&self) -> usize {
        TRACE_CHANNELS
            .iter()
            .filter(|&&number| self.entry("DATA", number).is_some())
            .count()
    }

    /// Raw trace samples of one channel.
    pub fn trace(&self, channel: i32) -> Option<Vec<i16>> {
        self.entry("DATA", channel).and_then(DirEntry::as_shorts)
    }

    pub fn summary(&self) -> AbifSummary {
        AbifSummary {
            version: self.version,
            sample_name: self.sample_name(),
            instrument: self.instrument(),
            dye_names: self.dye_names(),
            channel_count: self.channel_count(),
            entry_count: self.entries.len(),
        }
    }
}

/// Directory entry as stored, before the payload is located.
struct RawEntry {
    name: [u8; 4],
    number: i32,
    element_type: i16,
    element_size: i16,
    element_count: i32,
    data_size: i32,
    data_offset: i32,
    inline: [u8; 4],
}

impl RawEntry {
    fn resolve(self, bytes: &[u8]) -> Result<DirEntry, AbifError> {
        let size = usize::try_from(self.data_size).unwrap_or(0);
        let data = if size <= 4 {
            self.inline[..size].to_vec()
        } else {
            let offset = usize::try_from(self.data_offset).map_err(|_| AbifError::Truncated {
                offset: 0,
                needed: size,
            })?;
            slice(bytes, offset, size)?.to_vec()
        };
        Ok(DirEntry {
            name: String::from_utf8_lossy(&self.name).into_owned(),
            number: self.number,
            element_type: self.element_type,
            element_size: self.element_size,
            element_count: self.element_count,
            data,
        })
    }
}

fn slice(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], AbifError> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(AbifError::Truncated {
            offset,
            needed: len,
        })
}

fn read_raw_entry(bytes: &[u8], at: usize) -> Result<RawEntry, AbifError> {
    let raw = slice(bytes, at, ENTRY_LEN)?;
    let i32_at = |i: usize| i32::from_be_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
    let i16_at = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]);
    Ok(RawEntry {
        name: [raw[0], raw[1], raw[2], raw[3]],
        number: i32_at(4),
        element_type: i16_at(8),
        element_size: i16_at(10),
        element_count: i32_at(12),
        data_size: i32_at(16),
        data_offset: i32_at(20),
        inline: [raw[20], raw[21], raw[22], raw[23]],
    })
}
