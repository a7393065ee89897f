//! Canonical 44-byte PCM WAV header and raw-file finalization
//!
//! The recorder streams samples into a headerless raw file while capturing.
//! On stop, [`finalize_wav`] appends those bytes to the output file and
//! rewrites the header so both size fields match the payload actually on disk.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use super::format::PcmFormat;
use crate::error::{FinalizeError, RecordingError};

/// Size of the canonical header
pub const HEADER_LEN: usize = 44;

/// Largest payload whose RIFF chunk size (payload + 36) still fits in 32 bits
pub const MAX_DATA_LEN: u32 = u32::MAX - 36;

/// PCM format code in the `fmt ` chunk
const WAVE_FORMAT_PCM: u16 = 1;

/// Size of the `fmt ` chunk body for plain PCM
const FMT_CHUNK_LEN: u32 = 16;

/// Header fields of a canonical PCM WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub format: PcmFormat,
    /// Payload length in bytes (the `data` chunk size)
    pub data_len: u32,
}

impl WavHeader {
    pub fn new(format: PcmFormat, data_len: u32) -> Self {
        Self { format, data_len }
    }

    /// RIFF chunk size: everything after the first 8 bytes
    pub fn riff_len(&self) -> u32 {
        self.data_len.saturating_add(HEADER_LEN as u32 - 8)
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let format = &self.format;
        let mut header = [0u8; HEADER_LEN];

        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&self.riff_len().to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        header[20..22].copy_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        header[22..24].copy_from_slice(&format.channels.to_le_bytes());
        header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_len.to_le_bytes());

        header
    }

    /// Parse a canonical header; the RIFF size field is not trusted
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordingError> {
        if bytes.len() < HEADER_LEN {
            return Err(RecordingError::InvalidHeader(format!(
                "expected {} bytes, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        let tag = |at: usize, expected: &[u8; 4]| {
            if &bytes[at..at + 4] == expected {
                Ok(())
            } else {
                Err(RecordingError::InvalidHeader(format!(
                    "missing '{}' tag at offset {}",
                    String::from_utf8_lossy(expected),
                    at
                )))
            }
        };
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        tag(0, b"RIFF")?;
        tag(8, b"WAVE")?;
        tag(12, b"fmt ")?;
        tag(36, b"data")?;

        if u32_at(16) != FMT_CHUNK_LEN {
            return Err(RecordingError::InvalidHeader(format!(
                "fmt chunk is {} bytes, expected {}",
                u32_at(16),
                FMT_CHUNK_LEN
            )));
        }
        if u16_at(20) != WAVE_FORMAT_PCM {
            return Err(RecordingError::InvalidHeader(format!(
                "format code {} is not PCM",
                u16_at(20)
            )));
        }

        let format = PcmFormat {
            channels: u16_at(22),
            sample_rate: u32_at(24),
            bits_per_sample: u16_at(34),
        };
        if format.channels == 0 || format.bits_per_sample == 0 {
            return Err(RecordingError::InvalidHeader(
                "zero channels or bits per sample".to_string(),
            ));
        }
        if u32_at(28) != format.byte_rate() || u16_at(32) != format.block_align() {
            return Err(RecordingError::InvalidHeader(
                "byte rate or block align inconsistent with format".to_string(),
            ));
        }

        Ok(Self {
            format,
            data_len: u32_at(40),
        })
    }

    /// Read and parse the header at the start of a file
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, RecordingError> {
        let path = path.as_ref();
        let mut bytes = [0u8; HEADER_LEN];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut bytes))
            .map_err(|e| {
                RecordingError::InvalidHeader(format!("cannot read {}: {}", path.display(), e))
            })?;
        Self::decode(&bytes)
    }
}

/// Turn the raw PCM file at `raw_path` into (or onto) the WAV file at `output_path`
///
/// A missing raw file counts as an empty one. When the output already holds a WAV
/// file of the same format, the raw bytes are appended after its payload and the
/// header is rewritten with the cumulative length; otherwise a new file is written.
/// The prior payload is measured from the file length rather than the old header.
pub fn finalize_wav(
    raw_path: &Path,
    output_path: &Path,
    format: &PcmFormat,
) -> Result<WavHeader, FinalizeError> {
    debug!(
        "Finalizing {} into {}",
        raw_path.display(),
        output_path.display()
    );

    let raw = match File::open(raw_path) {
        Ok(file) => Some(file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(source) => {
            return Err(FinalizeError::ReadRaw {
                path: raw_path.to_path_buf(),
                source,
            })
        }
    };
    let raw_len = match &raw {
        Some(file) => file
            .metadata()
            .map_err(|source| FinalizeError::ReadRaw {
                path: raw_path.to_path_buf(),
                source,
            })?
            .len(),
        None => 0,
    };

    let mut out = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(output_path)
        .map_err(|source| FinalizeError::OpenOutput {
            path: output_path.to_path_buf(),
            source,
        })?;

    let existing_len = out
        .metadata()
        .map_err(|source| FinalizeError::OpenOutput {
            path: output_path.to_path_buf(),
            source,
        })?
        .len();

    let prior_len = if existing_len == 0 {
        // Reserve the header; it is rewritten once the payload length is known
        out.write_all(&WavHeader::new(*format, 0).encode())
            .map_err(FinalizeError::WriteHeader)?;
        0
    } else {
        check_existing_header(&mut out, output_path, existing_len, format)?;
        existing_len - HEADER_LEN as u64
    };

    if prior_len + raw_len > MAX_DATA_LEN as u64 {
        return Err(FinalizeError::TooLarge(prior_len + raw_len));
    }

    out.seek(SeekFrom::End(0))
        .map_err(FinalizeError::WritePayload)?;
    let copied = match raw {
        Some(file) => {
            let mut reader = BufReader::new(file);
            io::copy(&mut reader, &mut out).map_err(FinalizeError::WritePayload)?
        }
        None => 0,
    };

    let total = prior_len + copied;
    let data_len = u32::try_from(total)
        .ok()
        .filter(|len| *len <= MAX_DATA_LEN)
        .ok_or(FinalizeError::TooLarge(total))?;

    let header = WavHeader::new(*format, data_len);
    out.seek(SeekFrom::Start(0))
        .and_then(|_| out.write_all(&header.encode()))
        .and_then(|_| out.sync_all())
        .map_err(FinalizeError::WriteHeader)?;

    info!(
        "WAV finalized: {} ({} bytes payload, {} appended, {:.1}s)",
        output_path.display(),
        data_len,
        copied,
        format.duration_secs(data_len as u64)
    );

    Ok(header)
}

/// Verify an existing output file can take more payload in `format`
fn check_existing_header(
    out: &mut File,
    path: &Path,
    existing_len: u64,
    format: &PcmFormat,
) -> Result<(), FinalizeError> {
    let incompatible = |reason: String| FinalizeError::IncompatibleOutput {
        path: path.to_path_buf(),
        reason,
    };

    if existing_len < HEADER_LEN as u64 {
        return Err(incompatible(format!(
            "{} bytes is shorter than a WAV header",
            existing_len
        )));
    }

    let mut bytes = [0u8; HEADER_LEN];
    out.seek(SeekFrom::Start(0))
        .and_then(|_| out.read_exact(&mut bytes))
        .map_err(|source| FinalizeError::OpenOutput {
            path: path.to_path_buf(),
            source,
        })?;

    let existing = WavHeader::decode(&bytes).map_err(|e| incompatible(e.to_string()))?;
    if existing.format != *format {
        return Err(incompatible(format!(
            "holds {}Hz / {} channels / {}-bit audio",
            existing.format.sample_rate,
            existing.format.channels,
            existing.format.bits_per_sample
        )));
    }

    Ok(())
}

/// Remove a temporary raw file; a file that is already gone is not an error
pub fn remove_raw_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
