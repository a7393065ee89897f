// Tests for the canonical 44-byte WAV header
//
// These tests pin the exact byte layout and verify decoding recovers every field.

use wav_recorder::audio::{PcmFormat, WavHeader, HEADER_LEN};
use wav_recorder::RecordingError;

#[rustfmt::skip]
const CD_STEREO_8000: [u8; HEADER_LEN] = [
    b'R', b'I', b'F', b'F', 0x64, 0x1F, 0x00, 0x00, // RIFF, payload + 36
    b'W', b'A', b'V', b'E',
    b'f', b'm', b't', b' ', 0x10, 0x00, 0x00, 0x00, // fmt chunk of 16 bytes
    0x01, 0x00,                                     // PCM
    0x02, 0x00,                                     // 2 channels
    0x44, 0xAC, 0x00, 0x00,                         // 44100 Hz
    0x10, 0xB1, 0x02, 0x00,                         // 176400 bytes/s
    0x04, 0x00,                                     // block align
    0x10, 0x00,                                     // 16 bits
    b'd', b'a', b't', b'a', 0x40, 0x1F, 0x00, 0x00, // data, 8000 bytes
];

#[test]
fn test_header_encodes_byte_exact() {
    let header = WavHeader::new(PcmFormat::new(44100, 2), 8000);
    assert_eq!(header.encode(), CD_STEREO_8000);
    assert_eq!(header.riff_len(), 8036);
}

#[test]
fn test_header_decodes_all_fields() {
    let header = WavHeader::decode(&CD_STEREO_8000).unwrap();

    assert_eq!(header.format.sample_rate, 44100);
    assert_eq!(header.format.channels, 2);
    assert_eq!(header.format.bits_per_sample, 16);
    assert_eq!(header.data_len, 8000);
}

#[test]
fn test_mono_header_rates() {
    let bytes = WavHeader::new(PcmFormat::new(16000, 1), 0).encode();

    assert_eq!(&bytes[4..8], &36u32.to_le_bytes(), "Empty payload still has 36-byte RIFF body");
    assert_eq!(&bytes[28..32], &32000u32.to_le_bytes());
    assert_eq!(&bytes[32..34], &2u16.to_le_bytes());
}

#[test]
fn test_decode_rejects_short_input() {
    let result = WavHeader::decode(&CD_STEREO_8000[..40]);
    assert!(matches!(result, Err(RecordingError::InvalidHeader(_))));
}

#[test]
fn test_decode_rejects_wrong_tags() {
    let mut bytes = CD_STEREO_8000;
    bytes[8..12].copy_from_slice(b"AVI ");
    assert!(matches!(WavHeader::decode(&bytes), Err(RecordingError::InvalidHeader(_))));

    let mut bytes = CD_STEREO_8000;
    bytes[36..40].copy_from_slice(b"LIST");
    assert!(matches!(WavHeader::decode(&bytes), Err(RecordingError::InvalidHeader(_))));
}

#[test]
fn test_decode_rejects_non_pcm_format() {
    let mut bytes = CD_STEREO_8000;
    bytes[20] = 3; // IEEE float
    assert!(matches!(WavHeader::decode(&bytes), Err(RecordingError::InvalidHeader(_))));
}

#[test]
fn test_decode_rejects_inconsistent_block_align() {
    let mut bytes = CD_STEREO_8000;
    bytes[32] = 2;
    assert!(matches!(WavHeader::decode(&bytes), Err(RecordingError::InvalidHeader(_))));
}

#[test]
fn test_decode_ignores_riff_size_field() {
    // Older writers stored payload + 44 here; only the data chunk size is trusted
    let mut bytes = CD_STEREO_8000;
    bytes[4..8].copy_from_slice(&8044u32.to_le_bytes());

    let header = WavHeader::decode(&bytes).unwrap();
    assert_eq!(header.data_len, 8000);
}
