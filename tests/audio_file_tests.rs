// Integration tests for WAV input files
//
// These tests verify that WAV files are read correctly and that a file can be
// played through the recorder as if it were a capture device.

mod common;

use anyhow::Result;
use common::{wait_until, write_wav};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wav_recorder::audio::AudioFile;
use wav_recorder::{
    AudioRecorder, FileSource, PcmFormat, PcmSource, PcmStream, ReadError, RecorderConfig,
    RecordingState, StreamParams,
};

fn ramp(len: usize) -> Vec<i16> {
    (0..len as i16).map(|i| i * 100 - 1000).collect()
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tone.wav");
    write_wav(&path, 16000, 2, &ramp(32));

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.bits_per_sample, 16);
    assert_eq!(audio.samples, ramp(32));
    assert!((audio.duration_seconds - 0.001).abs() < 1e-9);
    assert!(audio.path.contains("tone.wav"));
    assert_eq!(audio.format(), PcmFormat::new(16000, 2));

    Ok(())
}

#[test]
fn test_audio_file_pcm_bytes_are_little_endian() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("le.wav");
    write_wav(&path, 8000, 1, &[0x0102, -2]);

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.pcm_bytes(), vec![0x02, 0x01, 0xFE, 0xFF]);
    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_audio_file_rejects_float_samples() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("float.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    writer.write_sample(0.25f32)?;
    writer.finalize()?;

    assert!(AudioFile::open(&path).is_err(), "Only 16-bit PCM is supported");
    Ok(())
}

#[test]
fn test_file_source_reports_file_format() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("mono.wav");
    write_wav(&path, 22050, 1, &ramp(8));

    let source = FileSource::new(&path);
    let params = StreamParams {
        format: PcmFormat::new(44100, 2),
        buffer_size: 4,
    };
    let mut stream = source.open(&params)?;

    assert_eq!(stream.format(), PcmFormat::new(22050, 1));
    stream.close();
    Ok(())
}

#[test]
fn test_file_source_serves_blocks_then_runs_dry() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("blocks.wav");
    write_wav(&path, 8000, 1, &ramp(5));

    let source = FileSource::new(&path);
    let params = StreamParams {
        format: PcmFormat::new(8000, 1),
        buffer_size: 4,
    };
    let mut stream = source.open(&params)?;
    let mut buf = [0u8; 4];

    assert_eq!(stream.read_block(&mut buf)?, 4);
    assert_eq!(stream.read_block(&mut buf)?, 4);
    assert_eq!(stream.read_block(&mut buf)?, 2, "Last block is short");
    assert_eq!(stream.read_block(&mut buf), Err(ReadError::InvalidOperation));

    // Every open starts over
    let mut again = source.open(&params)?;
    assert_eq!(again.read_block(&mut buf)?, 4);
    assert_eq!(buf.to_vec(), ramp(2).iter().flat_map(|s| s.to_le_bytes()).collect::<Vec<_>>());

    Ok(())
}

#[test]
fn test_file_source_closed_stream_reads_fail() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("closed.wav");
    write_wav(&path, 8000, 1, &ramp(16));

    let mut stream = FileSource::new(&path).open(&StreamParams {
        format: PcmFormat::new(8000, 1),
        buffer_size: 8,
    })?;
    stream.close();

    let mut buf = [0u8; 8];
    assert_eq!(stream.read_block(&mut buf), Err(ReadError::InvalidOperation));
    Ok(())
}

#[tokio::test]
async fn test_recording_a_file_reproduces_its_samples() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("input.wav");
    // Whole blocks only; a trailing short read would be discarded
    let samples = ramp(64);
    write_wav(&input, 11025, 1, &samples);

    let config = RecorderConfig {
        wav_file_dir: Some(dir.path().join("out")),
        buffer_size: Some(16),
        ..RecorderConfig::default()
    };
    let recorder = AudioRecorder::new(Arc::new(FileSource::new(&input)), config);

    recorder.start().await?;
    assert_eq!(recorder.state(), RecordingState::Recording);
    wait_until("file consumed", || {
        std::fs::metadata(dir.path().join("out").join("temp.pcm"))
            .map(|m| m.len() == 128)
            .unwrap_or(false)
    })
    .await;
    let path = recorder.stop().await?;

    let audio = AudioFile::open(&path)?;
    assert_eq!(audio.sample_rate, 11025, "Device format wins over the requested one");
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples, samples);

    Ok(())
}
