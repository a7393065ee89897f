use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;
use wav_recorder::{
    AudioFile, AudioRecorder, Config, InitOptions, PcmSourceFactory, PcmSourceKind, WavHeader,
};

#[derive(Debug, Parser)]
#[command(name = "wav-recorder", version, about = "Record microphone audio to a WAV file")]
struct Cli {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/wav-recorder")]
    config: String,

    /// Log debug output, including amplitude events
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record for a fixed time, then finalize the WAV file
    Record(RecordArgs),
    /// Print the header and duration of a WAV file
    Inspect {
        /// WAV file to inspect
        path: PathBuf,
    },
}

#[derive(Debug, clap::Args)]
struct RecordArgs {
    /// Seconds of audio to capture
    #[arg(short, long, default_value_t = 5.0)]
    seconds: f64,

    /// Override the configured source
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// WAV file to play through the pipeline when --source file
    #[arg(long, required_if_eq("source", "file"))]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(long)]
    wav_file_dir: Option<String>,

    /// Output file name
    #[arg(long)]
    wav_file: Option<String>,

    /// Pause for this many seconds halfway through, then resume
    #[arg(long)]
    pause_secs: Option<f64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Microphone,
    Synthetic,
    File,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Command::Record(args) => record(&cli.config, args).await,
        Command::Inspect { path } => inspect(&path),
    }
}

async fn record(config_path: &str, args: RecordArgs) -> Result<()> {
    let cfg = if Path::new(&format!("{}.toml", config_path)).exists() {
        Config::load(config_path)?
    } else {
        info!("No config at {}, using defaults", config_path);
        Config::default()
    };

    info!("{} starting", cfg.service.name);

    let kind = match (args.source, args.input) {
        (Some(SourceArg::File), Some(path)) => PcmSourceKind::File {
            path,
            realtime: true,
        },
        (Some(SourceArg::Microphone), _) => PcmSourceKind::Microphone,
        (Some(SourceArg::Synthetic), _) => PcmSourceKind::Synthetic {
            frequency_hz: 440.0,
            level: 0.5,
        },
        _ => cfg.source.clone(),
    };

    let source = PcmSourceFactory::create(&kind).context("Failed to create PCM source")?;
    let recorder = AudioRecorder::new(source, cfg.recorder);

    recorder.on(
        "onGetMaxAmplitude",
        Arc::new(|_: &str, payload: Value| {
            tracing::debug!("amplitude {}", payload["current"]);
        }),
    )?;

    recorder
        .init(InitOptions {
            wav_file_dir: args.wav_file_dir,
            wav_file: args.wav_file,
        })
        .await;

    recorder.start().await.context("Failed to start recording")?;

    match args.pause_secs {
        Some(pause) => {
            let half = Duration::from_secs_f64(args.seconds / 2.0);
            tokio::time::sleep(half).await;
            recorder.pause().await?;
            info!("Paused for {:.1}s", pause);
            tokio::time::sleep(Duration::from_secs_f64(pause)).await;
            recorder.resume().await?;
            tokio::time::sleep(half).await;
        }
        None => tokio::time::sleep(Duration::from_secs_f64(args.seconds)).await,
    }

    let stats = recorder.stats().await;
    info!("Captured {:.1}s of audio", stats.audio_secs);

    let path = recorder
        .stop()
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.code(), e))?;
    println!("{}", path.display());

    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let header = WavHeader::read_from(path)?;
    let file_len = std::fs::metadata(path)?.len();

    println!("File:            {}", path.display());
    println!("Sample rate:     {} Hz", header.format.sample_rate);
    println!("Channels:        {}", header.format.channels);
    println!("Bits per sample: {}", header.format.bits_per_sample);
    println!("Payload:         {} bytes", header.data_len);
    println!(
        "Consistent:      {}",
        file_len == header.data_len as u64 + wav_recorder::audio::HEADER_LEN as u64
    );

    let audio = AudioFile::open(path)?;
    println!("Duration:        {:.2}s", audio.duration_seconds);

    Ok(())
}
