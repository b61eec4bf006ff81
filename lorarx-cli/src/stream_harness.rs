mod iq_loader;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use num_complex::Complex64;

use lorarx_core::config::DecodeParams;
use lorarx_core::logging::LogConfig;
use lorarx_core::streaming::{FrameEvent, StreamingReceiver};

#[derive(Parser, Debug)]
#[command(author, version, about = "Streaming LoRa PHY decode harness", long_about = None)]
struct Cli {
    /// One or more raw cf32 IQ vectors to decode in sequence.
    inputs: Vec<PathBuf>,

    #[arg(long, default_value_t = 7)]
    sf: u32,
    #[arg(long, default_value_t = 125_000)]
    bw: u32,
    #[arg(long, default_value_t = 500_000)]
    fs: u32,
    #[arg(long, default_value_t = 1)]
    cr: u32,
    #[arg(long)]
    ldro: bool,
    #[arg(long, value_parser = parse_sync_word, default_value = "0x12")]
    sync_word: u8,
    #[arg(long)]
    emit_bytes: bool,
    #[arg(long, default_value_t = 2048)]
    chunk: usize,
    #[arg(long, default_value_t = 8)]
    gap_symbols: usize,
    #[arg(long)]
    debug: bool,
}

fn parse_sync_word(s: &str) -> Result<u8, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    }
    .map_err(|e| e.to_string())?;
    u8::try_from(parsed).map_err(|_| format!("sync word {parsed:#x} does not fit in 8 bits"))
}

/// Per-vector configuration: CLI fallbacks overridden by an optional `.json`
/// sidecar sharing the input's stem.
struct FrameMeta {
    sf: u32,
    bw: u32,
    fs: u32,
    cr: u32,
    ldro: bool,
    implicit: bool,
    crc: bool,
    sync_word: u8,
    payload_hex: Option<String>,
}

fn load_metadata(path: &Path, cli: &Cli) -> Result<FrameMeta> {
    let mut meta = FrameMeta {
        sf: cli.sf,
        bw: cli.bw,
        fs: cli.fs,
        cr: cli.cr,
        ldro: cli.ldro,
        implicit: false,
        crc: true,
        sync_word: cli.sync_word,
        payload_hex: None,
    };

    let sidecar = path.with_extension("json");
    if sidecar.exists() {
        let text = std::fs::read_to_string(&sidecar)
            .wrap_err_with(|| format!("failed to read sidecar {}", sidecar.display()))?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .wrap_err_with(|| format!("failed to parse sidecar {}", sidecar.display()))?;

        if let Some(v) = json.get("sf").and_then(|v| v.as_u64()) {
            meta.sf = v as u32;
        }
        if let Some(v) = json.get("bw").and_then(|v| v.as_u64()) {
            meta.bw = v as u32;
        }
        if let Some(v) = json
            .get("sample_rate")
            .or_else(|| json.get("samp_rate"))
            .and_then(|v| v.as_u64())
        {
            meta.fs = v as u32;
        }
        if let Some(v) = json.get("cr").and_then(|v| v.as_u64()) {
            meta.cr = v as u32;
        }
        if let Some(v) = json.get("ldro_mode").and_then(|v| v.as_bool()) {
            meta.ldro = v;
        }
        if let Some(v) = json
            .get("impl_header")
            .or_else(|| json.get("implicit_header"))
            .and_then(|v| v.as_bool())
        {
            meta.implicit = v;
        }
        if let Some(v) = json.get("crc").and_then(|v| v.as_bool()) {
            meta.crc = v;
        }
        if let Some(v) = json.get("sync_word").and_then(|v| v.as_u64()) {
            meta.sync_word = v as u8;
        }
        if let Some(v) = json.get("payload_hex").and_then(|v| v.as_str()) {
            meta.payload_hex = Some(v.to_string());
        }
    }

    Ok(meta)
}

struct FrameSummary {
    name: String,
    success: bool,
    payload_len: usize,
    bytes_emitted: usize,
    payload_mismatch: bool,
}

fn parse_expected_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

fn run_frame(
    meta: &FrameMeta,
    cli: &Cli,
    name: String,
    samples: &[Complex64],
    gap_samples_before: usize,
) -> Result<FrameSummary> {
    let params = DecodeParams {
        sf: meta.sf,
        bandwidth_hz: meta.bw,
        sample_rate_hz: meta.fs,
        ldro_enabled: meta.ldro,
        sync_word: meta.sync_word,
        skip_sync_word_check: false,
        implicit_header: meta.implicit,
        implicit_payload_length: 0,
        implicit_has_crc: meta.crc,
        implicit_cr: meta.cr,
        emit_payload_bytes: cli.emit_bytes,
    };
    let log_config = if cli.debug { LogConfig::verbose() } else { LogConfig::default() };
    let mut receiver =
        StreamingReceiver::with_log_config(params, log_config).wrap_err("failed to construct receiver")?;

    let mut summary = FrameSummary {
        name,
        success: false,
        payload_len: 0,
        bytes_emitted: 0,
        payload_mismatch: false,
    };
    let mut frame_done = false;
    let mut frame_error = false;
    let expected = meta.payload_hex.as_deref().and_then(parse_expected_hex);

    let mut feed = |receiver: &mut StreamingReceiver, span: &[Complex64]| -> Result<bool> {
        for event in receiver.push_samples(span)? {
            match event {
                FrameEvent::PayloadByte { .. } => summary.bytes_emitted += 1,
                FrameEvent::FrameDone { result, .. } => {
                    frame_done = true;
                    summary.payload_len = result.payload.len();
                    summary.success = result.success;
                    if let Some(expected) = &expected {
                        if &result.payload != expected {
                            summary.payload_mismatch = true;
                        }
                    }
                }
                FrameEvent::FrameError { .. } => {
                    frame_done = true;
                    frame_error = true;
                }
                _ => {}
            }
        }
        Ok(frame_done)
    };

    if gap_samples_before > 0 {
        let zeros = vec![Complex64::new(0.0, 0.0); gap_samples_before];
        for span in zeros.chunks(cli.chunk.max(1)) {
            feed(&mut receiver, span)?;
        }
    }

    let mut done = false;
    for span in samples.chunks(cli.chunk.max(1)) {
        done = feed(&mut receiver, span)?;
        if done {
            break;
        }
    }

    if !done {
        let flush_sps = (meta.fs / meta.bw.max(1)) as usize;
        let flush_samples = flush_sps * cli.gap_symbols.max(2);
        let zeros = vec![Complex64::new(0.0, 0.0); flush_samples];
        for span in zeros.chunks(cli.chunk.max(1)) {
            done = feed(&mut receiver, span)?;
            if done {
                break;
            }
        }
    }

    if !frame_done || frame_error || summary.payload_mismatch {
        summary.success = false;
    }

    if cli.debug || !summary.success {
        for entry in receiver.logger().entries() {
            eprintln!("{entry}");
        }
    }

    Ok(summary)
}

fn main() -> Result<ExitCode> {
    color_eyre::install().ok();
    let cli = Cli::parse();

    if cli.inputs.is_empty() {
        eprintln!("error: no input vectors provided");
        return Ok(ExitCode::from(2));
    }

    let mut all_ok = true;
    let mut gap_samples: Option<usize> = None;
    let mut ok_count = 0usize;
    let mut fail_count = 0usize;
    let mut total_bytes = 0usize;

    for (idx, input) in cli.inputs.iter().enumerate() {
        let meta = load_metadata(input, &cli)?;
        let samples = iq_loader::load_cf32(input)
            .wrap_err_with(|| format!("failed to load {}", input.display()))?;

        let sps = gap_samples.get_or_insert_with(|| cli.gap_symbols * (meta.fs / meta.bw.max(1)) as usize);
        let gap_before = if idx == 0 { 0 } else { *sps };

        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input.display().to_string());
        let summary = run_frame(&meta, &cli, name, &samples, gap_before)?;

        println!(
            "[frame {}] {} sf={} bw={} fs={} cr={} implicit={} crc={} -> success={} payload_len={} payload_bytes_events={} payload_mismatch={}",
            idx + 1,
            summary.name,
            meta.sf,
            meta.bw,
            meta.fs,
            meta.cr,
            if meta.implicit { "yes" } else { "no" },
            if meta.crc { "yes" } else { "no" },
            if summary.success { "yes" } else { "no" },
            summary.payload_len,
            summary.bytes_emitted,
            summary.payload_mismatch as u8,
        );

        total_bytes += summary.bytes_emitted;
        if summary.success {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
        all_ok = all_ok && summary.success;
    }

    println!("[summary] frames_ok={ok_count} frames_failed={fail_count} payload_bytes={total_bytes}");

    Ok(ExitCode::from(if all_ok { 0 } else { 1 }))
}
