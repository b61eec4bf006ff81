mod iq_loader;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::{Context, Result};

use lorarx_core::config::DecodeParams;
use lorarx_core::logging::LogConfig;
use lorarx_core::receiver::{DecodeResult, Receiver};
use lorarx_core::streaming::{FrameEvent, StreamingReceiver};

#[derive(Parser, Debug)]
#[command(author, version, about = "One-shot LoRa PHY decoder", long_about = None)]
struct Cli {
    /// Path to a raw interleaved cf32 IQ capture.
    path: PathBuf,

    #[arg(long, default_value_t = 7)]
    sf: u32,
    #[arg(long, default_value_t = 125_000)]
    bw: u32,
    #[arg(long, default_value_t = 500_000)]
    fs: u32,
    #[arg(long, default_value_t = 0)]
    ldro: u32,
    #[arg(long, value_parser = parse_sync_word, default_value = "0x12")]
    sync_word: u8,

    #[arg(long)]
    implicit_header: bool,
    #[arg(long, default_value_t = 0)]
    payload_len: u32,
    #[arg(long, default_value_t = 1)]
    cr: u32,
    #[arg(long)]
    no_crc: bool,
    #[arg(long)]
    has_crc: bool,

    #[arg(long)]
    skip_syncword: bool,

    #[arg(long)]
    streaming: bool,
    #[arg(long, default_value_t = 2048)]
    chunk: usize,
    #[arg(long)]
    payload_bytes: bool,

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

fn build_params(cli: &Cli) -> Result<DecodeParams> {
    let params = DecodeParams {
        sf: cli.sf,
        bandwidth_hz: cli.bw,
        sample_rate_hz: cli.fs,
        ldro_enabled: cli.ldro != 0,
        sync_word: cli.sync_word,
        skip_sync_word_check: cli.skip_syncword,
        implicit_header: cli.implicit_header,
        implicit_payload_length: cli.payload_len,
        implicit_has_crc: !cli.no_crc || cli.has_crc,
        implicit_cr: cli.cr,
        emit_payload_bytes: cli.payload_bytes,
    };
    params.validate().wrap_err("invalid decode parameters")?;
    Ok(params)
}

fn print_result(result: &DecodeResult, debug: bool) {
    println!(
        "frame_synced={} header_ok={} payload_crc_ok={} payload_len={}",
        result.frame_synced as u8,
        result.header_ok as u8,
        result.payload_crc_ok as u8,
        result.payload.len(),
    );
    let hex: String = result.payload.iter().map(|b| format!("{b:02X}")).collect();
    println!("payload_hex={hex}");

    if debug {
        println!(
            "p_ofs_est={} header_payload_len={} raw_payload_symbols={}",
            result.p_ofs_est,
            result.header_payload_length,
            result.raw_payload_symbols.len(),
        );
        if !result.raw_payload_symbols.is_empty() {
            let bins: Vec<String> = result.raw_payload_symbols.iter().map(|b| b.to_string()).collect();
            println!("raw_payload_bins={}", bins.join(","));
        }
    }
}

fn log_config(debug: bool) -> LogConfig {
    if debug {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    }
}

fn run_batch(cli: &Cli, params: DecodeParams) -> Result<(DecodeResult, Vec<String>)> {
    let samples = iq_loader::load_cf32(&cli.path).wrap_err("failed to load IQ file")?;
    let receiver = Receiver::with_log_config(params, log_config(cli.debug))
        .wrap_err("failed to construct receiver")?;
    let result = receiver.decode_samples(&samples)?;
    let log_lines = receiver.logger().entries().iter().map(|e| e.to_string()).collect();
    Ok((result, log_lines))
}

fn run_streaming(cli: &Cli, params: DecodeParams) -> Result<(DecodeResult, Vec<String>)> {
    let samples = iq_loader::load_cf32(&cli.path).wrap_err("failed to load IQ file")?;
    let mut receiver = StreamingReceiver::with_log_config(params, log_config(cli.debug))
        .wrap_err("failed to construct receiver")?;

    let chunk_size = cli.chunk.max(1);
    for chunk in samples.chunks(chunk_size) {
        let events = receiver.push_samples(chunk)?;
        for event in events {
            if let FrameEvent::FrameDone { result, .. } = event {
                let log_lines = receiver.logger().entries().iter().map(|e| e.to_string()).collect();
                return Ok((result, log_lines));
            }
            if let FrameEvent::FrameError { .. } = event {
                let log_lines = receiver.logger().entries().iter().map(|e| e.to_string()).collect();
                return Ok((DecodeResult::default(), log_lines));
            }
        }
    }
    let log_lines = receiver.logger().entries().iter().map(|e| e.to_string()).collect();
    Ok((DecodeResult::default(), log_lines))
}

fn main() -> ExitCode {
    color_eyre::install().ok();
    let cli = Cli::parse();

    let params = match build_params(&cli) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e:?}");
            return ExitCode::from(2);
        }
    };

    let outcome = if cli.streaming {
        run_streaming(&cli, params)
    } else {
        run_batch(&cli, params)
    };

    let (result, log_lines) = match outcome {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e:?}");
            return ExitCode::from(2);
        }
    };

    if cli.debug {
        for line in &log_lines {
            eprintln!("{line}");
        }
    }
    print_result(&result, cli.debug);

    if result.success {
        ExitCode::from(0)
    } else {
        ExitCode::from(1)
    }
}
