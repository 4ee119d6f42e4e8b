//! Headless Spectrum driver.
//!
//! Loads a ROM (and optionally code), runs a number of frames or until the
//! CPU halts, then prints the register file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use emu_core::Cpu;
use emu_spectrum::{
    EmulationMode, ExecutionCompletionReason, ExecutionOptions, MachineConfig, Result, Spectrum,
    SpectrumModel,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "emu-spectrum", about = "Cycle-accurate ZX Spectrum engine")]
struct Cli {
    /// ROM image: 16 KiB for the 48K, 32 KiB for the 128K.
    #[arg(long)]
    rom: PathBuf,

    /// Machine configuration (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model, when no configuration file is given.
    #[arg(long, value_parser = parse_model, default_value = "spectrum48")]
    model: SpectrumModel,

    /// Frames to run. With --until-halt, the limit in frames (0 for none).
    #[arg(long, default_value_t = 50)]
    frames: u64,

    /// Stop as soon as the CPU halts.
    #[arg(long)]
    until_halt: bool,

    /// Load a file into memory before running: `ADDR:FILE`, ADDR in hex
    /// (`8000`, `0x8000` or `$8000`). May be repeated.
    #[arg(long = "load", value_parser = parse_load)]
    loads: Vec<(u16, PathBuf)>,

    /// Start address.
    #[arg(long, value_parser = parse_hex)]
    pc: Option<u16>,

    /// Print the final machine snapshot as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_model(text: &str) -> std::result::Result<SpectrumModel, String> {
    match text.to_ascii_lowercase().as_str() {
        "48" | "48k" | "spectrum48" => Ok(SpectrumModel::Spectrum48),
        "128" | "128k" | "spectrum128" => Ok(SpectrumModel::Spectrum128),
        other => Err(format!("unknown model '{other}'")),
    }
}

fn parse_hex(text: &str) -> std::result::Result<u16, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid address '{text}': {e}"))
}

fn parse_load(text: &str) -> std::result::Result<(u16, PathBuf), String> {
    let (addr, path) =
        text.split_once(':').ok_or_else(|| format!("expected ADDR:FILE, got '{text}'"))?;
    Ok((parse_hex(addr)?, PathBuf::from(path)))
}

/// Tact limit for `--until-halt`; zero frames means no limit.
fn halt_timeout(frames: u64, frame_tacts: u64) -> u64 {
    frames.saturating_mul(frame_tacts)
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => MachineConfig::load(path)?,
        None => MachineConfig::for_model(cli.model),
    };
    let rom = std::fs::read(&cli.rom)?;

    let mut machine = Spectrum::new(config, &rom)?;
    for (addr, path) in &cli.loads {
        let data = std::fs::read(path)?;
        info!(addr = %format!("{addr:#06X}"), bytes = data.len(), path = %path.display(), "loaded");
        machine.load(*addr, &data);
    }
    if let Some(pc) = cli.pc {
        machine.set_pc(pc);
    }

    let cancel = AtomicBool::new(false);
    if cli.until_halt {
        let options = ExecutionOptions::new(EmulationMode::UntilHalt)
            .with_timeout(halt_timeout(cli.frames, machine.frame_tacts()));
        let reason = machine.execute_cycle(&options, &cancel);
        if reason != ExecutionCompletionReason::Halted {
            warn!(?reason, frames = cli.frames, "CPU did not halt");
        }
    } else {
        let options = ExecutionOptions::new(EmulationMode::UntilFrameEnds);
        for _ in 0..cli.frames {
            let reason = machine.execute_cycle(&options, &cancel);
            if reason != ExecutionCompletionReason::FrameCompleted {
                warn!(?reason, "run stopped early");
                break;
            }
        }
    }

    print_state(&machine);
    if cli.json {
        println!("{}", machine.to_json()?);
    }
    Ok(())
}

fn print_state(machine: &Spectrum) {
    let cpu = machine.cpu();
    let r = cpu.registers();
    println!(
        "AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X}",
        r.af(),
        r.bc(),
        r.de(),
        r.hl(),
        r.ix,
        r.iy
    );
    println!(
        "AF'={:04X} BC'={:04X} DE'={:04X} HL'={:04X}",
        r.af_alt(),
        r.bc_alt(),
        r.de_alt(),
        r.hl_alt()
    );
    println!(
        "SP={:04X} PC={:04X} I={:02X} R={:02X} IM={} IFF1={} HALT={}",
        r.sp,
        r.pc,
        r.i,
        r.r,
        cpu.interrupt_mode(),
        cpu.iff1(),
        cpu.is_halted()
    );
    println!(
        "tacts={} frames={} frame_tact={}",
        machine.tacts(),
        machine.frame_count(),
        machine.frame_tact()
    );
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
