use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rv32i_pipeline::{
    config::Config,
    cpu::{ExitReason, CPU},
    registers::RegisterMapping,
    utils::parse_program,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Program to run: one instruction per line, as 32 binary digits or a 0x prefixed hex word
    input: PathBuf,

    /// TOML file with the initial registers, data memory and run limits
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many clock cycles, overrides the config
    #[arg(short, long)]
    max_cycles: Option<u64>,

    /// Don't print the per-cycle report
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let max_cycles = args.max_cycles.unwrap_or(config.general.max_cycles);
    let report = config.general.report && !args.quiet;

    info!("Loading program {}", args.input.display());
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read program {}", args.input.display()))?;
    let rom = parse_program(&text)?;
    info!("{} instructions loaded", rom.len());

    let mut cpu = CPU::with_config(rom, &config)?;

    // Run the CPU
    let exit_reason = cpu.run_with_reports(max_cycles, |cycle_report| {
        if report {
            print!("{cycle_report}");
        }
    });

    println!(
        "{} after {} clock cycles",
        match exit_reason {
            ExitReason::Halted => "program halted",
            ExitReason::Drained => "program finished",
            ExitReason::CycleLimit => "cycle limit reached",
        },
        cpu.get_total_clock_cycles()
    );
    for (number, value) in cpu.registers().into_iter().enumerate() {
        if value != 0 {
            let reg = RegisterMapping::try_from(number as u8)?;
            println!("{reg} = {value:#x}");
        }
    }

    Ok(())
}
