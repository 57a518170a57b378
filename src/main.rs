//! RV32 SoC Simulator CLI.
//!
//! The main executable for the simulator. It handles command-line argument
//! parsing, system initialization, and the main simulation loop.
//!
//! # Usage
//!
//! Loads a flat binary at `general.start_pc` and runs it until the program
//! writes to the system controller, a trap halts the run (with
//! `general.halt_on_trap`) or the cycle budget is exhausted.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use riscv_soc::common::SimError;
use riscv_soc::config::Config;
use riscv_soc::core::RunOutcome;
use riscv_soc::sim::loader;

/// Command-line arguments for the RV32 SoC simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "Cycle-level RV32 SoC simulator")]
struct Args {
    /// TOML configuration; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Flat binary to load at the reset program counter.
    #[arg(short, long)]
    file: PathBuf,

    /// Stop after this many cycles.
    #[arg(long, default_value_t = 10_000_000)]
    max_cycles: u64,

    /// Write the statistics report as JSON to this path.
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Trace every pipeline stage (same as `general.trace_instructions`).
    #[arg(long)]
    trace: bool,
}

/// Main entry point for the simulator.
///
/// # Behavior
///
/// 1. **Configuration**: Parses command-line arguments and loads the TOML configuration file.
/// 2. **Initialization**: Constructs the `System` and the `Cpu` and loads the binary.
/// 3. **Simulation Loop**: Ticks the SoC cycle-by-cycle until it exits, halts or
///    runs out of cycles.
/// 4. **Teardown**: Prints simulation statistics and exits with the target's exit code.
fn main() {
    let args = Args::parse();
    init_tracing(args.trace);

    match run(&args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("\n[!] FATAL: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(force_trace: bool) {
    let filter = if force_trace || cfg!(feature = "always-trace") {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<i32, SimError> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.general.trace_instructions |= args.trace;

    print_config(&config);

    let image = loader::load_binary(&args.file)?;
    println!(
        "[Loader] Writing {} bytes to {:#x}",
        image.len(),
        config.general.start_pc
    );
    let mut cpu = loader::boot(&config, &image)?;

    let code = match cpu.run(args.max_cycles) {
        RunOutcome::Exited(code) => {
            println!("\n[*] Exiting with code {}", code);
            code as i32
        }
        RunOutcome::Halted(record) => {
            eprintln!(
                "\n[!] HALTED ON TRAP: {} at pc={:#010x}",
                record.trap, record.pc
            );
            cpu.dump_state();
            1
        }
        RunOutcome::CycleLimit => {
            eprintln!("\n[!] Cycle limit of {} reached", args.max_cycles);
            cpu.dump_state();
            1
        }
    };

    let report = cpu.report();
    report.print();
    if let Some(path) = &args.stats_json {
        std::fs::write(path, report.to_json()?).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(code)
}

fn print_config(config: &Config) {
    let on_off = |b: bool| if b { "Enabled" } else { "Disabled" };
    println!("Global Configuration");
    println!("--------------------");
    println!("General:");
    println!("  Trace Instructions: {}", config.general.trace_instructions);
    println!("  Start PC:           {:#x}", config.general.start_pc);
    println!("  Trap Vector:        {:#x}", config.general.trap_vector);
    println!("  Halt On Trap:       {}", config.general.halt_on_trap);
    println!("Pipeline:");
    println!("  Branch Predictor:   {:?}", config.pipeline.branch_predictor);
    println!("Cache Hierarchy:");
    for (name, c) in [("L1-I", &config.cache.icache), ("L1-D", &config.cache.dcache)] {
        println!(
            "  {:<20}{} B, {} B lines, {} ways, hit latency {}",
            format!("{}:", name),
            c.size_bytes,
            c.line_bytes,
            c.ways,
            c.hit_latency
        );
    }
    println!(
        "  Bus Cache:          {} ({} B, {} ways, {:?})",
        on_off(config.bus_cache.enabled),
        config.bus_cache.size_bytes,
        config.bus_cache.ways,
        config.bus_cache.write_policy
    );
    println!("Bus:");
    println!("  Max Burst:          {}", config.bus.max_burst);
    println!("  Masters:            {}", 2 + config.bus.extra_masters);
    println!("Memory:");
    println!("  Base:               {:#x}", config.memory.base);
    println!("  Banks:              3 x {} KB", config.memory.bank_size / 1024);
    println!("  Timing:             {:?}", config.memory.timing);
    println!("--------------------");
}
