//! CLI entry point for the softcpu assembler and runner.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, LevelFilter, Log, Metadata, Record};
use serde_json as _;
use softcpu_asm::assembler::{assemble, AssembleResult, AssemblerConfig};
use softcpu_asm::config::load_config;
use softcpu_core::{Cpu, CpuConfig, FrameBuffer, RegisterFile, Rom, RunBoundary};
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
use thiserror as _;

const USAGE_TEXT: &str = "\
Usage: softcpu <command> [options]

Commands:
  build <input.asm> [-o <output>] [-v] [--config <file>]  Assemble source to a ROM image
  run   <input.asm|input.bin> [options]                   Assemble if needed and execute

Options:
  -o, --output <file>   Output file path (default: input stem + .bin)
  -c, --config <file>   CPU configuration JSON (missing fields use defaults)
  -p, --print           Enable PRT output to stdout (run only)
      --seed <N>        Seed for RND (run only)
      --max-steps <N>   Stop after N instructions (run only)
  -v, --verbose         Print listing (build) and debug logs to stderr
  -h, --help            Show this help message

Examples:
  softcpu build program.asm
  softcpu build program.asm -o program.bin -v
  softcpu run program.asm --print --seed 42
";

/// Frame size of the headless display attached by `run`.
const DISPLAY_WIDTH: usize = 200;
const DISPLAY_HEIGHT: usize = 200;

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logging(verbose: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        });
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Build(BuildArgs),
    Run(RunArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct BuildArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct RunArgs {
    input: PathBuf,
    config: Option<PathBuf>,
    print: bool,
    seed: Option<u64>,
    max_steps: Option<u64>,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "build" => parse_build_args(args)
            .map(Command::Build)
            .map(ParseResult::Command),
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn option_value(
    args: &mut impl Iterator<Item = OsString>,
    flag: &OsString,
) -> Result<OsString, String> {
    args.next()
        .ok_or_else(|| format!("missing value for {}", flag.to_string_lossy()))
}

fn numeric_value(value: &OsString, flag: &str) -> Result<u64, String> {
    value
        .to_string_lossy()
        .parse()
        .map_err(|_| format!("invalid value for {flag}: {}", value.to_string_lossy()))
}

fn set_input(input: &mut Option<PathBuf>, arg: OsString) -> Result<(), String> {
    if arg.to_string_lossy().starts_with('-') {
        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }
    if input.is_some() {
        return Err("multiple input paths provided".to_string());
    }
    *input = Some(PathBuf::from(arg));
    Ok(())
}

#[allow(clippy::while_let_on_iterator)]
fn parse_build_args(mut args: impl Iterator<Item = OsString>) -> Result<BuildArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }
        if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else if arg == "-o" || arg == "--output" {
            output = Some(PathBuf::from(option_value(&mut args, &arg)?));
        } else if arg == "-c" || arg == "--config" {
            config = Some(PathBuf::from(option_value(&mut args, &arg)?));
        } else {
            set_input(&mut input, arg)?;
        }
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(BuildArgs {
        input,
        output,
        config,
        verbose,
    })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut parsed = RunArgs::default();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }
        if arg == "--verbose" || arg == "-v" {
            parsed.verbose = true;
        } else if arg == "--print" || arg == "-p" {
            parsed.print = true;
        } else if arg == "-c" || arg == "--config" {
            parsed.config = Some(PathBuf::from(option_value(&mut args, &arg)?));
        } else if arg == "--seed" {
            parsed.seed = Some(numeric_value(&option_value(&mut args, &arg)?, "--seed")?);
        } else if arg == "--max-steps" {
            parsed.max_steps = Some(numeric_value(
                &option_value(&mut args, &arg)?,
                "--max-steps",
            )?);
        } else {
            set_input(&mut input, arg)?;
        }
    }

    parsed.input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(parsed)
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");

    let parent = input.parent().unwrap_or_else(|| Path::new(""));

    parent.join(format!("{stem}.bin"))
}

fn is_assembly_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("asm"))
}

fn load_cpu_config(path: Option<&Path>) -> Result<CpuConfig, i32> {
    path.map_or_else(
        || Ok(CpuConfig::default()),
        |path| {
            load_config(path).map_err(|e| {
                eprintln!("{}: error: {e}", path.display());
                1
            })
        },
    )
}

fn assemble_file(input: &Path, config: &CpuConfig) -> Result<AssembleResult, i32> {
    assemble(input, &AssemblerConfig::from(config)).map_err(|e| {
        eprintln!("{}", e.format_for_stderr(input));
        if let Some(location) = &e.location {
            eprintln!("    {}", location.text.trim());
        }
        1
    })
}

fn run_build(args: &BuildArgs) -> Result<(), i32> {
    let config = load_cpu_config(args.config.as_deref())?;
    let result = assemble_file(&args.input, &config)?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));

    if let Err(e) = fs::write(&output_path, &result.binary) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    if args.verbose {
        eprint!("{}", result.format_listing());
    }

    println!(
        "Assembled {} ({} bytes) -> {}",
        args.input.display(),
        result.binary.len(),
        output_path.display()
    );

    Ok(())
}

fn run_program(args: &RunArgs) -> Result<(), i32> {
    let mut config = load_cpu_config(args.config.as_deref())?;
    if args.print {
        config.printing = true;
    }
    if args.seed.is_some() {
        config.rng_seed = args.seed;
    }

    let image = if is_assembly_source(&args.input) {
        assemble_file(&args.input, &config)?.binary
    } else {
        fs::read(&args.input).map_err(|e| {
            eprintln!("error: cannot read {}: {e}", args.input.display());
            1
        })?
    };
    debug!("loaded {} byte ROM image", image.len());

    let mut cpu = Cpu::new(&config, Rom::new(image))
        .map_err(|e| {
            eprintln!("error: {e}");
            1
        })?
        .with_display(Box::new(FrameBuffer::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)));

    let boundary = args.max_steps.map_or(RunBoundary::Halted, RunBoundary::Steps);
    let outcome = cpu.run(boundary);
    print_state(&cpu);

    match outcome {
        Ok(outcome) => {
            println!(
                "{} after {} instructions",
                if outcome.halted { "halted" } else { "stopped" },
                outcome.steps
            );
            Ok(())
        }
        Err(fault) => {
            eprintln!("error: fault at pc {:#06x}: {fault}", cpu.pc());
            Err(1)
        }
    }
}

fn print_state(cpu: &Cpu) {
    let snapshot = cpu.snapshot();
    println!("pc: {:#06x}  flags: {}", snapshot.pc, snapshot.flags);
    for (id, value) in snapshot.registers.iter().enumerate() {
        let name = u8::try_from(id).map_or_else(|_| format!("r{id}"), RegisterFile::name);
        println!("{name:>4}: {value}");
    }
    let timings = cpu.step_timings();
    if let (Some(average), Some(max)) = (timings.average(), timings.max()) {
        println!(
            "step time: avg {average:?}  max {max:?}  over last {} steps",
            timings.len()
        );
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Build(args))) => {
            init_logging(args.verbose);
            run_build(&args).err().unwrap_or(0)
        }
        Ok(ParseResult::Command(Command::Run(args))) => {
            init_logging(args.verbose);
            run_program(&args).err().unwrap_or(0)
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
