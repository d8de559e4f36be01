//! Public host-facing API for embedding the execution engine.

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::cache::{DecodeCache, DEFAULT_DECODE_CACHE_CAPACITY};
use crate::codec::{fetch_length, Instruction};
use crate::execute::{commit_execution, execute_instruction, DisplayOp, ExecuteParams, ExecuteState};
use crate::fault::CpuError;
use crate::inspect::{CpuSnapshot, FaultCounters, Inspector};
use crate::memory::{Rom, DEFAULT_RAM_SIZE, DEFAULT_STACK_SIZE};
use crate::peripherals::{Console, Display, StdoutConsole};
use crate::state::{CpuState, Flags, Word, DEFAULT_REGISTER_COUNT, MAX_REGISTER_COUNT};
use crate::timing::StepTimings;

/// Default word width in bits.
pub const DEFAULT_BITS: u32 = 32;

/// Accepted word widths.
pub const BITS_RANGE: std::ops::RangeInclusive<u32> = 2..=63;

/// Immutable configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CpuConfig {
    /// Word width used for capping arithmetic results.
    pub bits: u32,
    /// Number of general-purpose registers.
    pub register_count: usize,
    /// Number of addressable RAM cells.
    pub ram_size: usize,
    /// Maximum stack depth.
    pub stack_size: usize,
    /// Whether `PRT` writes to the console.
    pub printing: bool,
    /// Seed for `RND`; entropy-seeded when absent.
    pub rng_seed: Option<u64>,
    /// Decode cache capacity in instructions.
    pub decode_cache_capacity: usize,
    /// Whether each retired step's wall-clock duration is recorded.
    pub record_timings: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            bits: DEFAULT_BITS,
            register_count: DEFAULT_REGISTER_COUNT,
            ram_size: DEFAULT_RAM_SIZE,
            stack_size: DEFAULT_STACK_SIZE,
            printing: false,
            rng_seed: None,
            decode_cache_capacity: DEFAULT_DECODE_CACHE_CAPACITY,
            record_timings: false,
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `bits` outside `2..=63`.
    #[error("bits must be within 2..=63, got {0}")]
    BitsOutOfRange(u32),
    /// `register_count` outside `1..=16`.
    #[error("register_count must be within 1..=16, got {0}")]
    RegisterCountOutOfRange(usize),
    /// `decode_cache_capacity` of zero.
    #[error("decode_cache_capacity must be non-zero")]
    ZeroDecodeCache,
}

impl CpuConfig {
    /// Checks every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !BITS_RANGE.contains(&self.bits) {
            return Err(ConfigError::BitsOutOfRange(self.bits));
        }
        if !(1..=MAX_REGISTER_COUNT).contains(&self.register_count) {
            return Err(ConfigError::RegisterCountOutOfRange(self.register_count));
        }
        if self.decode_cache_capacity == 0 {
            return Err(ConfigError::ZeroDecodeCache);
        }
        Ok(())
    }

    const fn execute_params(&self) -> ExecuteParams {
        ExecuteParams {
            bits: self.bits,
            printing: self.printing,
        }
    }
}

/// Output status from one step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// One instruction retired.
    Retired {
        /// Address the instruction was fetched from.
        pc: usize,
        /// The retired instruction.
        instruction: Instruction,
    },
    /// Execution has stopped; nothing ran.
    Halted,
    /// Execution is paused; nothing ran.
    Paused,
}

/// Run loop boundary modes for batched execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunBoundary {
    /// Run until halted or paused.
    Halted,
    /// Run at most this many instructions.
    Steps(u64),
}

/// Aggregated outcome from a batched run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Instructions retired during this call.
    pub steps: u64,
    /// Whether the engine is halted on return.
    pub halted: bool,
}

/// The execution engine: ROM, architectural state and attached capabilities.
pub struct Cpu {
    config: CpuConfig,
    rom: Rom,
    state: CpuState,
    cache: DecodeCache,
    rng: StdRng,
    fault_counters: FaultCounters,
    timings: StepTimings,
    display: Option<Box<dyn Display>>,
    console: Box<dyn Console>,
    inspector: Option<Box<dyn Inspector>>,
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("config", &self.config)
            .field("rom_len", &self.rom.len())
            .field("state", &self.state)
            .field("fault_counters", &self.fault_counters)
            .field("display", &self.display.is_some())
            .field("inspector", &self.inspector.is_some())
            .finish_non_exhaustive()
    }
}

impl Cpu {
    /// Creates a headless engine with zeroed state and `rom` loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails [`CpuConfig::validate`].
    pub fn new(config: &CpuConfig, rom: Rom) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = config
            .rng_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self {
            config: config.clone(),
            rom,
            state: CpuState::new(config.register_count, config.ram_size, config.stack_size),
            cache: DecodeCache::new(config.decode_cache_capacity),
            rng,
            fault_counters: FaultCounters::default(),
            timings: StepTimings::new(),
            display: None,
            console: Box::new(StdoutConsole),
            inspector: None,
        })
    }

    /// Attaches a display driven by the drawing opcodes.
    #[must_use]
    pub fn with_display(mut self, display: Box<dyn Display>) -> Self {
        self.display = Some(display);
        self
    }

    /// Replaces the console used by `PRT`.
    #[must_use]
    pub fn with_console(mut self, console: Box<dyn Console>) -> Self {
        self.console = console;
        self
    }

    /// Attaches an observer notified after each step and on faults.
    #[must_use]
    pub fn with_inspector(mut self, inspector: Box<dyn Inspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// Loaded program image.
    #[must_use]
    pub const fn rom(&self) -> &Rom {
        &self.rom
    }

    /// Full architectural state.
    #[must_use]
    pub const fn state(&self) -> &CpuState {
        &self.state
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> usize {
        self.state.pc
    }

    /// Condition flags.
    #[must_use]
    pub const fn flags(&self) -> Flags {
        self.state.flags
    }

    /// Reads register `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::InvalidRegister`] when `id` is outside the file.
    pub fn register(&self, id: u8) -> Result<Word, CpuError> {
        self.state.registers.read(id)
    }

    /// Reads RAM at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::AccessViolation`] outside `[0, ram_size)`.
    pub fn read_ram(&self, address: Word) -> Result<Word, CpuError> {
        self.state.ram.read(address)
    }

    /// Returns `true` once execution has stopped.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.state.run_state.is_halted()
    }

    /// Returns `true` while paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.state.run_state.is_paused()
    }

    /// The error that halted the engine, if any.
    #[must_use]
    pub const fn latched_fault(&self) -> Option<CpuError> {
        self.state.run_state.latched_fault()
    }

    /// Instructions executed since construction or reset.
    #[must_use]
    pub const fn instruction_count(&self) -> u64 {
        self.state.instruction_count
    }

    /// Fault statistics since construction or reset.
    #[must_use]
    pub const fn fault_counters(&self) -> &FaultCounters {
        &self.fault_counters
    }

    /// Step durations; empty unless `record_timings` is set.
    #[must_use]
    pub const fn step_timings(&self) -> &StepTimings {
        &self.timings
    }

    /// Decode cache, for statistics.
    #[must_use]
    pub const fn decode_cache(&self) -> &DecodeCache {
        &self.cache
    }

    /// Attached display, if any.
    #[must_use]
    pub fn display(&self) -> Option<&dyn Display> {
        self.display.as_deref()
    }

    /// Captures a read-only view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot::capture(&self.state)
    }

    /// Reads the instruction at PC and advances PC past it.
    ///
    /// Returns `None` and halts when PC is at or past the end of ROM.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::Decoding`] when the header is malformed or the
    /// instruction runs past the end of ROM.
    pub fn fetch(&mut self) -> Result<Option<&[u8]>, CpuError> {
        let Some(range) = fetch_bounds(&self.rom, self.state.pc)? else {
            self.state.run_state.halt();
            return Ok(None);
        };
        self.state.pc = range.end;
        Ok(self.rom.as_bytes().get(range))
    }

    /// Executes one instruction unless halted or paused.
    ///
    /// # Errors
    ///
    /// Returns the fault raised by the instruction. The engine restores PC to
    /// the faulting instruction, latches the error and halts.
    pub fn step(&mut self) -> Result<StepOutcome, CpuError> {
        if self.state.run_state.is_halted() {
            return Ok(StepOutcome::Halted);
        }
        if self.state.run_state.is_paused() {
            return Ok(StepOutcome::Paused);
        }
        self.execute_next()
    }

    /// Executes one instruction even while paused, keeping the pause flag.
    ///
    /// # Errors
    ///
    /// Same as [`Cpu::step`].
    pub fn step_single(&mut self) -> Result<StepOutcome, CpuError> {
        if self.state.run_state.is_halted() {
            return Ok(StepOutcome::Halted);
        }
        let was_paused = self.state.run_state.is_paused();
        self.state.run_state.set_paused(false);
        let result = self.execute_next();
        self.state.run_state.set_paused(was_paused);
        result
    }

    /// Stops `step` from executing. Idempotent.
    pub fn pause(&mut self) {
        if !self.state.run_state.is_paused() {
            debug!("pausing at pc {:#06x}", self.state.pc);
        }
        self.state.run_state.set_paused(true);
    }

    /// Lets `step` execute again. Idempotent.
    pub fn resume(&mut self) {
        if self.state.run_state.is_paused() {
            debug!("resuming at pc {:#06x}", self.state.pc);
        }
        self.state.run_state.set_paused(false);
    }

    /// Restarts from a zeroed state, paused, with the same ROM.
    pub fn reset(&mut self) {
        debug!("reset after {} instructions", self.state.instruction_count);
        self.state.reset();
        self.fault_counters.reset();
        self.timings.clear();
        if let Some(display) = self.display.as_mut() {
            display.clear();
        }
    }

    /// Steps until `boundary` is reached, the engine halts or it is paused.
    ///
    /// # Errors
    ///
    /// Returns the first fault raised.
    pub fn run(&mut self, boundary: RunBoundary) -> Result<RunOutcome, CpuError> {
        let mut steps = 0;
        loop {
            if let RunBoundary::Steps(limit) = boundary {
                if steps >= limit {
                    break;
                }
            }
            match self.step()? {
                StepOutcome::Retired { .. } => steps += 1,
                StepOutcome::Halted | StepOutcome::Paused => break,
            }
        }
        Ok(RunOutcome {
            steps,
            halted: self.is_halted(),
        })
    }

    /// Runs in batches of `batch_size` steps, checking `cancel` between
    /// batches.
    ///
    /// # Errors
    ///
    /// Returns the first fault raised.
    pub fn run_until_cancelled(
        &mut self,
        batch_size: u64,
        cancel: &AtomicBool,
    ) -> Result<RunOutcome, CpuError> {
        let batch_size = batch_size.max(1);
        let mut steps = 0;
        while !cancel.load(Ordering::Relaxed) {
            let batch = self.run(RunBoundary::Steps(batch_size))?;
            steps += batch.steps;
            if batch.steps < batch_size {
                break;
            }
        }
        Ok(RunOutcome {
            steps,
            halted: self.is_halted(),
        })
    }

    fn execute_next(&mut self) -> Result<StepOutcome, CpuError> {
        let pc = self.state.pc;
        match self.try_execute(pc) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.state.pc = pc;
                self.state.run_state.latch_fault(error);
                self.fault_counters.record_fault(error, pc);
                if let Some(inspector) = self.inspector.as_mut() {
                    inspector.on_fault(pc, &error);
                }
                warn!("fault at pc {pc:#06x}: {error}");
                Err(error)
            }
        }
    }

    fn try_execute(&mut self, pc: usize) -> Result<StepOutcome, CpuError> {
        let started = self.config.record_timings.then(Instant::now);
        let Some(range) = fetch_bounds(&self.rom, pc)? else {
            self.state.run_state.halt();
            debug!("pc {pc:#06x} reached end of rom, halting");
            return Ok(StepOutcome::Halted);
        };
        self.state.pc = range.end;
        let instruction = self.cache.decode(&self.rom.as_bytes()[range])?;
        self.state.last_instruction = Some(instruction);
        trace!("{pc:#06x}: {instruction}");

        let exec = execute_instruction(
            &instruction,
            &self.state,
            self.config.execute_params(),
            &mut self.rng,
        )?;
        commit_execution(&mut self.state, &exec)?;
        self.forward_effects(&exec);
        self.state.instruction_count += 1;

        if let Some(display) = self.display.as_mut() {
            if display.needs_update() {
                display.update();
            }
        }
        if let Some(inspector) = self.inspector.as_mut() {
            inspector.on_step(&CpuSnapshot::capture(&self.state));
        }
        if exec.halt {
            debug!("halted by {instruction} at pc {pc:#06x}");
        }
        if let Some(started) = started {
            self.timings.record(started.elapsed());
        }
        Ok(StepOutcome::Retired { pc, instruction })
    }

    fn forward_effects(&mut self, exec: &ExecuteState) {
        if let Some(value) = exec.print {
            self.console.print(value);
        }
        let (Some(op), Some(display)) = (exec.display_op, self.display.as_mut()) else {
            return;
        };
        match op {
            DisplayOp::SetPixel { x, y, color } => display.set_pixel(x, y, color),
            DisplayOp::ClearImage => display.clear_image(),
            DisplayOp::SwapBuffer => display.swap_buffer(),
            DisplayOp::SetDrawingTarget(to_buffer) => display.set_drawing_target(to_buffer),
            DisplayOp::SetColor(color) => display.set_color(color),
        }
    }
}

/// Byte range of the instruction at `pc`, or `None` past the end of ROM.
///
/// A missing type byte after an operand-less header is read as zero.
fn fetch_bounds(rom: &Rom, pc: usize) -> Result<Option<Range<usize>>, CpuError> {
    let Some(bytes) = rom.as_bytes().get(pc..).filter(|rest| !rest.is_empty()) else {
        return Ok(None);
    };
    let len = fetch_length(bytes)?;
    Ok(Some(pc..pc + len))
}

#[cfg(test)]
mod tests {
    use super::{fetch_bounds, ConfigError, CpuConfig};
    use crate::fault::{CpuError, DecodingError};
    use crate::memory::Rom;

    #[test]
    fn default_config_matches_reference_values() {
        let config = CpuConfig::default();
        assert_eq!(config.bits, 32);
        assert_eq!(config.register_count, 16);
        assert_eq!(config.ram_size, 1024);
        assert_eq!(config.stack_size, 1024);
        assert!(!config.printing);
        assert_eq!(config.rng_seed, None);
        assert_eq!(config.decode_cache_capacity, 500);
        assert!(!config.record_timings);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_unsupported_shapes() {
        let bits = CpuConfig {
            bits: 64,
            ..CpuConfig::default()
        };
        assert_eq!(bits.validate(), Err(ConfigError::BitsOutOfRange(64)));
        let registers = CpuConfig {
            register_count: 17,
            ..CpuConfig::default()
        };
        assert_eq!(
            registers.validate(),
            Err(ConfigError::RegisterCountOutOfRange(17))
        );
        let cache = CpuConfig {
            decode_cache_capacity: 0,
            ..CpuConfig::default()
        };
        assert_eq!(cache.validate(), Err(ConfigError::ZeroDecodeCache));
    }

    #[test]
    fn fetch_bounds_follow_the_length_table() {
        let rom = Rom::new(vec![0x81, 0x04, 0, 10, 0, 0, 0, 34]);
        assert_eq!(fetch_bounds(&rom, 0), Ok(Some(0..7)));
        assert_eq!(fetch_bounds(&rom, 7), Ok(Some(7..8)));
        assert_eq!(fetch_bounds(&rom, 8), Ok(None));
    }

    #[test]
    fn fetch_bounds_reject_instructions_past_rom_end() {
        let rom = Rom::new(vec![0x40 | 14, 0x01, 0x05]);
        assert_eq!(
            fetch_bounds(&rom, 0),
            Err(CpuError::Decoding(DecodingError::Truncated {
                needed: 6,
                available: 3
            }))
        );
    }
}
