#![no_main]

use libfuzzer_sys::fuzz_target;
use softcpu_core::{
    decode, disassemble, BufferConsole, Cpu, CpuConfig, FrameBuffer, Rom, RunBoundary,
};

const STEP_LIMIT: u64 = 4_096;

fuzz_target!(|data: &[u8]| {
    if let Ok(instruction) = decode(data) {
        assert_eq!(instruction.to_bytes().len(), instruction.encoded_len());
    }

    let rows = disassemble(data);
    assert_eq!(rows.iter().map(|row| row.len_bytes()).sum::<usize>(), data.len());

    let config = CpuConfig {
        bits: 16,
        ram_size: 64,
        stack_size: 16,
        printing: true,
        rng_seed: Some(0),
        ..CpuConfig::default()
    };
    let Ok(cpu) = Cpu::new(&config, Rom::from(data)) else {
        return;
    };
    let mut cpu = cpu
        .with_display(Box::new(FrameBuffer::new(8, 8)))
        .with_console(Box::new(BufferConsole::default()));
    if let Err(error) = cpu.run(RunBoundary::Steps(STEP_LIMIT)) {
        assert!(cpu.is_halted());
        assert_eq!(cpu.latched_fault(), Some(error));
    }
});
