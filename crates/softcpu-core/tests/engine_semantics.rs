//! Instruction semantics exercised through whole programs on a `Cpu`.

#![allow(clippy::pedantic, clippy::nursery)]

use log as _;
use proptest as _;
use rand as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use rstest::rstest;
use softcpu_core::Operand::{Immediate, MemoryAddress, Register, RegisterMemory};
use softcpu_core::{
    Cpu, CpuConfig, CpuError, DecodingError, Flag, Instruction, Opcode, Operand, Rom, RunBoundary,
    Word,
};

fn ins(opcode: Opcode, operands: &[Operand]) -> Instruction {
    Instruction::new(opcode, operands).expect("encodable")
}

fn image(program: &[Instruction]) -> Rom {
    Rom::new(program.iter().flat_map(Instruction::to_bytes).collect())
}

fn offset_of(program: &[Instruction], index: usize) -> i32 {
    let bytes: usize = program[..index].iter().map(Instruction::encoded_len).sum();
    i32::try_from(bytes).expect("small program")
}

fn run_with(config: &CpuConfig, program: &[Instruction]) -> Cpu {
    let mut cpu = Cpu::new(config, image(program)).expect("valid config");
    cpu.run(RunBoundary::Halted).expect("program runs");
    assert!(cpu.is_halted());
    cpu
}

fn run(program: &[Instruction]) -> Cpu {
    run_with(&CpuConfig::default(), program)
}

fn reg(cpu: &Cpu, id: u8) -> Word {
    cpu.register(id).expect("register in range")
}

#[rstest]
#[case(Opcode::Add, 2, 3, 5)]
#[case(Opcode::Adi, -2, 3, 1)]
#[case(Opcode::Sub, 2, 5, -3)]
#[case(Opcode::Sbi, 9, 4, 5)]
#[case(Opcode::Mul, 6, -7, -42)]
#[case(Opcode::Div, -7, 2, -4)]
#[case(Opcode::Div, 7, 2, 3)]
#[case(Opcode::Mod, -7, 3, 2)]
#[case(Opcode::Mod, 7, -3, -2)]
#[case(Opcode::Shl, 1, 4, 16)]
#[case(Opcode::Shr, -16, 2, -4)]
#[case(Opcode::And, 12, 10, 8)]
#[case(Opcode::Or, 12, 10, 14)]
#[case(Opcode::Xor, 12, 10, 6)]
#[case(Opcode::Nand, 12, 10, -9)]
#[case(Opcode::Nor, 12, 10, -15)]
#[case(Opcode::Xnor, 12, 10, -7)]
fn binary_operations(#[case] opcode: Opcode, #[case] a: i32, #[case] b: i32, #[case] expected: Word) {
    let cpu = run(&[
        ins(Opcode::Mov, &[Register(0), Immediate(a)]),
        ins(opcode, &[Register(0), Immediate(b)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(reg(&cpu, 0), expected);
}

#[rstest]
#[case(Opcode::Inc, 41, 42)]
#[case(Opcode::Dec, 0, -1)]
#[case(Opcode::Neg, 5, -5)]
#[case(Opcode::Not, 0, -1)]
fn unary_operations(#[case] opcode: Opcode, #[case] a: i32, #[case] expected: Word) {
    let cpu = run(&[
        ins(Opcode::Mov, &[Register(3), Immediate(a)]),
        ins(opcode, &[Register(3)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(reg(&cpu, 3), expected);
}

#[test]
fn eight_bit_add_wraps_and_sets_overflow_and_negative() {
    let config = CpuConfig {
        bits: 8,
        ..CpuConfig::default()
    };
    let cpu = run_with(
        &config,
        &[
            ins(Opcode::Mov, &[Register(0), Immediate(127)]),
            ins(Opcode::Add, &[Register(0), Immediate(1)]),
            ins(Opcode::Hlt, &[]),
        ],
    );
    assert_eq!(reg(&cpu, 0), -128);
    assert!(cpu.flags().is_set(Flag::Overflow));
    assert!(cpu.flags().is_set(Flag::Negative));
    assert!(!cpu.flags().is_set(Flag::Zero));
    assert!(!cpu.flags().is_set(Flag::Carry));
}

#[test]
fn shift_results_are_capped_and_flags_follow_the_shifted_value() {
    let config = CpuConfig {
        bits: 8,
        ..CpuConfig::default()
    };
    let cpu = run_with(
        &config,
        &[
            ins(Opcode::Mov, &[Register(0), Immediate(64)]),
            ins(Opcode::Shl, &[Register(0), Immediate(2)]),
            ins(Opcode::Hlt, &[]),
        ],
    );
    assert_eq!(reg(&cpu, 0), 0);
    assert!(cpu.flags().is_set(Flag::Zero));
    assert!(cpu.flags().is_set(Flag::Carry));
    assert!(cpu.flags().is_set(Flag::Overflow));
    assert!(!cpu.flags().is_set(Flag::Negative));

    let cpu = run_with(
        &config,
        &[
            ins(Opcode::Mov, &[Register(0), Immediate(-128)]),
            ins(Opcode::Shr, &[Register(0), Immediate(1)]),
            ins(Opcode::Hlt, &[]),
        ],
    );
    assert_eq!(reg(&cpu, 0), -64);
    assert!(cpu.flags().is_set(Flag::Negative));
    assert!(!cpu.flags().is_set(Flag::Overflow));
}

#[test]
fn boolean_operations_clear_arithmetic_flags() {
    let cpu = run(&[
        ins(Opcode::Mov, &[Register(0), Immediate(1)]),
        ins(Opcode::Cmp, &[Register(0), Immediate(2)]),
        ins(Opcode::And, &[Register(0), Immediate(0)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(cpu.flags().to_string(), "Z:1 N:0 O:0 C:0");
}

#[test]
fn mov_leaves_zero_and_negative_untouched() {
    let cpu = run(&[
        ins(Opcode::Cmp, &[Register(0), Register(0)]),
        ins(Opcode::Mov, &[Register(1), Immediate(-5)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(reg(&cpu, 1), -5);
    assert!(cpu.flags().is_set(Flag::Zero));
    assert!(!cpu.flags().is_set(Flag::Negative));
    assert!(cpu.flags().is_set(Flag::Carry));
}

#[test]
fn cmp_and_test_only_touch_flags() {
    let cpu = run(&[
        ins(Opcode::Mov, &[Register(0), Immediate(3)]),
        ins(Opcode::Cmp, &[Register(0), Immediate(5)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(reg(&cpu, 0), 3);
    assert_eq!(cpu.flags().to_string(), "Z:0 N:1 O:0 C:1");

    let cpu = run(&[
        ins(Opcode::Mov, &[Register(0), Immediate(6)]),
        ins(Opcode::Test, &[Register(0), Immediate(1)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(reg(&cpu, 0), 6);
    assert_eq!(cpu.flags().to_string(), "Z:1 N:0 O:0 C:0");
}

#[test]
fn clr_zeroes_every_operand() {
    let cpu = run(&[
        ins(Opcode::Mov, &[Register(0), Immediate(3)]),
        ins(Opcode::Mov, &[Register(1), Immediate(4)]),
        ins(Opcode::Mov, &[Register(2), Immediate(5)]),
        ins(Opcode::Clr, &[Register(0), Register(1)]),
        ins(Opcode::Clr, &[Register(2)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(&cpu.state().registers.values()[..3], &[0, 0, 0]);
}

#[test]
fn memory_operands_read_and_write_ram() {
    let cpu = run(&[
        ins(Opcode::Mov, &[Register(2), Immediate(3)]),
        ins(Opcode::Mov, &[RegisterMemory(2), Immediate(11)]),
        ins(Opcode::Mov, &[Register(0), MemoryAddress(3)]),
        ins(Opcode::Str, &[MemoryAddress(1023), Immediate(9)]),
        ins(Opcode::Ldr, &[Register(1), MemoryAddress(1023)]),
        ins(Opcode::Ldr, &[Register(4), RegisterMemory(2)]),
        ins(Opcode::Str, &[Register(2), Immediate(5)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(reg(&cpu, 0), 11);
    assert_eq!(reg(&cpu, 1), 9);
    assert_eq!(reg(&cpu, 4), 11);
    assert_eq!(cpu.read_ram(3), Ok(5));
}

#[test]
fn ldr_with_register_or_immediate_source_loads_the_value() {
    let cpu = run(&[
        ins(Opcode::Mov, &[Register(1), Immediate(7)]),
        ins(Opcode::Ldr, &[Register(0), Register(1)]),
        ins(Opcode::Ldr, &[Register(2), Immediate(5000)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(cpu.latched_fault(), None);
    assert_eq!(reg(&cpu, 0), 7);
    assert_eq!(reg(&cpu, 2), 5000);
    assert!(cpu.state().ram.populated().is_empty());
}

#[rstest]
#[case(1024)]
#[case(-1)]
fn ram_access_outside_bounds_faults(#[case] address: i32) {
    let program = [
        ins(Opcode::Mov, &[Register(1), Immediate(address)]),
        ins(Opcode::Str, &[Register(1), Immediate(1)]),
        ins(Opcode::Hlt, &[]),
    ];
    let mut cpu = Cpu::new(&CpuConfig::default(), image(&program)).expect("valid config");
    assert_eq!(
        cpu.run(RunBoundary::Halted),
        Err(CpuError::AccessViolation {
            address: Word::from(address)
        })
    );
    assert!(cpu.state().ram.populated().is_empty());
}

#[rstest]
#[case(Opcode::Jmp, 0, 0, true)]
#[case(Opcode::Jz, 3, 3, true)]
#[case(Opcode::Jz, 3, 4, false)]
#[case(Opcode::Jnz, 3, 4, true)]
#[case(Opcode::Jnz, 3, 3, false)]
#[case(Opcode::Jn, 1, 2, true)]
#[case(Opcode::Jn, 2, 1, false)]
#[case(Opcode::Jnn, 2, 1, true)]
#[case(Opcode::Jc, 1, 2, true)]
#[case(Opcode::Jnc, 2, 1, true)]
#[case(Opcode::Jnc, 1, 2, false)]
#[case(Opcode::Jo, i32::MIN, 1, true)]
#[case(Opcode::Jo, 1, 1, false)]
#[case(Opcode::Jno, 1, 1, true)]
fn conditional_jumps_follow_flags(
    #[case] opcode: Opcode,
    #[case] a: i32,
    #[case] b: i32,
    #[case] taken: bool,
) {
    let mut program = vec![
        ins(Opcode::Mov, &[Register(0), Immediate(a)]),
        ins(Opcode::Cmp, &[Register(0), Immediate(b)]),
        ins(opcode, &[Immediate(0)]),
        ins(Opcode::Mov, &[Register(1), Immediate(1)]),
        ins(Opcode::Hlt, &[]),
        ins(Opcode::Mov, &[Register(1), Immediate(2)]),
        ins(Opcode::Hlt, &[]),
    ];
    program[2] = ins(opcode, &[Immediate(offset_of(&program, 5))]);
    let cpu = run(&program);
    assert_eq!(reg(&cpu, 1), if taken { 2 } else { 1 });
}

#[test]
fn call_returns_to_the_instruction_after_call() {
    let mut program = vec![
        ins(Opcode::Call, &[Immediate(0)]),
        ins(Opcode::Mov, &[Register(1), Immediate(7)]),
        ins(Opcode::Hlt, &[]),
        ins(Opcode::Mov, &[Register(0), Immediate(5)]),
        ins(Opcode::Ret, &[]),
    ];
    program[0] = ins(Opcode::Call, &[Immediate(offset_of(&program, 3))]);
    let return_pc = offset_of(&program, 1);

    let mut cpu = Cpu::new(&CpuConfig::default(), image(&program)).expect("valid config");
    cpu.step().expect("call");
    assert_eq!(cpu.state().stack.peek(), Ok(Word::from(return_pc)));
    cpu.run(RunBoundary::Halted).expect("program runs");

    assert_eq!(reg(&cpu, 0), 5);
    assert_eq!(reg(&cpu, 1), 7);
    assert!(cpu.state().stack.is_empty());
}

#[test]
fn push_and_pop_move_values_through_the_stack() {
    let cpu = run(&[
        ins(Opcode::Push, &[Immediate(8)]),
        ins(Opcode::Push, &[Immediate(9)]),
        ins(Opcode::Pop, &[Register(0)]),
        ins(Opcode::Pop, &[MemoryAddress(4)]),
        ins(Opcode::Hlt, &[]),
    ]);
    assert_eq!(reg(&cpu, 0), 9);
    assert_eq!(cpu.read_ram(4), Ok(8));
}

#[test]
fn stack_overflow_restores_pc_to_the_faulting_push() {
    let config = CpuConfig {
        stack_size: 2,
        ..CpuConfig::default()
    };
    let program = [
        ins(Opcode::Push, &[Immediate(1)]),
        ins(Opcode::Push, &[Immediate(2)]),
        ins(Opcode::Push, &[Immediate(3)]),
        ins(Opcode::Hlt, &[]),
    ];
    let mut cpu = Cpu::new(&config, image(&program)).expect("valid config");
    assert_eq!(
        cpu.run(RunBoundary::Halted),
        Err(CpuError::StackOverflow { capacity: 2 })
    );
    assert_eq!(cpu.pc(), 12);
    assert_eq!(cpu.state().stack.len(), 2);
    assert_eq!(cpu.instruction_count(), 2);
}

#[rstest]
#[case(ins(Opcode::Pop, &[Register(0)]))]
#[case(ins(Opcode::Ret, &[]))]
fn empty_stack_underflows(#[case] instruction: Instruction) {
    let mut cpu = Cpu::new(&CpuConfig::default(), image(&[instruction])).expect("valid config");
    assert_eq!(cpu.step(), Err(CpuError::StackUnderflow));
    assert_eq!(cpu.pc(), 0);
}

#[test]
fn division_by_zero_is_precise() {
    let program = [
        ins(Opcode::Mov, &[Register(0), Immediate(1)]),
        ins(Opcode::Div, &[Register(0), Immediate(0)]),
        ins(Opcode::Hlt, &[]),
    ];
    let mut cpu = Cpu::new(&CpuConfig::default(), image(&program)).expect("valid config");
    assert_eq!(cpu.run(RunBoundary::Halted), Err(CpuError::DivisionByZero));
    assert_eq!(cpu.pc(), 7);
    assert_eq!(reg(&cpu, 0), 1);
    assert_eq!(cpu.latched_fault(), Some(CpuError::DivisionByZero));
    assert_eq!(cpu.instruction_count(), 1);
    assert_eq!(cpu.fault_counters().arithmetic, 1);
}

#[test]
fn register_outside_the_configured_file_faults() {
    let config = CpuConfig {
        register_count: 4,
        ..CpuConfig::default()
    };
    let mut cpu = Cpu::new(&config, image(&[ins(Opcode::Mov, &[Register(5), Immediate(1)])]))
        .expect("valid config");
    assert_eq!(cpu.step(), Err(CpuError::InvalidRegister(5)));
}

#[test]
fn immediate_destination_faults() {
    let mut cpu = Cpu::new(
        &CpuConfig::default(),
        image(&[ins(Opcode::Add, &[Immediate(1), Immediate(2)])]),
    )
    .expect("valid config");
    assert_eq!(cpu.step(), Err(CpuError::InvalidWriteTarget));
}

#[test]
fn missing_operand_faults() {
    let mut cpu = Cpu::new(&CpuConfig::default(), image(&[ins(Opcode::Add, &[Register(0)])]))
        .expect("valid config");
    assert_eq!(
        cpu.step(),
        Err(CpuError::MissingOperand {
            opcode: Opcode::Add,
            index: 1
        })
    );
}

#[test]
fn unassigned_opcode_faults() {
    let mut cpu = Cpu::new(&CpuConfig::default(), Rom::new(vec![63, 0])).expect("valid config");
    assert_eq!(cpu.step(), Err(CpuError::InvalidOpcode(63)));
    assert_eq!(cpu.fault_counters().dispatch, 1);
}

#[test]
fn instruction_running_past_rom_end_faults() {
    let mut bytes = ins(Opcode::Mov, &[Register(0), Immediate(10)]).to_bytes();
    bytes.pop();
    let mut cpu = Cpu::new(&CpuConfig::default(), Rom::new(bytes)).expect("valid config");
    assert_eq!(
        cpu.step(),
        Err(CpuError::Decoding(DecodingError::Truncated {
            needed: 7,
            available: 6
        }))
    );
    assert_eq!(cpu.pc(), 0);
}

#[test]
fn running_off_the_end_of_rom_halts_cleanly() {
    let cpu = run(&[ins(Opcode::Inc, &[Register(0)])]);
    assert_eq!(reg(&cpu, 0), 1);
    assert_eq!(cpu.latched_fault(), None);
    assert_eq!(cpu.pc(), 3);
}

#[test]
fn seeded_rnd_is_reproducible_and_bounded() {
    let config = CpuConfig {
        rng_seed: Some(42),
        ..CpuConfig::default()
    };
    let program = [
        ins(Opcode::Rnd, &[Register(0)]),
        ins(Opcode::Rnd, &[Register(1)]),
        ins(Opcode::Hlt, &[]),
    ];
    let first = run_with(&config, &program);
    let second = run_with(&config, &program);
    for id in 0..2 {
        let value = reg(&first, id);
        assert_eq!(value, reg(&second, id));
        assert!((0..=Word::from(i32::MAX)).contains(&value));
    }
}
