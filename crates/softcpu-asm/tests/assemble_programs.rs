//! End-to-end assembly of whole programs, including execution on the core.

#![allow(clippy::pedantic, clippy::nursery)]

use log as _;
use serde_json as _;
use tempfile as _;
use thiserror as _;

use rstest::rstest;
use softcpu_asm::encoder::EncodeError;
use softcpu_asm::parser::ParseError;
use softcpu_asm::symbols::SymbolErrorKind;
use softcpu_asm::{assemble_source, AssembleErrorKind, AssemblerConfig};
use softcpu_core::{disassemble, Cpu, CpuConfig, Rom, RunBoundary};

fn build(source: &str) -> Vec<u8> {
    assemble_source(source, &AssemblerConfig::default())
        .expect("assembles")
        .binary
}

fn run(source: &str) -> Cpu {
    let config = CpuConfig {
        rng_seed: Some(0),
        ..CpuConfig::default()
    };
    let mut cpu = Cpu::new(&config, Rom::new(build(source))).expect("valid config");
    cpu.run(RunBoundary::Steps(10_000)).expect("runs without fault");
    cpu
}

#[test]
fn backward_jump_encodes_label_offset() {
    assert_eq!(
        build("loop: INC r0\nJMP loop"),
        vec![0x68, 0x00, 0x00, 0x49, 0x01, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn forward_reference_resolves_in_pass_two() {
    let binary = build("JMP end\nNOP\nend: HLT");
    assert_eq!(&binary[..6], &[0x49, 0x01, 0x08, 0x00, 0x00, 0x00]);
    assert_eq!(&binary[8..], &[0x22, 0x00]);
}

#[test]
fn mov_immediate_layout() {
    assert_eq!(
        build("MOV r0, 10"),
        vec![0x81, 0x04, 0x00, 0x0A, 0x00, 0x00, 0x00]
    );
}

#[test]
fn labels_may_contain_the_letter_r() {
    let result = assemble_source(
        "error: NOP\nreturn: JMP error\nJMP return\n",
        &AssemblerConfig::default(),
    )
    .expect("assembles");
    assert_eq!(result.symbols["error"].offset, 0);
    assert_eq!(result.symbols["return"].offset, 2);
    assert_eq!(&result.binary[2..8], &[0x49, 0x01, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(&result.binary[8..], &[0x49, 0x01, 0x02, 0x00, 0x00, 0x00]);
}

#[test]
fn mnemonics_are_case_insensitive() {
    assert_eq!(build("hlt"), build("HLT"));
    assert_eq!(build("mov R1, 0x10"), build("MOV r1, 16"));
}

#[test]
fn disassembly_round_trips_assembled_text() {
    let binary = build("MOV r1, -3\nSTR [0x20], r1\nLDR r2, [r1]\nHLT");
    let text: Vec<_> = disassemble(&binary)
        .iter()
        .map(|row| row.text())
        .collect();
    assert_eq!(
        text,
        vec!["MOV r1, -3", "STR [32], r1", "LDR r2, [r1]", "HLT"]
    );
}

#[rstest]
#[case("FOO r0", 1, AssembleErrorKind::Parse(ParseError::UnknownMnemonic("FOO".into())))]
#[case("NOP\nADD r0, r1, r2", 2, AssembleErrorKind::Parse(ParseError::TooManyOperands(3)))]
#[case("MOV r16, 1", 1, AssembleErrorKind::Parse(ParseError::InvalidRegister("r16".into())))]
#[case("STR [70000], 1", 1, AssembleErrorKind::Parse(ParseError::AddressOutOfRange("[70000]".into())))]
#[case("LDR r0, [r1", 1, AssembleErrorKind::Parse(ParseError::MalformedBracket("[r1".into())))]
#[case("MOV r0, 99999999999", 1, AssembleErrorKind::Parse(ParseError::ImmediateOutOfRange("99999999999".into())))]
#[case("NOP\n\nJMP nowhere", 3, AssembleErrorKind::Encode(EncodeError::UndefinedLabel("nowhere".into())))]
fn errors_carry_their_line(
    #[case] source: &str,
    #[case] line: usize,
    #[case] expected: AssembleErrorKind,
) {
    let err = assemble_source(source, &AssemblerConfig::default()).unwrap_err();
    assert_eq!(err.kind, expected);
    assert_eq!(err.line(), Some(line));
}

#[test]
fn duplicate_label_is_rejected() {
    let err = assemble_source("a: NOP\nb: NOP\na: HLT", &AssemblerConfig::default()).unwrap_err();
    let AssembleErrorKind::Symbol(symbol) = &err.kind else {
        panic!("expected symbol error, got {:?}", err.kind);
    };
    assert_eq!(
        symbol.kind,
        SymbolErrorKind::DuplicateLabel {
            name: "a".into(),
            first_definition: 1,
        }
    );
    assert_eq!(err.line(), Some(3));
    assert!(err.to_string().starts_with("line 3: duplicate label 'a'"));
}

#[test]
fn parse_errors_win_over_label_errors() {
    let err = assemble_source("JMP nowhere\nFOO", &AssemblerConfig::default()).unwrap_err();
    assert!(matches!(err.kind, AssembleErrorKind::Parse(_)));
    assert_eq!(err.line(), Some(2));
}

#[test]
fn subroutine_computes_factorial() {
    let cpu = run("\
        MOV r0, 5
        MOV r1, 1
        CALL fact
        HLT
fact:   MUL r1, r0
        DEC r0
        JNZ fact
        RET
");
    assert!(cpu.is_halted());
    assert_eq!(cpu.latched_fault(), None);
    assert_eq!(cpu.register(1), Ok(120));
    assert_eq!(cpu.register(0), Ok(0));
}

#[test]
fn memory_operands_reach_ram() {
    let cpu = run("\
        MOV r2, 20
        STR [r2], 42
        LDR r3, [20]
        MOV [100], 9
        HLT
");
    assert_eq!(cpu.register(3), Ok(42));
    assert_eq!(cpu.read_ram(20), Ok(42));
    assert_eq!(cpu.read_ram(100), Ok(9));
}

#[test]
fn stack_round_trip() {
    let cpu = run("PUSH 7\nPUSH r1\nPOP r2\nPOP r3\nHLT");
    assert_eq!(cpu.register(2), Ok(0));
    assert_eq!(cpu.register(3), Ok(7));
}
