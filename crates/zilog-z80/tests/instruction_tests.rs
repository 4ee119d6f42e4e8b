//! Instruction semantics and tact counts, one instruction per call.

use emu_core::{Cpu, MemoryDevice, Observable, SimpleBus, Tacts, Value};
use zilog_z80::{CF, HF, IndexMode, NF, PF, PrefixMode, Registers, SF, Z80, ZF};

fn machine(program: &[u8]) -> (Z80, SimpleBus) {
    let mut bus = SimpleBus::new();
    bus.load(0x0000, program);
    (Z80::new(), bus)
}

/// Execute `count` cycles and return the tacts they took.
fn step(cpu: &mut Z80, bus: &mut SimpleBus, count: usize) -> u64 {
    let start = cpu.tacts();
    for _ in 0..count {
        cpu.execute_cpu_cycle(bus);
    }
    cpu.tacts().get() - start.get()
}

fn run_until_halt(cpu: &mut Z80, bus: &mut SimpleBus) -> usize {
    let mut count = 0;
    while !cpu.is_halted() && count < 100_000 {
        cpu.execute_cpu_cycle(bus);
        count += 1;
    }
    count
}

#[test]
fn ld_sp_nn_from_reset() {
    let (mut cpu, mut bus) = machine(&[0x31, 0x26, 0xA9]); // LD SP, A926H

    assert_eq!(step(&mut cpu, &mut bus, 1), 10);

    let expected = Registers {
        sp: 0xA926,
        pc: 0x0003,
        r: 1,
        ..Registers::default()
    };
    assert_eq!(*cpu.registers(), expected);
    assert_eq!(cpu.tacts(), Tacts(10));
}

#[test]
fn halt_repeats_four_tact_refresh_cycles() {
    let (mut cpu, mut bus) = machine(&[0x00, 0x76]); // NOP; HALT
    step(&mut cpu, &mut bus, 2);
    assert!(cpu.is_halted());
    assert_eq!(cpu.registers().pc, 0x0001, "PC stays on the HALT opcode");

    for n in 1..=20u8 {
        let r_before = cpu.registers().r;
        assert_eq!(step(&mut cpu, &mut bus, 1), 4);
        assert_eq!(cpu.registers().pc, 0x0001);
        assert_eq!(cpu.registers().r, (r_before + 1) & 0x7F, "cycle {n}");
    }
}

#[test]
fn halt_refresh_wraps_within_low_seven_bits() {
    let (mut cpu, mut bus) = machine(&[0x76]);
    cpu.registers_mut().r = 0xFE;
    step(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.registers().r, 0xFF);
    step(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.registers().r, 0x80, "bit 7 survives the wrap");
}

#[test]
fn index_prefix_does_not_leak_into_next_instruction() {
    let (mut cpu, mut bus) = machine(&[
        0xDD, 0x21, 0x34, 0x12, // LD IX, 1234H
        0x21, 0x78, 0x56, // LD HL, 5678H
    ]);

    assert_eq!(step(&mut cpu, &mut bus, 1), 14);
    assert_eq!(cpu.prefix_mode(), PrefixMode::None);
    assert_eq!(cpu.index_mode(), IndexMode::None);

    assert_eq!(step(&mut cpu, &mut bus, 1), 10);
    assert_eq!(cpu.registers().ix, 0x1234);
    assert_eq!(cpu.registers().hl(), 0x5678);
}

#[test]
fn later_index_prefix_wins() {
    let (mut cpu, mut bus) = machine(&[0xDD, 0xFD, 0x21, 0xCD, 0xAB]); // DD; LD IY, ABCDH
    assert_eq!(step(&mut cpu, &mut bus, 1), 18);
    assert_eq!(cpu.registers().iy, 0xABCD);
    assert_eq!(cpu.registers().ix, 0x0000);
    assert_eq!(cpu.registers().r, 3, "three M1 cycles");
}

#[test]
fn ed_after_index_prefix_ignores_the_index() {
    let (mut cpu, mut bus) = machine(&[0xDD, 0xED, 0x44]); // DD; NEG
    cpu.registers_mut().a = 0x01;
    assert_eq!(step(&mut cpu, &mut bus, 1), 12);
    assert_eq!(cpu.registers().a, 0xFF);
}

#[test]
fn indexed_memory_operands() {
    let (mut cpu, mut bus) = machine(&[
        0xDD, 0x21, 0x00, 0x80, // LD IX, 8000H
        0xDD, 0x36, 0x05, 0x42, // LD (IX+5), 42H
        0xDD, 0x7E, 0x05, // LD A, (IX+5)
        0xDD, 0x66, 0xFF, // LD H, (IX-1)
        0xDD, 0x34, 0x05, // INC (IX+5)
    ]);
    bus.load(0x7FFF, &[0x99]);

    assert_eq!(step(&mut cpu, &mut bus, 1), 14);
    assert_eq!(step(&mut cpu, &mut bus, 1), 19);
    assert_eq!(bus.peek(0x8005), 0x42);
    assert_eq!(step(&mut cpu, &mut bus, 1), 19);
    assert_eq!(cpu.registers().a, 0x42);
    assert_eq!(step(&mut cpu, &mut bus, 1), 19);
    assert_eq!(cpu.registers().h, 0x99, "H, not IXH, with an (IX+d) operand");
    assert_eq!(cpu.registers().ix, 0x8000);
    assert_eq!(step(&mut cpu, &mut bus, 1), 23);
    assert_eq!(bus.peek(0x8005), 0x43);
    assert_eq!(cpu.registers().wz, 0x8005);
}

#[test]
fn index_register_halves() {
    let (mut cpu, mut bus) = machine(&[
        0xFD, 0x26, 0x12, // LD IYH, 12H
        0xFD, 0x2E, 0x34, // LD IYL, 34H
        0xFD, 0x7C, // LD A, IYH
        0xFD, 0x85, // ADD A, IYL
    ]);
    assert_eq!(step(&mut cpu, &mut bus, 4), 11 + 11 + 8 + 8);
    assert_eq!(cpu.registers().iy, 0x1234);
    assert_eq!(cpu.registers().a, 0x46);
    assert_eq!(cpu.registers().hl(), 0x0000);
}

#[test]
fn cb_register_and_memory_forms() {
    let (mut cpu, mut bus) = machine(&[
        0xCB, 0x00, // RLC B
        0xCB, 0x46, // BIT 0, (HL)
        0xCB, 0xFE, // SET 7, (HL)
    ]);
    cpu.registers_mut().b = 0x81;
    cpu.registers_mut().set_hl(0x9000);

    assert_eq!(step(&mut cpu, &mut bus, 1), 8);
    assert_eq!(cpu.registers().b, 0x03);
    assert_ne!(cpu.registers().f & CF, 0);

    assert_eq!(step(&mut cpu, &mut bus, 1), 12);
    assert_ne!(cpu.registers().f & ZF, 0);
    assert_ne!(cpu.registers().f & HF, 0);

    assert_eq!(step(&mut cpu, &mut bus, 1), 15);
    assert_eq!(bus.peek(0x9000), 0x80);
}

#[test]
fn indexed_bit_instructions() {
    let (mut cpu, mut bus) = machine(&[
        0xDD, 0xCB, 0x02, 0x06, // RLC (IX+2)
        0xDD, 0xCB, 0x02, 0x00, // RLC (IX+2), B
        0xDD, 0xCB, 0x02, 0x4E, // BIT 1, (IX+2)
    ]);
    cpu.registers_mut().ix = 0xA800;
    bus.load(0xA802, &[0x40]);

    assert_eq!(step(&mut cpu, &mut bus, 1), 23);
    assert_eq!(bus.peek(0xA802), 0x80);
    assert_eq!(cpu.registers().r, 2, "DDCB final opcode is not an M1 cycle");

    assert_eq!(step(&mut cpu, &mut bus, 1), 23);
    assert_eq!(bus.peek(0xA802), 0x01);
    assert_eq!(cpu.registers().b, 0x01);

    assert_eq!(step(&mut cpu, &mut bus, 1), 20);
    assert_ne!(cpu.registers().f & ZF, 0);
    // Undocumented bits from the high byte of the effective address.
    assert_eq!(cpu.registers().f & 0x28, 0xA8 & 0x28);
}

#[test]
fn call_and_return() {
    let (mut cpu, mut bus) = machine(&[
        0x31, 0x00, 0x80, // LD SP, 8000H
        0xCD, 0x10, 0x00, // CALL 0010H
        0x76, // HALT
    ]);
    bus.load(0x0010, &[0x3E, 0x99, 0xC9]); // LD A, 99H; RET

    let count = run_until_halt(&mut cpu, &mut bus);
    assert_eq!(count, 5);
    assert_eq!(cpu.registers().a, 0x99);
    assert_eq!(cpu.registers().sp, 0x8000);
    assert_eq!(cpu.tacts(), Tacts(10 + 17 + 7 + 10 + 4));
}

#[test]
fn conditional_call_and_return_timing() {
    let (mut cpu, mut bus) = machine(&[
        0x31, 0x00, 0x80, // LD SP, 8000H
        0xC4, 0x20, 0x00, // CALL NZ, 0020H (Z clear: taken)
        0xCC, 0x20, 0x00, // CALL Z, 0020H (not taken)
    ]);
    bus.load(0x0020, &[0xC8, 0xC0]); // RET Z (not taken); RET NZ (taken)

    step(&mut cpu, &mut bus, 1);
    assert_eq!(step(&mut cpu, &mut bus, 1), 17);
    assert_eq!(cpu.registers().pc, 0x0020);
    assert_eq!(step(&mut cpu, &mut bus, 1), 5);
    assert_eq!(step(&mut cpu, &mut bus, 1), 11);
    assert_eq!(cpu.registers().pc, 0x0006);
    assert_eq!(step(&mut cpu, &mut bus, 1), 10);
    assert_eq!(cpu.registers().pc, 0x0009);
}

#[test]
fn push_pop_af() {
    let (mut cpu, mut bus) = machine(&[
        0x31, 0x00, 0x80, // LD SP, 8000H
        0xF5, // PUSH AF
        0xC1, // POP BC
    ]);
    cpu.registers_mut().set_af(0x12D7);
    step(&mut cpu, &mut bus, 1);
    assert_eq!(step(&mut cpu, &mut bus, 1), 11);
    assert_eq!(step(&mut cpu, &mut bus, 1), 10);
    assert_eq!(cpu.registers().bc(), 0x12D7);
}

#[test]
fn djnz_loop_timing() {
    let (mut cpu, mut bus) = machine(&[
        0x06, 0x03, // LD B, 3
        0x10, 0xFE, // DJNZ $
    ]);
    assert_eq!(step(&mut cpu, &mut bus, 4), 7 + 13 + 13 + 8);
    assert_eq!(cpu.registers().b, 0);
    assert_eq!(cpu.registers().pc, 0x0004);
}

#[test]
fn jr_conditional() {
    let (mut cpu, mut bus) = machine(&[
        0xAF, // XOR A (sets Z)
        0x20, 0x10, // JR NZ, +16 (not taken)
        0x28, 0x02, // JR Z, +2 (taken)
    ]);
    step(&mut cpu, &mut bus, 1);
    assert_eq!(step(&mut cpu, &mut bus, 1), 7);
    assert_eq!(step(&mut cpu, &mut bus, 1), 12);
    assert_eq!(cpu.registers().pc, 0x0007);
    assert_eq!(cpu.registers().wz, 0x0007);
}

#[test]
fn ldir_copies_block() {
    let (mut cpu, mut bus) = machine(&[0xED, 0xB0]); // LDIR
    bus.load(0x9000, &[1, 2, 3]);
    cpu.registers_mut().set_hl(0x9000);
    cpu.registers_mut().set_de(0xA000);
    cpu.registers_mut().set_bc(3);

    assert_eq!(step(&mut cpu, &mut bus, 3), 21 + 21 + 16);
    assert_eq!(cpu.registers().bc(), 0);
    assert_eq!(cpu.registers().pc, 0x0002);
    assert_eq!(cpu.registers().f & PF, 0);
    assert_eq!(bus.peek(0xA000), 1);
    assert_eq!(bus.peek(0xA002), 3);
}

#[test]
fn cpir_stops_on_match() {
    let (mut cpu, mut bus) = machine(&[0xED, 0xB1]); // CPIR
    bus.load(0x9000, &[7, 8, 9, 10]);
    cpu.registers_mut().set_hl(0x9000);
    cpu.registers_mut().set_bc(4);
    cpu.registers_mut().a = 9;

    assert_eq!(step(&mut cpu, &mut bus, 3), 21 + 21 + 16);
    assert_eq!(cpu.registers().hl(), 0x9003);
    assert_eq!(cpu.registers().bc(), 1);
    assert_ne!(cpu.registers().f & ZF, 0);
    assert_ne!(cpu.registers().f & PF, 0);
    assert_ne!(cpu.registers().f & NF, 0);
}

#[test]
fn out_and_in_use_accumulator_high_byte() {
    let (mut cpu, mut bus) = machine(&[
        0x3E, 0x12, // LD A, 12H
        0xD3, 0xFE, // OUT (FEH), A
        0xDB, 0xFE, // IN A, (FEH)
    ]);
    bus.set_port_input(0xBF);

    assert_eq!(step(&mut cpu, &mut bus, 2), 7 + 11);
    // The I/O cycle starts after the opcode fetch and the operand read.
    assert_eq!(bus.port_writes(), &[(0x12FE, 0x12, Tacts(14))]);

    assert_eq!(step(&mut cpu, &mut bus, 1), 11);
    assert_eq!(cpu.registers().a, 0xBF);
    assert_eq!(cpu.registers().wz, 0x12FF);
}

#[test]
fn in_r_c_sets_flags() {
    let (mut cpu, mut bus) = machine(&[0xED, 0x78]); // IN A, (C)
    bus.set_port_input(0x00);
    cpu.registers_mut().f = CF;
    assert_eq!(step(&mut cpu, &mut bus, 1), 12);
    assert_eq!(cpu.registers().f, ZF | PF | CF);
}

#[test]
fn contention_is_charged_before_data_is_used() {
    let (mut cpu, mut bus) = machine(&[0x3A, 0x00, 0x40]); // LD A, (4000H)
    bus.load(0x4000, &[0x5A]);
    bus.set_contention(0x4000..=0x7FFF, 2);

    assert_eq!(step(&mut cpu, &mut bus, 1), 13 + 2);
    assert_eq!(cpu.registers().a, 0x5A);
    // Fetch at 0, operands at 4 and 7, data read starts at 10.
    let starts: Vec<_> = bus.memory_accesses().iter().map(|(_, t)| t.get()).collect();
    assert_eq!(starts, vec![0, 4, 7, 10]);
}

#[test]
fn contended_opcode_fetch() {
    let (mut cpu, mut bus) = machine(&[]);
    bus.set_contention(0x4000..=0x7FFF, 5);
    cpu.registers_mut().pc = 0x4000; // NOP
    assert_eq!(step(&mut cpu, &mut bus, 1), 9);
}

#[test]
fn ex_sp_hl_timing() {
    let (mut cpu, mut bus) = machine(&[0xE3]);
    bus.load(0x8000, &[0x34, 0x12]);
    cpu.registers_mut().sp = 0x8000;
    cpu.registers_mut().set_hl(0xBEEF);
    assert_eq!(step(&mut cpu, &mut bus, 1), 19);
    assert_eq!(cpu.registers().hl(), 0x1234);
    assert_eq!(bus.peek(0x8000), 0xEF);
    assert_eq!(bus.peek(0x8001), 0xBE);
}

#[test]
fn undefined_ed_opcode_is_a_nop() {
    let (mut cpu, mut bus) = machine(&[0xED, 0x00]);
    let before = *cpu.registers();
    assert_eq!(step(&mut cpu, &mut bus, 1), 8);
    assert_eq!(cpu.registers().pc, 2);
    assert_eq!(cpu.registers().af(), before.af());
}

#[test]
fn ld_a_i_reports_iff2() {
    let (mut cpu, mut bus) = machine(&[0xED, 0x57]);
    cpu.registers_mut().i = 0x80;
    cpu.set_iff(true);
    assert_eq!(step(&mut cpu, &mut bus, 1), 9);
    assert_eq!(cpu.registers().a, 0x80);
    assert_eq!(cpu.registers().f, SF | PF);
}

#[test]
fn rld_rotates_nibbles() {
    let (mut cpu, mut bus) = machine(&[0xED, 0x6F]); // RLD
    bus.load(0x9000, &[0x31]);
    cpu.registers_mut().set_hl(0x9000);
    cpu.registers_mut().a = 0x7A;
    assert_eq!(step(&mut cpu, &mut bus, 1), 18);
    assert_eq!(cpu.registers().a, 0x73);
    assert_eq!(bus.peek(0x9000), 0x1A);
}

#[test]
fn bcd_addition_with_daa() {
    let (mut cpu, mut bus) = machine(&[
        0x3E, 0x38, // LD A, 38H
        0xC6, 0x45, // ADD A, 45H
        0x27, // DAA
    ]);
    step(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.registers().a, 0x83);
    assert_eq!(cpu.registers().f & CF, 0);
}

#[test]
fn sixteen_bit_arithmetic_timing() {
    let (mut cpu, mut bus) = machine(&[
        0x09, // ADD HL, BC
        0xED, 0x42, // SBC HL, BC
        0xDD, 0x09, // ADD IX, BC
    ]);
    cpu.registers_mut().set_hl(0x1000);
    cpu.registers_mut().set_bc(0x0234);
    assert_eq!(step(&mut cpu, &mut bus, 1), 11);
    assert_eq!(cpu.registers().hl(), 0x1234);
    assert_eq!(step(&mut cpu, &mut bus, 1), 15);
    assert_eq!(cpu.registers().hl(), 0x1000);
    assert_eq!(step(&mut cpu, &mut bus, 1), 15);
    assert_eq!(cpu.registers().ix, 0x0234);
}

#[test]
fn observable_paths() {
    let (mut cpu, mut bus) = machine(&[0xDD, 0x21, 0x34, 0x12, 0xAF]);
    step(&mut cpu, &mut bus, 2);

    assert_eq!(cpu.query("ix"), Some(Value::U16(0x1234)));
    assert_eq!(cpu.query("ixh"), Some(Value::U8(0x12)));
    assert_eq!(cpu.query("flags.z"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("prefix"), Some(Value::from("none")));
    assert_eq!(cpu.query("index"), Some(Value::from("none")));
    assert_eq!(cpu.query("tacts"), Some(Value::U64(18)));
    assert_eq!(cpu.query("nonsense"), None);

    for path in cpu.query_paths() {
        assert!(cpu.query(path).is_some(), "{path} should resolve");
    }
}

#[test]
fn snapshot_round_trips_through_json() {
    let (mut cpu, mut bus) = machine(&[0x31, 0x26, 0xA9, 0xFB]);
    step(&mut cpu, &mut bus, 2);
    let state = cpu.snapshot();

    let json = serde_json::to_string(&state).unwrap();
    let decoded: zilog_z80::Z80State = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, state);

    let mut other = Z80::new();
    other.restore(&decoded);
    assert_eq!(other.registers(), cpu.registers());
    assert_eq!(other.tacts(), cpu.tacts());
    assert!(other.iff1());
    assert!(other.is_interrupt_blocked());
}
