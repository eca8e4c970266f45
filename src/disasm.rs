//! x86 decoding for the version and GOROOT heuristics.
//!
//! The heuristics only care about where a handful of instruction forms
//! point: `lea` loads of string headers in `runtime.schedinit`, `mov`
//! loads into eax/rax in `runtime.GOROOT`, and the five-instruction
//! stack-return pattern older compilers emitted. Everything iced-specific
//! stays behind this module; on non-x86 targets the callers skip it.

use iced_x86::{Decoder, DecoderOptions, Instruction, Mnemonic, OpKind, Register};

use crate::formats::FileInfo;

fn decode_all(code: &[u8], ip: u64, info: &FileInfo) -> Vec<Instruction> {
    let bits = if info.word_size == 8 { 64 } else { 32 };
    let mut decoder = Decoder::with_ip(bits, code, ip, DecoderOptions::NONE);
    let mut out = Vec::new();
    while decoder.can_decode() {
        let instr = decoder.decode();
        if instr.is_invalid() {
            // A bad byte run means this is not code worth chasing.
            break;
        }
        out.push(instr);
    }
    out
}

// Resolve a memory operand to the address it references. iced folds
// rip-relative displacements into an absolute address; plain
// displacements come back as-is. Stack-relative operands are loads of
// locals, never of the strings the heuristics look for.
fn memory_target(instr: &Instruction) -> Option<u64> {
    let base = instr.memory_base();
    if base == Register::ESP || base == Register::RSP {
        return None;
    }
    let target = instr.memory_displacement64();
    (target != 0).then_some(target)
}

fn is_immediate(kind: OpKind) -> bool {
    matches!(
        kind,
        OpKind::Immediate8
            | OpKind::Immediate16
            | OpKind::Immediate32
            | OpKind::Immediate64
            | OpKind::Immediate8to16
            | OpKind::Immediate8to32
            | OpKind::Immediate8to64
            | OpKind::Immediate32to64
    )
}

/// Addresses referenced by `lea` instructions in the function, in
/// instruction order.
pub(crate) fn lea_targets(code: &[u8], ip: u64, info: &FileInfo) -> Vec<u64> {
    decode_all(code, ip, info)
        .iter()
        .filter(|i| i.mnemonic() == Mnemonic::Lea && i.op1_kind() == OpKind::Memory)
        .filter_map(memory_target)
        .collect()
}

/// Addresses loaded into eax/rax by `mov` instructions, in instruction
/// order. The Go 1.10+ `runtime.GOROOT` body returns the path as a
/// string header loaded this way.
pub(crate) fn mov_acc_loads(code: &[u8], ip: u64, info: &FileInfo) -> Vec<u64> {
    decode_all(code, ip, info)
        .iter()
        .filter(|i| {
            i.mnemonic() == Mnemonic::Mov
                && i.op0_kind() == OpKind::Register
                && matches!(i.op0_register(), Register::EAX | Register::RAX)
                && i.op1_kind() == OpKind::Memory
        })
        .filter_map(memory_target)
        .collect()
}

/// Candidates from the 1.5–1.9 `runtime.GOROOT` epilogue:
///
/// ```text
/// lea  eax, [path_bytes]
/// mov  [esp+..], eax
/// mov  [esp+..], path_len
/// add  esp, ..
/// ret
/// ```
///
/// Returns `(data address, length)` pairs.
pub(crate) fn stack_string_returns(code: &[u8], ip: u64, info: &FileInfo) -> Vec<(u64, u64)> {
    let instrs = decode_all(code, ip, info);
    let mut out = Vec::new();
    for w in instrs.windows(5) {
        let [lea, store, len_store, add, ret] = w else {
            continue;
        };
        if lea.mnemonic() != Mnemonic::Lea || lea.op1_kind() != OpKind::Memory {
            continue;
        }
        let Some(addr) = memory_target(lea) else {
            continue;
        };
        if store.mnemonic() != Mnemonic::Mov {
            continue;
        }
        if len_store.mnemonic() != Mnemonic::Mov || !is_immediate(len_store.op1_kind()) {
            continue;
        }
        if add.mnemonic() != Mnemonic::Add || ret.mnemonic() != Mnemonic::Ret {
            continue;
        }
        out.push((addr, len_store.immediate(1)));
    }
    out
}
