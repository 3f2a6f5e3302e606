//! Batched matching over many codes.
//!
//! Instructions are tried in declaration order, each one tests the fixed
//! bits of all codes still unassigned, evaluates its conditions only for
//! the lanes that passed and claims the lanes that were accepted. Every
//! instruction sees the leading bits of the codes that make up its form.

use crate::{condition::Functions, error::ConditionError, insn::InstructionDecoder, Options};

fn decode_chunk(
    insns: &[InstructionDecoder],
    functions: &Functions,
    code_bit_len: u32,
    codes: &[u64],
    out: &mut [Option<usize>],
) -> Result<(), ConditionError> {
    let mut pending: Vec<usize> = (0..codes.len()).collect();
    for (id, insn) in insns.iter().enumerate() {
        if pending.is_empty() {
            break;
        }
        let form = insn.form;
        let (hits, rest): (Vec<usize>, Vec<usize>) = pending
            .iter()
            .partition(|&&i| insn.matches_fixed_bits(form.align(codes[i], code_bit_len)));
        if hits.is_empty() {
            continue;
        }
        let lanes: Vec<u64> = hits
            .iter()
            .map(|&i| form.align(codes[i], code_bit_len))
            .collect();
        let accepted = insn.confirm_conditions_lanes(&lanes, functions)?;
        let mut rejected = Vec::new();
        for (&i, ok) in hits.iter().zip(accepted) {
            if ok {
                out[i] = Some(id);
            } else {
                rejected.push(i);
            }
        }
        pending = rest;
        pending.extend(rejected);
        pending.sort_unstable();
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn decode_parallel(
    insns: &[InstructionDecoder],
    functions: &Functions,
    opts: &Options,
    code_bit_len: u32,
    codes: &[u64],
    out: &mut [Option<usize>],
) -> Result<(), ConditionError> {
    use std::{panic, thread};

    let per_thread = (codes.len() + opts.threads - 1) / opts.threads;
    let chunk_size = per_thread.max(opts.chunk_size);
    trace!(
        "batch of {} codes, {} thread(s), chunk size {chunk_size}",
        codes.len(),
        opts.threads
    );

    thread::scope(|s| {
        let handles: Vec<_> = codes
            .chunks(chunk_size)
            .zip(out.chunks_mut(chunk_size))
            .map(|(codes, out)| s.spawn(move || decode_chunk(insns, functions, code_bit_len, codes, out)))
            .collect();
        let mut result = Ok(());
        for handle in handles {
            let chunk = handle
                .join()
                .unwrap_or_else(|err| panic::resume_unwind(err));
            if result.is_ok() {
                result = chunk;
            }
        }
        result
    })
}

/// Returns the index of the first instruction matching every code.
pub(crate) fn decode(
    insns: &[InstructionDecoder],
    functions: &Functions,
    opts: &Options,
    code_bit_len: u32,
    codes: &[u64],
) -> Result<Vec<Option<usize>>, ConditionError> {
    let mut out = vec![None; codes.len()];

    #[cfg(feature = "parallel")]
    if opts.threads > 1 && codes.len() > opts.chunk_size {
        decode_parallel(insns, functions, opts, code_bit_len, codes, &mut out)?;
        return Ok(out);
    }

    #[cfg(not(feature = "parallel"))]
    let _ = opts;

    decode_chunk(insns, functions, code_bit_len, codes, &mut out)?;
    Ok(out)
}
