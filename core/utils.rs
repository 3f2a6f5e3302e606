/// Returns a value with `len` least significant bits set.
pub fn bit_mask(len: u32) -> u64 {
    if len >= u64::BITS {
        u64::MAX
    } else {
        (1 << len) - 1
    }
}

/// Replaces `len` bits of `value` starting at `pos` with the low bits of
/// `field`.
pub fn deposit(value: u64, pos: u32, len: u32, field: u64) -> u64 {
    let mask = bit_mask(len) << pos;
    (value & !mask) | ((field << pos) & mask)
}

/// Rounds a bit count up to the width of the smallest unsigned integer type.
pub fn type_bit_len(bits: u32) -> u32 {
    match bits {
        0..=8 => 8,
        9..=16 => 16,
        17..=32 => 32,
        _ => 64,
    }
}
