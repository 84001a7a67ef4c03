//! RC4 stream cipher.
//!
//! Legacy PDF security handlers (R2–R4) encrypt strings and streams with
//! RC4. The cipher is symmetric, so one routine covers both directions.

/// Apply RC4 with `key` to `data`, returning the transformed bytes.
pub fn rc4_apply(key: &[u8], data: &[u8]) -> Vec<u8> {
    debug_assert!(!key.is_empty());

    // Key scheduling
    let mut state = [0u8; 256];
    for (index, slot) in state.iter_mut().enumerate() {
        *slot = index as u8;
    }
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }

    // Keystream generation
    let mut output = Vec::with_capacity(data.len());
    let (mut i, mut j) = (0u8, 0u8);
    for byte in data {
        i = i.wrapping_add(1);
        j = j.wrapping_add(state[i as usize]);
        state.swap(i as usize, j as usize);
        let k = state[state[i as usize].wrapping_add(state[j as usize]) as usize];
        output.push(byte ^ k);
    }
    output
}
