//! Reed-Solomon (12,9,4) codec: systematic encode, syndrome decode with
//! Berlekamp-Massey error location, and a fast verify-only path.
//!
//! The DMR link-control word is 9 message bytes plus 3 parity bytes. Internally
//! the code is built with t=2 (four parity symbols, `PARITY_DEGREE` in
//! [`crate::gf256`]), but only the first three parity symbols are ever placed
//! on or read from the wire — the fourth is implicitly zero on both sides.

use crate::error::{Error, Result};
use crate::gf256::{GfTables, LOG_ZERO, MAX_TT, NN, PARITY_DEGREE, TABLES};

/// Max correctable symbol errors the Berlekamp-Massey step will attempt.
const TT: i32 = (PARITY_DEGREE / 2) as i32;

/// Number of message bytes in one RS(12,9,4) block.
pub const MESSAGE_LEN: usize = 9;
/// Number of parity bytes actually carried on the wire.
pub const PARITY_LEN: usize = 3;
/// Total block length (message + wire parity).
pub const BLOCK_LEN: usize = MESSAGE_LEN + PARITY_LEN;

fn rs_encode_255(t: &GfTables, data: &[u8; NN]) -> [u8; PARITY_DEGREE] {
    let k = NN - PARITY_DEGREE;
    let mut bb = [0u8; PARITY_DEGREE];
    for i in (0..k).rev() {
        let feedback = t.index_of[(data[i] ^ bb[PARITY_DEGREE - 1]) as usize];
        if feedback != LOG_ZERO {
            for j in (1..PARITY_DEGREE).rev() {
                let idx = (t.generator[j] + feedback).rem_euclid(NN as i32);
                bb[j] = bb[j - 1] ^ t.alpha_to[idx as usize] as u8;
            }
            let idx = (t.generator[0] + feedback).rem_euclid(NN as i32);
            bb[0] = t.alpha_to[idx as usize] as u8;
        } else {
            for j in (1..PARITY_DEGREE).rev() {
                bb[j] = bb[j - 1];
            }
            bb[0] = 0;
        }
    }
    bb
}

/// Encode 9 message bytes, returning the 3 parity bytes masked with `crc_mask`.
pub fn encode(message: &[u8; MESSAGE_LEN], crc_mask: u8) -> [u8; PARITY_LEN] {
    let mut data = [0u8; NN];
    data[..MESSAGE_LEN].copy_from_slice(message);
    let bb = rs_encode_255(&TABLES, &data);
    [bb[0] ^ crc_mask, bb[1] ^ crc_mask, bb[2] ^ crc_mask]
}

/// Berlekamp-Massey decode of a 255-symbol (mostly zero-padded) received
/// codeword, in place. Returns 0 on success (including "no errors"), 1 when
/// the number of located roots doesn't match the error-locator degree
/// (uncorrectable), or 2 when that degree exceeds `TT` outright.
fn rs_decode_255(t: &GfTables, recd: &mut [u8; NN]) -> u8 {
    let nn = NN as i32;
    let n = PARITY_DEGREE as i32;

    // recd in index form.
    let mut recd_idx = [0i32; NN];
    for i in 0..NN {
        recd_idx[i] = t.index_of[recd[i] as usize];
    }

    // Syndromes S[1..=n], index form, sized to NN+1 like the C reference
    // (reed_solomon.c's `s[rs->nn + 1]`): the BM loop below reads one slot
    // past `n` on its last iteration before breaking. S[0] and everything
    // past `n` are log-zero, so an out-of-range read is a non-contributing
    // term rather than a bogus value.
    let mut s = [LOG_ZERO; NN + 1];
    let mut syn_error = false;
    for i in 1..=n as usize {
        let mut acc: u16 = 0;
        for j in 0..NN {
            let idx = (recd_idx[j] + i as i32 * j as i32).rem_euclid(nn);
            acc ^= t.alpha_to[idx as usize];
        }
        if acc != 0 {
            syn_error = true;
        }
        s[i] = if acc != 0 { t.index_of[acc as usize] } else { LOG_ZERO };
    }

    if !syn_error {
        for i in 0..NN {
            recd[i] = t.alpha_to[recd_idx[i] as usize] as u8;
        }
        return 0;
    }

    // Berlekamp-Massey iteration. Rows/cols sized generously beyond PARITY_DEGREE.
    const ROWS: usize = PARITY_DEGREE + 3;
    const COLS: usize = PARITY_DEGREE + 1;
    let mut elp = vec![[0i32; COLS]; ROWS];
    let mut d = [0i32; ROWS];
    let mut l = [0i32; ROWS];
    let mut u_lu = [0i32; ROWS];

    d[0] = 0;
    d[1] = s[1];
    elp[0][0] = 0;
    elp[1][0] = 1;
    for i in 1..COLS {
        elp[0][i] = LOG_ZERO;
        elp[1][i] = 0;
    }
    l[0] = 0;
    l[1] = 0;
    u_lu[0] = -1;
    u_lu[1] = 0;
    let mut u: i32 = 0;

    loop {
        u += 1;
        if d[u as usize] == LOG_ZERO {
            l[(u + 1) as usize] = l[u as usize];
            for i in 0..=l[u as usize] as usize {
                elp[(u + 1) as usize][i] = elp[u as usize][i];
                elp[u as usize][i] = t.index_of[elp[u as usize][i] as usize];
            }
        } else {
            let mut q = u - 1;
            while d[q as usize] == LOG_ZERO && q > 0 {
                q -= 1;
            }
            if q > 0 {
                let mut j = q;
                loop {
                    j -= 1;
                    if d[j as usize] != LOG_ZERO && u_lu[q as usize] < u_lu[j as usize] {
                        q = j;
                    }
                    if j <= 0 {
                        break;
                    }
                }
            }

            if l[u as usize] > l[q as usize] + (u - q) {
                l[(u + 1) as usize] = l[u as usize];
            } else {
                l[(u + 1) as usize] = l[q as usize] + u - q;
            }

            for i in 0..COLS {
                elp[(u + 1) as usize][i] = 0;
            }
            for i in 0..=l[q as usize] as usize {
                if elp[q as usize][i] != LOG_ZERO {
                    let col = (i as i32 + u - q) as usize;
                    let idx = (d[u as usize] + nn - d[q as usize] + elp[q as usize][i]).rem_euclid(nn);
                    elp[(u + 1) as usize][col] = t.alpha_to[idx as usize] as i32;
                }
            }
            for i in 0..=l[u as usize] as usize {
                elp[(u + 1) as usize][i] ^= elp[u as usize][i];
                elp[u as usize][i] = t.index_of[elp[u as usize][i] as usize];
            }
        }
        u_lu[(u + 1) as usize] = u - l[(u + 1) as usize];

        if u < nn {
            d[(u + 1) as usize] = if s[(u + 1) as usize] != LOG_ZERO {
                t.alpha_to[s[(u + 1) as usize] as usize] as i32
            } else {
                0
            };
            for i in 1..=l[(u + 1) as usize] as usize {
                let si = s[(u + 1) as usize - i];
                if si != LOG_ZERO && elp[(u + 1) as usize][i] != 0 {
                    let idx = (si + t.index_of[elp[(u + 1) as usize][i] as usize]).rem_euclid(nn);
                    d[(u + 1) as usize] ^= t.alpha_to[idx as usize] as i32;
                }
            }
            d[(u + 1) as usize] = t.index_of[d[(u + 1) as usize] as usize];
        }

        if !(u < n && l[(u + 1) as usize] <= TT) {
            break;
        }
    }

    u += 1;
    if l[u as usize] > TT {
        for i in 0..NN {
            recd[i] = t.alpha_to[recd_idx[i] as usize] as u8;
        }
        return 2;
    }

    for i in 0..=l[u as usize] as usize {
        elp[u as usize][i] = t.index_of[elp[u as usize][i] as usize];
    }

    let mut reg = [0i32; MAX_TT + 1];
    for i in 1..=l[u as usize] as usize {
        reg[i] = elp[u as usize][i];
    }
    let mut root = [0i32; MAX_TT];
    let mut loc = [0i32; MAX_TT];
    let mut count: usize = 0;
    for i in 1..=NN {
        let mut q: u16 = 1;
        for j in 1..=l[u as usize] as usize {
            if reg[j] != LOG_ZERO {
                reg[j] = (reg[j] + j as i32).rem_euclid(nn);
                q ^= t.alpha_to[reg[j] as usize];
            }
        }
        if q == 0 && count < MAX_TT {
            root[count] = i as i32;
            loc[count] = nn - i as i32;
            count += 1;
        }
    }

    if count != l[u as usize] as usize {
        for i in 0..NN {
            recd[i] = t.alpha_to[recd_idx[i] as usize] as u8;
        }
        return 1;
    }

    // z(x): z[0] = 1 implicitly, not stored.
    let mut z = [0i32; MAX_TT + 1];
    for i in 1..=l[u as usize] as usize {
        z[i] = if s[i] != LOG_ZERO && elp[u as usize][i] != LOG_ZERO {
            (t.alpha_to[s[i] as usize] ^ t.alpha_to[elp[u as usize][i] as usize]) as i32
        } else if s[i] != LOG_ZERO {
            t.alpha_to[s[i] as usize] as i32
        } else if elp[u as usize][i] != LOG_ZERO {
            t.alpha_to[elp[u as usize][i] as usize] as i32
        } else {
            0
        };
        for j in 1..i {
            if s[j] != LOG_ZERO && elp[u as usize][i - j] != LOG_ZERO {
                let idx = (elp[u as usize][i - j] + s[j]).rem_euclid(nn);
                z[i] ^= t.alpha_to[idx as usize] as i32;
            }
        }
        z[i] = t.index_of[z[i] as usize];
    }

    let mut recd_poly = [0u16; NN];
    for i in 0..NN {
        recd_poly[i] = t.alpha_to[recd_idx[i] as usize];
    }

    for i in 0..l[u as usize] as usize {
        let loc_i = loc[i] as usize;
        let mut err = 1u16; // accounts for z[0] = 1
        for j in 1..=l[u as usize] as usize {
            if z[j] != LOG_ZERO {
                let idx = (z[j] + j as i32 * root[i]).rem_euclid(nn);
                err ^= t.alpha_to[idx as usize];
            }
        }
        if err != 0 {
            let err_log = t.index_of[err as usize];
            let mut q: i32 = 0;
            for j in 0..l[u as usize] as usize {
                if j != i {
                    let idx = (loc[j] + root[i]).rem_euclid(nn);
                    q += t.index_of[(1u16 ^ t.alpha_to[idx as usize]) as usize];
                }
            }
            q = q.rem_euclid(nn);
            let final_idx = (err_log - q + nn).rem_euclid(nn);
            recd_poly[loc_i] ^= t.alpha_to[final_idx as usize];
        }
    }
    for i in 0..NN {
        recd[i] = recd_poly[i] as u8;
    }
    0
}

/// Decode-and-repair: attempt to correct up to the code's error envelope in
/// place, returning the (possibly corrected) 9 message bytes.
///
/// `block` is the 12-byte buffer: 9 message bytes followed by 3 received
/// parity bytes (still masked with `crc_mask`).
pub fn decode_and_repair(block: &[u8; BLOCK_LEN], crc_mask: u8) -> Result<[u8; MESSAGE_LEN]> {
    let mut data = [0u8; NN];
    data[..MESSAGE_LEN].copy_from_slice(&block[..MESSAGE_LEN]);
    data[MESSAGE_LEN] = block[MESSAGE_LEN] ^ crc_mask;
    data[MESSAGE_LEN + 1] = block[MESSAGE_LEN + 1] ^ crc_mask;
    data[MESSAGE_LEN + 2] = block[MESSAGE_LEN + 2] ^ crc_mask;

    let code = rs_decode_255(&TABLES, &mut data);
    if code != 0 {
        return Err(Error::FecUnrecoverable(code));
    }
    let mut out = [0u8; MESSAGE_LEN];
    out.copy_from_slice(&data[..MESSAGE_LEN]);
    Ok(out)
}

/// Decode-and-verify: re-encode the 9 message bytes and compare to the
/// received parity. Cheaper than a full repair when the caller only needs a
/// pass/fail signal.
pub fn decode_and_verify(block: &[u8; BLOCK_LEN], crc_mask: u8) -> bool {
    let mut message = [0u8; MESSAGE_LEN];
    message.copy_from_slice(&block[..MESSAGE_LEN]);
    let parity = encode(&message, crc_mask);
    parity == block[MESSAGE_LEN..BLOCK_LEN]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_all_zero_message_gives_zero_parity() {
        let msg = [0u8; MESSAGE_LEN];
        assert_eq!(encode(&msg, 0x00), [0u8; PARITY_LEN]);
    }

    #[test]
    fn encode_is_deterministic() {
        let msg = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        let a = encode(&msg, 0x00);
        let b = encode(&msg, 0x00);
        assert_eq!(a, b);
        assert_ne!(a, [0u8; PARITY_LEN]);
    }

    #[test]
    fn decode_verify_accepts_matching_parity() {
        let msg = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        let parity = encode(&msg, 0x7b);
        let mut block = [0u8; BLOCK_LEN];
        block[..MESSAGE_LEN].copy_from_slice(&msg);
        block[MESSAGE_LEN..].copy_from_slice(&parity);
        assert!(decode_and_verify(&block, 0x7b));
    }

    #[test]
    fn decode_verify_rejects_tampered_parity() {
        let msg = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        let parity = encode(&msg, 0x7b);
        let mut block = [0u8; BLOCK_LEN];
        block[..MESSAGE_LEN].copy_from_slice(&msg);
        block[MESSAGE_LEN..].copy_from_slice(&parity);
        block[MESSAGE_LEN] ^= 0x01;
        assert!(!decode_and_verify(&block, 0x7b));
    }

    #[test]
    fn single_byte_error_in_message_is_corrected() {
        let msg = [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x11];
        let parity = encode(&msg, 0x00);
        for pos in 0..BLOCK_LEN {
            let mut block = [0u8; BLOCK_LEN];
            block[..MESSAGE_LEN].copy_from_slice(&msg);
            block[MESSAGE_LEN..].copy_from_slice(&parity);
            block[pos] ^= 0x01;
            let fixed = decode_and_repair(&block, 0x00)
                .unwrap_or_else(|e| panic!("position {pos} failed to correct: {e}"));
            assert_eq!(fixed, msg, "position {pos}");
        }
    }

    #[test]
    fn single_bit_flip_each_position_is_corrected() {
        let msg = [9, 8, 7, 6, 5, 4, 3, 2, 1];
        let parity = encode(&msg, 0x96);
        for pos in 0..BLOCK_LEN {
            for bit in 0..8u8 {
                let mut block = [0u8; BLOCK_LEN];
                block[..MESSAGE_LEN].copy_from_slice(&msg);
                block[MESSAGE_LEN..].copy_from_slice(&parity);
                block[pos] ^= 1 << bit;
                let fixed = decode_and_repair(&block, 0x96)
                    .unwrap_or_else(|e| panic!("pos {pos} bit {bit} failed: {e}"));
                assert_eq!(fixed, msg, "pos {pos} bit {bit}");
            }
        }
    }

    #[test]
    fn no_error_round_trips() {
        let msg = [0xff; MESSAGE_LEN];
        let parity = encode(&msg, 0x00);
        let mut block = [0u8; BLOCK_LEN];
        block[..MESSAGE_LEN].copy_from_slice(&msg);
        block[MESSAGE_LEN..].copy_from_slice(&parity);
        assert_eq!(decode_and_repair(&block, 0x00).unwrap(), msg);
    }
}
