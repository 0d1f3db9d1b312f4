//! Precomputed GF(2^8) log/antilog tables and the Reed-Solomon generator
//! polynomial built from them.
//!
//! This mirrors the classic Rockliff `rs.c` table construction: `alpha_to[i]`
//! is alpha^i in polynomial form, `index_of[v]` is the power of alpha that
//! produces polynomial value `v` (or -1, the "log of zero" sentinel, for
//! `v == 0`). The generator polynomial g(x) = product(x + alpha^i), i=1..2t,
//! is built once and kept in index form for fast encoding.

/// Symbol width in bits. DMR's RS(12,9,4) code works over GF(2^8).
pub const SYMBOL_BITS: u32 = 8;

/// Codeword length, n = 2^m - 1.
pub const NN: usize = (1 << SYMBOL_BITS) - 1;

/// Number of parity symbols the generator polynomial produces (2t).
/// The Homebrew RS(12,9,4) form is built with t=2, i.e. four parity
/// symbols in index form, even though only the first three are ever
/// placed on the wire (see [`crate::rs1294`]).
pub const PARITY_DEGREE: usize = 4;

/// Cap on distinct error locations tracked during decode (DMR_RS_MAX_TT).
pub const MAX_TT: usize = 4;

/// Log-of-zero sentinel used throughout index-form arithmetic.
pub const LOG_ZERO: i32 = -1;

/// GF(2^8) log/antilog tables plus the RS generator polynomial for a given
/// (primitive polynomial, m, t) parameter set.
#[derive(Debug, Clone)]
pub struct GfTables {
    /// alpha_to[i] = alpha^i in polynomial form, for i in 0..=NN.
    pub alpha_to: [u16; NN + 1],
    /// index_of[v] = i such that alpha^i == v, or LOG_ZERO for v == 0.
    pub index_of: [i32; NN + 1],
    /// Generator polynomial coefficients in index form, degree PARITY_DEGREE.
    pub generator: [i32; PARITY_DEGREE + 1],
}

impl GfTables {
    /// Build tables for the primitive polynomial `poly` (as a coefficient
    /// bitmap of a degree-`m` irreducible polynomial over GF(2)).
    ///
    /// `parity_degree` is 2t, the degree of the generator polynomial.
    pub fn new(poly: u32, parity_degree: usize) -> Self {
        let mut alpha_to = [0u16; NN + 1];
        let mut index_of = [0i32; NN + 1];

        let mut mask: u32 = 1;
        alpha_to[SYMBOL_BITS as usize] = 0;
        for i in 0..SYMBOL_BITS as usize {
            alpha_to[i] = mask as u16;
            index_of[alpha_to[i] as usize] = i as i32;
            if (poly >> i) & 1 != 0 {
                alpha_to[SYMBOL_BITS as usize] ^= mask as u16;
            }
            mask <<= 1;
        }
        index_of[alpha_to[SYMBOL_BITS as usize] as usize] = SYMBOL_BITS as i32;
        mask >>= 1;
        for i in (SYMBOL_BITS as usize + 1)..NN {
            if alpha_to[i - 1] as u32 >= mask {
                alpha_to[i] = alpha_to[SYMBOL_BITS as usize]
                    ^ (((alpha_to[i - 1] as u32 ^ mask) << 1) as u16);
            } else {
                alpha_to[i] = alpha_to[i - 1] << 1;
            }
            index_of[alpha_to[i] as usize] = i as i32;
        }
        index_of[0] = LOG_ZERO;

        // Generator polynomial: product(x + alpha^i), i = 1..=parity_degree,
        // built in polynomial form then converted to index form.
        let mut gg = vec![0i32; parity_degree + 1];
        gg[0] = 2; // alpha = 2 is the primitive element
        gg[1] = 1;
        for i in 2..=parity_degree {
            gg[i] = 1;
            for j in (1..i).rev() {
                if gg[j] != 0 {
                    let idx = (index_of[gg[j] as usize] + i as i32).rem_euclid(NN as i32);
                    gg[j] = gg[j - 1] ^ alpha_to[idx as usize] as i32;
                } else {
                    gg[j] = gg[j - 1];
                }
            }
            let idx = (index_of[gg[0] as usize] + i as i32).rem_euclid(NN as i32);
            gg[0] = alpha_to[idx as usize] as i32;
        }
        let mut generator = [0i32; PARITY_DEGREE + 1];
        for (i, slot) in generator.iter_mut().enumerate().take(parity_degree + 1) {
            *slot = index_of[gg[i] as usize];
        }

        Self {
            alpha_to,
            index_of,
            generator,
        }
    }
}

/// Process-wide RS(12,9,4) table singleton, keyed implicitly by the fixed
/// (0x11d, m=8, 2t=4) parameter set this crate uses exclusively.
pub static TABLES: once_cell::sync::Lazy<GfTables> =
    once_cell::sync::Lazy::new(|| GfTables::new(0x11d, PARITY_DEGREE));
