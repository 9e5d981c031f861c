//! Boolean sub-circuits over XOR-shared 64-bit words.
//!
//! The only circuit needed by the input processor is the sign of an additively shared integer.
//! The two additive shares `d0 + d1` are re-interpreted as two XOR-shared addends (party 0
//! holds `d0` and party 1 `d1` as their respective halves, the other half being zero) and
//! added with a Kogge-Stone parallel prefix adder, so the depth is `log2(64)` AND layers plus
//! one layer for the generate bits.

use crate::{
    channel::Channel,
    error::Error,
    scheduler::Scheduler,
    share::{SecretBits, SecretInts},
};

const WORD_BITS: u32 = 64;

/// Computes shares of the most significant bit of every element of `x`, i.e. `x < 0` when read
/// as a two's complement `i64`.
pub(crate) async fn sign_bits<C: Channel>(
    scheduler: &mut Scheduler<C>,
    x: &SecretInts,
) -> Result<SecretBits, Error> {
    let len = x.len();
    if len == 0 {
        return Ok(SecretBits::falses(0));
    }
    // XOR shares of the two addends: a = d0 (party 0's share), b = d1 (party 1's share)
    let zeros = vec![0u64; len];
    let (a, b) = if scheduler.is_first() {
        (x.shares.clone(), zeros)
    } else {
        (zeros, x.shares.clone())
    };
    let p: Vec<u64> = a.iter().zip(&b).map(|(a, b)| a ^ b).collect();
    let mut g = scheduler.and_words(&a, &b).await?;

    let mut prop = p.clone();
    let mut shift = 1;
    while shift < WORD_BITS {
        // G = G | (P & G << s) and P = P & P << s, evaluated in one round; G and P & (G << s)
        // are never both set, so the OR is a XOR
        let lhs: Vec<u64> = prop.iter().chain(&prop).copied().collect();
        let rhs: Vec<u64> = g
            .iter()
            .map(|g| g << shift)
            .chain(prop.iter().map(|p| p << shift))
            .collect();
        let products = scheduler.and_words(&lhs, &rhs).await?;
        let (pg, pp) = products.split_at(len);
        g = g.iter().zip(pg).map(|(g, pg)| g ^ pg).collect();
        prop = pp.to_vec();
        shift *= 2;
    }

    // the sum bit 63 is p_63 ^ carry_63, and carry_63 is the prefix generate of bits 0..=62
    let msb = p
        .iter()
        .zip(&g)
        .map(|(p, g)| ((p >> (WORD_BITS - 1)) ^ (g >> (WORD_BITS - 2))) & 1 == 1)
        .collect();
    Ok(SecretBits::from_shares(msb))
}
