//! Opaque handles to secret-shared vectors.
//!
//! A [`SecretInts`] holds this party's additive shares over Z/2^64 and a [`SecretBits`] holds
//! XOR shares of booleans. Neither type exposes its shares: the only way to learn a plaintext is
//! [`crate::scheduler::Scheduler::open_ints`] / [`crate::scheduler::Scheduler::open_bits`],
//! which both parties must invoke together.

use std::fmt;

use crate::error::Error;

fn check_len(expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::LengthMismatch { expected, actual })
    }
}

/// This party's additive shares of a vector of 64-bit integers.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretInts {
    pub(crate) shares: Vec<u64>,
}

impl fmt::Debug for SecretInts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretInts")
            .field("len", &self.shares.len())
            .finish_non_exhaustive()
    }
}

impl SecretInts {
    pub(crate) fn from_shares(shares: Vec<u64>) -> Self {
        Self { shares }
    }

    /// Shares of the all-zero vector (both parties hold zeros).
    pub fn zeros(len: usize) -> Self {
        Self {
            shares: vec![0; len],
        }
    }

    /// The number of shared elements.
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Whether the vector has no elements.
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Elementwise secure addition (local).
    pub fn add(&self, other: &Self) -> Result<Self, Error> {
        check_len(self.len(), other.len())?;
        Ok(Self::from_shares(
            self.shares
                .iter()
                .zip(&other.shares)
                .map(|(a, b)| a.wrapping_add(*b))
                .collect(),
        ))
    }

    /// Elementwise secure subtraction (local).
    pub fn sub(&self, other: &Self) -> Result<Self, Error> {
        check_len(self.len(), other.len())?;
        Ok(Self::from_shares(
            self.shares
                .iter()
                .zip(&other.shares)
                .map(|(a, b)| a.wrapping_sub(*b))
                .collect(),
        ))
    }

    /// Multiplies every element with a public constant (local).
    pub fn scale(&self, k: i64) -> Self {
        Self::from_shares(
            self.shares
                .iter()
                .map(|a| a.wrapping_mul(k as u64))
                .collect(),
        )
    }

    /// Concatenates several vectors into one, e.g. to evaluate them in a single round.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a SecretInts>) -> Self {
        Self::from_shares(
            parts
                .into_iter()
                .flat_map(|p| p.shares.iter().copied())
                .collect(),
        )
    }

    /// Repeats the whole vector `times` times.
    pub fn repeat(&self, times: usize) -> Self {
        Self::from_shares(self.shares.repeat(times))
    }

    /// Splits the vector into consecutive chunks of `chunk` elements.
    pub fn chunks(&self, chunk: usize) -> Vec<Self> {
        if chunk == 0 {
            return vec![];
        }
        self.shares
            .chunks(chunk)
            .map(|c| Self::from_shares(c.to_vec()))
            .collect()
    }
}

/// This party's XOR shares of a vector of booleans.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBits {
    pub(crate) shares: Vec<bool>,
}

impl fmt::Debug for SecretBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBits")
            .field("len", &self.shares.len())
            .finish_non_exhaustive()
    }
}

impl SecretBits {
    pub(crate) fn from_shares(shares: Vec<bool>) -> Self {
        Self { shares }
    }

    /// Shares of the all-false vector.
    pub fn falses(len: usize) -> Self {
        Self {
            shares: vec![false; len],
        }
    }

    /// The number of shared elements.
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Whether the vector has no elements.
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Elementwise secure XOR (local).
    pub fn xor(&self, other: &Self) -> Result<Self, Error> {
        check_len(self.len(), other.len())?;
        Ok(Self::from_shares(
            self.shares
                .iter()
                .zip(&other.shares)
                .map(|(a, b)| a ^ b)
                .collect(),
        ))
    }

    /// Concatenates several vectors into one.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a SecretBits>) -> Self {
        Self::from_shares(
            parts
                .into_iter()
                .flat_map(|p| p.shares.iter().copied())
                .collect(),
        )
    }

    /// Repeats the whole vector `times` times.
    pub fn repeat(&self, times: usize) -> Self {
        Self::from_shares(self.shares.repeat(times))
    }

    /// Splits the vector into consecutive chunks of `chunk` elements.
    pub fn chunks(&self, chunk: usize) -> Vec<Self> {
        if chunk == 0 {
            return vec![];
        }
        self.shares
            .chunks(chunk)
            .map(|c| Self::from_shares(c.to_vec()))
            .collect()
    }

    /// Splits the vector in two at `mid`.
    pub fn split_at(&self, mid: usize) -> Result<(Self, Self), Error> {
        if mid > self.len() {
            return Err(Error::LengthMismatch {
                expected: mid,
                actual: self.len(),
            });
        }
        let (a, b) = self.shares.split_at(mid);
        Ok((Self::from_shares(a.to_vec()), Self::from_shares(b.to_vec())))
    }
}

/// Packs bits into 64-bit words, least significant bit first.
pub(crate) fn pack_bits(bits: &[bool]) -> Vec<u64> {
    bits.chunks(64)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u64, |word, (i, bit)| word | ((*bit as u64) << i))
        })
        .collect()
}

/// Inverse of [`pack_bits`], truncated to `len` bits.
pub(crate) fn unpack_bits(words: &[u64], len: usize) -> Vec<bool> {
    (0..len).map(|i| (words[i / 64] >> (i % 64)) & 1 == 1).collect()
}
