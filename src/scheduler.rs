//! The secret-sharing capability used by the input processor.
//!
//! A [`Scheduler`] is bound to one channel endpoint and [`Role`] and exclusively owns that channel
//! for the whole session. Local gates (addition, XOR, NOT, scaling) need no communication;
//! multiplication and AND consume Beaver triples from the dealer and take one round with the
//! other party. Every interactive operation must be issued by both parties in the same order.
//!
//! Integers are shared additively over Z/2^64, so all arithmetic wraps. Callers are responsible
//! for keeping values in a range where wrapping cannot occur.

use rand::{Rng, SeedableRng, random};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, trace};

use crate::{
    channel::{Channel, MsgChannel},
    circuit,
    dealer::{REQUEST_PHASE, RESPONSE_PHASE, Request, Response, Triple},
    error::Error,
    role::{DEALER, Role},
    share::{SecretBits, SecretInts, pack_bits, unpack_bits},
};

/// Counts of the interactive work a scheduler has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Rounds of communication with the other party.
    pub rounds: usize,
    /// Arithmetic triples consumed.
    pub arithmetic_triples: usize,
    /// Boolean word triples consumed.
    pub boolean_triples: usize,
}

/// One party's handle on a two-party secret-sharing session.
#[derive(Debug)]
pub struct Scheduler<C: Channel> {
    channel: MsgChannel<C>,
    party: usize,
    role: Role,
    rng: ChaCha20Rng,
    stats: Stats,
}

impl<C: Channel> Scheduler<C> {
    /// Binds the channel endpoint `party` (0 or 1) to a role. The channel must connect to the
    /// other party at the other index and to the dealer at [`DEALER`].
    ///
    /// Messages are routed by `party` alone, so two parties claiming the same role still reach
    /// each other and fail the handshake instead of waiting on the wrong endpoint.
    pub fn new(channel: C, party: usize, role: Role) -> Result<Self, Error> {
        if party >= DEALER {
            return Err(Error::InvalidParty(party));
        }
        Ok(Self {
            channel: MsgChannel::new(channel),
            party,
            role,
            rng: ChaCha20Rng::from_seed(random()),
            stats: Stats::default(),
        })
    }

    /// The role this scheduler acts for.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The channel index of this party.
    pub fn party(&self) -> usize {
        self.party
    }

    /// Interactive work done so far.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    fn peer(&self) -> usize {
        1 - self.party
    }

    /// Party 0 holds the public constants of every sharing.
    pub(crate) fn is_first(&self) -> bool {
        self.party == 0
    }

    /// Sends a public message to the other party and receives theirs.
    pub(crate) async fn exchange<T>(&mut self, phase: &str, msg: &T) -> Result<T, Error>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let peer = self.peer();
        self.channel.send_to(peer, phase, msg).await?;
        let theirs = self.channel.recv_from(peer, phase).await?;
        self.stats.rounds += 1;
        Ok(theirs)
    }

    async fn exchange_vec(&mut self, phase: &str, msg: &Vec<u64>) -> Result<Vec<u64>, Error> {
        let peer = self.peer();
        self.channel.send_to(peer, phase, msg).await?;
        let theirs = self.channel.recv_vec_from(peer, phase, msg.len()).await?;
        self.stats.rounds += 1;
        Ok(theirs)
    }

    async fn request(&mut self, request: Request, len: usize) -> Result<Vec<Triple>, Error> {
        trace!(?request, "requesting correlated randomness");
        self.channel.send_to(DEALER, REQUEST_PHASE, &request).await?;
        match self.channel.recv_from(DEALER, RESPONSE_PHASE).await? {
            Response::Triples(triples) if triples.len() == len => Ok(triples),
            Response::Triples(triples) => Err(Error::LengthMismatch {
                expected: len,
                actual: triples.len(),
            }),
            Response::Abort(reason) => Err(Error::Dealer(reason)),
            Response::Finished => Err(Error::Dealer("dealer finished unexpectedly".into())),
        }
    }

    /// Ends the session with the dealer. Both parties must call this as their last operation.
    pub async fn finish(mut self) -> Result<Stats, Error> {
        self.channel
            .send_to(DEALER, REQUEST_PHASE, &Request::Done)
            .await?;
        match self.channel.recv_from(DEALER, RESPONSE_PHASE).await? {
            Response::Finished => {
                debug!(stats = ?self.stats, role = %self.role, "Session finished");
                Ok(self.stats)
            }
            Response::Abort(reason) => Err(Error::Dealer(reason)),
            Response::Triples(_) => Err(Error::Dealer("unexpected triples at session end".into())),
        }
    }

    /// Secret-shares a vector of integers owned by `owner`.
    ///
    /// The owner passes `Some(values)`, the other party passes `None`. `len` is public and must
    /// be the same on both sides.
    pub async fn input_ints(
        &mut self,
        owner: Role,
        values: Option<&[i64]>,
        len: usize,
    ) -> Result<SecretInts, Error> {
        let phase = "input ints";
        let peer = self.peer();
        if owner == self.role {
            let values = values.ok_or(Error::NotInputOwner { owner })?;
            if values.len() != len {
                return Err(Error::LengthMismatch {
                    expected: len,
                    actual: values.len(),
                });
            }
            let masks: Vec<u64> = (0..len).map(|_| self.rng.random()).collect();
            self.channel.send_to(peer, phase, &masks).await?;
            let shares = values
                .iter()
                .zip(masks)
                .map(|(v, r)| (*v as u64).wrapping_sub(r))
                .collect();
            Ok(SecretInts::from_shares(shares))
        } else {
            if values.is_some() {
                return Err(Error::NotInputOwner { owner });
            }
            let shares = self.channel.recv_vec_from(peer, phase, len).await?;
            Ok(SecretInts::from_shares(shares))
        }
    }

    /// Secret-shares a vector of booleans owned by `owner` (see [`Scheduler::input_ints`]).
    pub async fn input_bits(
        &mut self,
        owner: Role,
        values: Option<&[bool]>,
        len: usize,
    ) -> Result<SecretBits, Error> {
        let phase = "input bits";
        let peer = self.peer();
        if owner == self.role {
            let values = values.ok_or(Error::NotInputOwner { owner })?;
            if values.len() != len {
                return Err(Error::LengthMismatch {
                    expected: len,
                    actual: values.len(),
                });
            }
            let masks: Vec<bool> = (0..len).map(|_| self.rng.random()).collect();
            self.channel
                .send_to(peer, phase, &pack_bits(&masks))
                .await?;
            let shares = values.iter().zip(masks).map(|(v, r)| v ^ r).collect();
            Ok(SecretBits::from_shares(shares))
        } else {
            if values.is_some() {
                return Err(Error::NotInputOwner { owner });
            }
            let words: Vec<u64> = self
                .channel
                .recv_vec_from(peer, phase, len.div_ceil(64))
                .await?;
            Ok(SecretBits::from_shares(unpack_bits(&words, len)))
        }
    }

    /// Shares of a public vector; party 0 holds the values, party 1 zeros.
    pub fn public_ints(&self, values: &[i64]) -> SecretInts {
        let first = self.is_first();
        SecretInts::from_shares(
            values
                .iter()
                .map(|v| if first { *v as u64 } else { 0 })
                .collect(),
        )
    }

    /// Adds a public constant to every element (local).
    pub fn add_public(&self, x: &SecretInts, k: i64) -> SecretInts {
        if self.is_first() {
            SecretInts::from_shares(x.shares.iter().map(|s| s.wrapping_add(k as u64)).collect())
        } else {
            x.clone()
        }
    }

    /// Elementwise secure NOT (local).
    pub fn not(&self, x: &SecretBits) -> SecretBits {
        if self.is_first() {
            SecretBits::from_shares(x.shares.iter().map(|b| !b).collect())
        } else {
            x.clone()
        }
    }

    /// Elementwise secure addition.
    pub fn add(&self, x: &SecretInts, y: &SecretInts) -> Result<SecretInts, Error> {
        x.add(y)
    }

    /// Elementwise secure subtraction.
    pub fn sub(&self, x: &SecretInts, y: &SecretInts) -> Result<SecretInts, Error> {
        x.sub(y)
    }

    /// Elementwise secure negation (local).
    pub fn neg(&self, x: &SecretInts) -> SecretInts {
        x.scale(-1)
    }

    /// Sums a list of equally long vectors elementwise (local).
    pub fn sum<'a>(
        &self,
        len: usize,
        parts: impl IntoIterator<Item = &'a SecretInts>,
    ) -> Result<SecretInts, Error> {
        parts
            .into_iter()
            .try_fold(SecretInts::zeros(len), |acc, p| acc.add(p))
    }

    /// Elementwise secure multiplication, one round.
    pub async fn mul(&mut self, x: &SecretInts, y: &SecretInts) -> Result<SecretInts, Error> {
        let len = x.len();
        if y.len() != len {
            return Err(Error::LengthMismatch {
                expected: len,
                actual: y.len(),
            });
        }
        if len == 0 {
            return Ok(SecretInts::zeros(0));
        }
        let triples = self.request(Request::ArithmeticTriples(len), len).await?;
        self.stats.arithmetic_triples += len;
        let mut masked = Vec::with_capacity(2 * len);
        for ((x, y), t) in x.shares.iter().zip(&y.shares).zip(&triples) {
            masked.push(x.wrapping_sub(t.a));
            masked.push(y.wrapping_sub(t.b));
        }
        let theirs = self.exchange_vec("mul", &masked).await?;
        let first = self.is_first();
        let shares = triples
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let d = masked[2 * i].wrapping_add(theirs[2 * i]);
                let e = masked[2 * i + 1].wrapping_add(theirs[2 * i + 1]);
                let mut z = t
                    .c
                    .wrapping_add(d.wrapping_mul(t.b))
                    .wrapping_add(e.wrapping_mul(t.a));
                if first {
                    z = z.wrapping_add(d.wrapping_mul(e));
                }
                z
            })
            .collect();
        Ok(SecretInts::from_shares(shares))
    }

    /// Elementwise secure squaring, one round.
    pub async fn square(&mut self, x: &SecretInts) -> Result<SecretInts, Error> {
        self.mul(x, x).await
    }

    /// Bitwise secure AND over XOR-shared 64-bit words, one round.
    pub(crate) async fn and_words(&mut self, x: &[u64], y: &[u64]) -> Result<Vec<u64>, Error> {
        let len = x.len();
        if y.len() != len {
            return Err(Error::LengthMismatch {
                expected: len,
                actual: y.len(),
            });
        }
        if len == 0 {
            return Ok(vec![]);
        }
        let triples = self.request(Request::BooleanTriples(len), len).await?;
        self.stats.boolean_triples += len;
        let mut masked = Vec::with_capacity(2 * len);
        for ((x, y), t) in x.iter().zip(y).zip(&triples) {
            masked.push(x ^ t.a);
            masked.push(y ^ t.b);
        }
        let theirs = self.exchange_vec("and", &masked).await?;
        let first = self.is_first();
        Ok(triples
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let d = masked[2 * i] ^ theirs[2 * i];
                let e = masked[2 * i + 1] ^ theirs[2 * i + 1];
                let mut z = t.c ^ (d & t.b) ^ (e & t.a);
                if first {
                    z ^= d & e;
                }
                z
            })
            .collect())
    }

    /// Elementwise secure AND, one round.
    pub async fn and(&mut self, x: &SecretBits, y: &SecretBits) -> Result<SecretBits, Error> {
        if x.len() != y.len() {
            return Err(Error::LengthMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        let z = self
            .and_words(&pack_bits(&x.shares), &pack_bits(&y.shares))
            .await?;
        Ok(SecretBits::from_shares(unpack_bits(&z, x.len())))
    }

    /// Elementwise secure OR, one round.
    pub async fn or(&mut self, x: &SecretBits, y: &SecretBits) -> Result<SecretBits, Error> {
        let (not_x, not_y) = (self.not(x), self.not(y));
        let nand = self.and(&not_x, &not_y).await?;
        Ok(self.not(&nand))
    }

    /// Converts shared bits into shared integers 0/1, one round.
    pub async fn bit_to_int(&mut self, b: &SecretBits) -> Result<SecretInts, Error> {
        // b = b0 ^ b1 = b0 + b1 - 2 * b0 * b1, where each party contributes its own share bit
        let own: Vec<u64> = b.shares.iter().map(|s| *s as u64).collect();
        let zeros = vec![0; own.len()];
        let (x, y) = if self.is_first() {
            (own, zeros)
        } else {
            (zeros, own)
        };
        let (x, y) = (SecretInts::from_shares(x), SecretInts::from_shares(y));
        let xy = self.mul(&x, &y).await?;
        x.add(&y)?.sub(&xy.scale(2))
    }

    /// Keeps each value where the bit is set and replaces it with zero elsewhere, two rounds.
    pub async fn select_or_zero(
        &mut self,
        b: &SecretBits,
        values: &SecretInts,
    ) -> Result<SecretInts, Error> {
        let b = self.bit_to_int(b).await?;
        self.mul(&b, values).await
    }

    /// Elementwise secure `x <= y`, seven rounds.
    ///
    /// Correct whenever `|y - x| < 2^63`.
    pub async fn compare_less_equal(
        &mut self,
        x: &SecretInts,
        y: &SecretInts,
    ) -> Result<SecretBits, Error> {
        let diff = y.sub(x)?;
        let negative = circuit::sign_bits(self, &diff).await?;
        Ok(self.not(&negative))
    }

    /// Elementwise secure `x <= bound` for a public bound, seven rounds.
    pub async fn compare_less_equal_public(
        &mut self,
        x: &SecretInts,
        bound: i64,
    ) -> Result<SecretBits, Error> {
        let diff = self.add_public(&self.neg(x), bound);
        let negative = circuit::sign_bits(self, &diff).await?;
        Ok(self.not(&negative))
    }

    /// Reveals integers to the party `to`, who receives `Some(plaintext)`; the other party sends
    /// its shares and receives `None`.
    pub async fn open_ints(
        &mut self,
        x: &SecretInts,
        to: Role,
    ) -> Result<Option<Vec<i64>>, Error> {
        let phase = "open ints";
        let peer = self.peer();
        if to == self.role {
            let theirs: Vec<u64> = self.channel.recv_vec_from(peer, phase, x.len()).await?;
            self.stats.rounds += 1;
            Ok(Some(
                x.shares
                    .iter()
                    .zip(theirs)
                    .map(|(a, b)| a.wrapping_add(b) as i64)
                    .collect(),
            ))
        } else {
            self.channel.send_to(peer, phase, &x.shares).await?;
            Ok(None)
        }
    }

    /// Reveals booleans to the party `to` (see [`Scheduler::open_ints`]).
    pub async fn open_bits(
        &mut self,
        x: &SecretBits,
        to: Role,
    ) -> Result<Option<Vec<bool>>, Error> {
        let phase = "open bits";
        let peer = self.peer();
        let words = x.len().div_ceil(64);
        if to == self.role {
            let theirs: Vec<u64> = self.channel.recv_vec_from(peer, phase, words).await?;
            self.stats.rounds += 1;
            let theirs = unpack_bits(&theirs, x.len());
            Ok(Some(x.shares.iter().zip(theirs).map(|(a, b)| a ^ b).collect()))
        } else {
            self.channel
                .send_to(peer, phase, &pack_bits(&x.shares))
                .await?;
            Ok(None)
        }
    }
}
