//! A (semi-)trusted dealer providing correlated randomness to both parties.
//!
//! The dealer answers a sequence of requests. Both parties must send the same request in every
//! round, otherwise the dealer notifies both of them and aborts. A party learns only its own half
//! of every triple.

use rand::{Rng, SeedableRng, random};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, instrument};

use crate::{
    channel::{self, Channel, MsgChannel},
    role::Role,
};

pub(crate) const REQUEST_PHASE: &str = "dealer request";
pub(crate) const RESPONSE_PHASE: &str = "dealer response";

/// Errors that can occur while running the dealer.
#[derive(Debug, thiserror::Error)]
pub enum DealerError {
    /// The two parties asked for different correlated randomness.
    #[error("the parties sent different requests: {0:?} vs {1:?}")]
    RequestMismatch(Request, Request),
    /// An error occurred while trying to communicate over the channel.
    #[error("channel error in dealer: {0}")]
    Channel(#[from] channel::Error),
}

/// What a party asks the dealer for in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Shares of `n` triples `(a, b, a * b)` over Z/2^64.
    ArithmeticTriples(usize),
    /// Shares of `n` triples `(a, b, a & b)` of XOR-shared 64-bit words.
    BooleanTriples(usize),
    /// The session is over.
    Done,
}

/// The dealer's answer to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Response {
    /// This party's half of each requested triple.
    Triples(Vec<Triple>),
    /// The session was aborted, with the reason.
    Abort(String),
    /// Acknowledges [`Request::Done`].
    Finished,
}

/// One party's shares of a multiplication triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Triple {
    pub(crate) a: u64,
    pub(crate) b: u64,
    pub(crate) c: u64,
}

fn arithmetic_triples(rng: &mut impl Rng, n: usize) -> [Vec<Triple>; 2] {
    let mut shares = [Vec::with_capacity(n), Vec::with_capacity(n)];
    for _ in 0..n {
        let (a0, a1, b0, b1, c0): (u64, u64, u64, u64, u64) = rng.random();
        let c = a0.wrapping_add(a1).wrapping_mul(b0.wrapping_add(b1));
        shares[0].push(Triple {
            a: a0,
            b: b0,
            c: c0,
        });
        shares[1].push(Triple {
            a: a1,
            b: b1,
            c: c.wrapping_sub(c0),
        });
    }
    shares
}

fn boolean_triples(rng: &mut impl Rng, n: usize) -> [Vec<Triple>; 2] {
    let mut shares = [Vec::with_capacity(n), Vec::with_capacity(n)];
    for _ in 0..n {
        let (a0, a1, b0, b1, c0): (u64, u64, u64, u64, u64) = rng.random();
        let c = (a0 ^ a1) & (b0 ^ b1);
        shares[0].push(Triple {
            a: a0,
            b: b0,
            c: c0,
        });
        shares[1].push(Triple {
            a: a1,
            b: b1,
            c: c ^ c0,
        });
    }
    shares
}

/// Runs the dealer until both parties finish the session, returning the number of rounds served.
#[instrument(level = Level::DEBUG, skip_all, err)]
pub async fn run_dealer(channel: impl Channel) -> Result<usize, DealerError> {
    let mut channel = MsgChannel::new(channel);
    let mut rng = ChaCha20Rng::from_seed(random());
    let publisher = Role::Publisher.party_id();
    let partner = Role::Partner.party_id();
    let mut rounds = 0;
    loop {
        // point-to-point links are independent, so the order of the two receives does not matter
        let r0: Request = channel.recv_from(publisher, REQUEST_PHASE).await?;
        let r1: Request = channel.recv_from(partner, REQUEST_PHASE).await?;
        if r0 != r1 {
            let e = DealerError::RequestMismatch(r0, r1);
            let abort = Response::Abort(e.to_string());
            channel.send_to(publisher, RESPONSE_PHASE, &abort).await?;
            channel.send_to(partner, RESPONSE_PHASE, &abort).await?;
            return Err(e);
        }
        let [s0, s1] = match r0 {
            Request::ArithmeticTriples(n) => arithmetic_triples(&mut rng, n),
            Request::BooleanTriples(n) => boolean_triples(&mut rng, n),
            Request::Done => {
                channel
                    .send_to(publisher, RESPONSE_PHASE, &Response::Finished)
                    .await?;
                channel
                    .send_to(partner, RESPONSE_PHASE, &Response::Finished)
                    .await?;
                debug!(rounds, "Dealer finished");
                return Ok(rounds);
            }
        };
        debug!(request = ?r0, "Dealer sending triples");
        channel
            .send_to(publisher, RESPONSE_PHASE, &Response::Triples(s0))
            .await?;
        channel
            .send_to(partner, RESPONSE_PHASE, &Response::Triples(s1))
            .await?;
        rounds += 1;
    }
}

/// Drives two dealer requests concurrently, returning both responses.
#[cfg(test)]
async fn request_both<C: Channel>(
    a: &mut MsgChannel<C>,
    b: &mut MsgChannel<C>,
    ra: Request,
    rb: Request,
) -> Result<(Response, Response), channel::Error> {
    use futures::future::try_join;

    use crate::role::DEALER;
    a.send_to(DEALER, REQUEST_PHASE, &ra).await?;
    b.send_to(DEALER, REQUEST_PHASE, &rb).await?;
    try_join(
        a.recv_from(DEALER, RESPONSE_PHASE),
        b.recv_from(DEALER, RESPONSE_PHASE),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SimpleChannel;

    fn split(mut channels: Vec<SimpleChannel>) -> (SimpleChannel, SimpleChannel, SimpleChannel) {
        let dealer = channels.pop().unwrap();
        let partner = channels.pop().unwrap();
        let publisher = channels.pop().unwrap();
        (publisher, partner, dealer)
    }

    #[tokio::test]
    async fn triples_are_correlated() -> Result<(), Box<dyn std::error::Error>> {
        let (a, b, dealer) = split(SimpleChannel::channels(3));
        let dealer = tokio::spawn(run_dealer(dealer));
        let (mut a, mut b) = (MsgChannel::new(a), MsgChannel::new(b));

        let n = 16;
        let (Response::Triples(ta), Response::Triples(tb)) = request_both(
            &mut a,
            &mut b,
            Request::ArithmeticTriples(n),
            Request::ArithmeticTriples(n),
        )
        .await?
        else {
            panic!("expected triples");
        };
        assert_eq!(ta.len(), n);
        for (x, y) in ta.iter().zip(&tb) {
            let a = x.a.wrapping_add(y.a);
            let b = x.b.wrapping_add(y.b);
            assert_eq!(a.wrapping_mul(b), x.c.wrapping_add(y.c));
        }

        let (Response::Triples(ta), Response::Triples(tb)) = request_both(
            &mut a,
            &mut b,
            Request::BooleanTriples(n),
            Request::BooleanTriples(n),
        )
        .await?
        else {
            panic!("expected triples");
        };
        for (x, y) in ta.iter().zip(&tb) {
            assert_eq!((x.a ^ y.a) & (x.b ^ y.b), x.c ^ y.c);
        }

        let (Response::Finished, Response::Finished) =
            request_both(&mut a, &mut b, Request::Done, Request::Done).await?
        else {
            panic!("expected the dealer to finish");
        };
        assert_eq!(dealer.await??, 2);
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_requests_abort_both_parties() -> Result<(), Box<dyn std::error::Error>> {
        let (a, b, dealer) = split(SimpleChannel::channels(3));
        let dealer = tokio::spawn(run_dealer(dealer));
        let (mut a, mut b) = (MsgChannel::new(a), MsgChannel::new(b));

        let (ra, rb) = request_both(
            &mut a,
            &mut b,
            Request::ArithmeticTriples(3),
            Request::BooleanTriples(3),
        )
        .await?;
        assert!(matches!(ra, Response::Abort(_)));
        assert!(matches!(rb, Response::Abort(_)));
        assert!(matches!(
            dealer.await?,
            Err(DealerError::RequestMismatch(
                Request::ArithmeticTriples(3),
                Request::BooleanTriples(3)
            ))
        ));
        Ok(())
    }
}
