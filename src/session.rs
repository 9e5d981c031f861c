//! Running a complete session: one party over its own channel, or both parties and the dealer
//! in a single process over in-memory channels.

use futures::future::try_join_all;
use tokio::task::JoinHandle;
use tracing::{Level, debug, instrument};

use crate::{
    channel::{Channel, SimpleChannel},
    dealer::run_dealer,
    error::Error,
    input_processor::{InputProcessor, RevealedFeatures},
    policy::LiftParams,
    role::{Role, SESSION_PARTIES},
    row::InputData,
    scheduler::{Scheduler, Stats},
};

/// Runs the input protocol for the party at channel index `party`, reveals all features to
/// `reveal_to` and closes the session with the dealer.
///
/// Returns the revealed features at `reveal_to` and `None` at the other party.
#[instrument(level = Level::DEBUG, skip_all, fields(party, %role), err)]
pub async fn run_party(
    channel: impl Channel,
    party: usize,
    role: Role,
    input: &InputData,
    params: &LiftParams,
    reveal_to: Role,
) -> Result<(Option<RevealedFeatures>, Stats), Error> {
    let mut scheduler = Scheduler::new(channel, party, role)?;
    let processor = InputProcessor::new(&mut scheduler, input, params).await?;
    let revealed = processor.reveal(&mut scheduler, reveal_to).await?;
    let stats = scheduler.finish().await?;
    Ok((revealed, stats))
}

fn flatten<T>(joined: Result<T, tokio::task::JoinError>) -> Result<T, Error> {
    joined.map_err(|e| Error::TaskFailed(e.to_string()))
}

/// Simulates a session with both parties and the dealer as tokio tasks connected by
/// [`SimpleChannel`]s, revealing every feature to `reveal_to`.
///
/// If either party fails, the first party error is returned.
pub async fn simulate_lift(
    publisher: InputData,
    partner: InputData,
    params: LiftParams,
    reveal_to: Role,
) -> Result<RevealedFeatures, Error> {
    let [publisher_ch, partner_ch, dealer]: [SimpleChannel; SESSION_PARTIES] =
        SimpleChannel::channels(SESSION_PARTIES)
            .try_into()
            .map_err(|c: Vec<_>| {
                Error::TaskFailed(format!("expected {SESSION_PARTIES} channels, got {}", c.len()))
            })?;
    let dealer: JoinHandle<_> = tokio::spawn(run_dealer(dealer));

    let parties = [
        (publisher_ch, Role::Publisher, publisher),
        (partner_ch, Role::Partner, partner),
    ]
    .map(move |(channel, role, input)| {
        tokio::spawn(async move {
            run_party(channel, role.party_id(), role, &input, &params, reveal_to).await
        })
    });
    let results = flatten(try_join_all(parties).await)?;

    let mut revealed = None;
    for result in results {
        let (features, stats) = result?;
        debug!(?stats, "Party finished");
        revealed = revealed.or(features);
    }
    flatten(dealer.await)??;
    revealed.ok_or_else(|| Error::TaskFailed(format!("no party revealed to the {reveal_to}")))
}
