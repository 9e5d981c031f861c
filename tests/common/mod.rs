#![allow(dead_code)]

use private_lift::{
    channel::SimpleChannel,
    dealer::{DealerError, run_dealer},
    policy::{AttributionRule, LiftParams},
    role::{Role, SESSION_PARTIES},
    row::{Conversion, InputData, Row},
    scheduler::Scheduler,
};
use tokio::task::JoinHandle;

pub const EPOCH: i64 = 1_546_300_800;
pub const DAY: i64 = 24 * 60 * 60;
/// The opportunity timestamp of most exposed users.
pub const O: i64 = EPOCH + 1000;

pub const NUM_CONVERSIONS_PER_USER: usize = 2;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Test flag and opportunity timestamp per row, grouped by three.
const PUBLISHER_ROWS: [(bool, i64); 33] = [
    // test group, never exposed
    (true, 0),
    (true, 0),
    (true, 0),
    // control group, only the second conversion is attributed
    (false, O),
    (false, O),
    (false, O),
    (false, O),
    (false, O),
    (false, O),
    (false, O),
    (false, O),
    (false, O),
    // control group, both conversions attributed
    (false, O),
    (false, O),
    (false, O),
    (false, O),
    (false, O),
    (false, O),
    (false, O + DAY),
    (false, O + 5 * DAY),
    (false, O),
    // control group, nothing attributed
    (false, O),
    (false, O),
    (false, 0),
    // test group, reached
    (true, O),
    (true, O),
    (true, O),
    (true, O),
    (true, O),
    (true, O),
    // control group, refunds
    (false, O),
    (false, O),
    (false, O),
];

fn partner_conversions() -> Vec<Vec<(i64, i64)>> {
    vec![
        vec![(5, EPOCH + 100)],
        vec![],
        vec![(5, EPOCH + 2000), (7, EPOCH + 3000)],
        vec![(15, O - 500), (20, O + 1000)],
        vec![(15, O - 11), (20, O)],
        vec![(15, O - 100), (20, O + DAY)],
        vec![(0, O + 1), (20, O + 2)],
        vec![(0, O), (20, O + 30 * DAY)],
        vec![(7, O - 900), (20, O + 5)],
        vec![(3, O - 20), (20, O + 10)],
        vec![(0, O + 100), (20, O + 200), (40, O + 300)],
        vec![(9, EPOCH), (20, O + 3 * DAY)],
        vec![(10, O + 10), (20, O + 20)],
        vec![(10, O - 5), (20, O + 2000)],
        vec![(10, O - 10), (20, O + DAY)],
        vec![(10, O + 100), (20, O + 200), (99, O + 300)],
        vec![(10, O + 100), (20, O + 200), (99, O + 300), (5, O + 400)],
        vec![(10, O), (20, O)],
        vec![(10, O + DAY + 1), (20, O + 2 * DAY)],
        vec![(10, O + 5 * DAY), (20, O + 6 * DAY)],
        vec![(10, O + 1), (20, O + 29 * DAY)],
        vec![],
        vec![(80, O + 30 * DAY + 1)],
        vec![(80, O + 100), (90, O + 200)],
        vec![(40, O - 100), (50, O + 1500)],
        vec![(40, O - 3000), (50, O + DAY)],
        vec![(40, EPOCH), (50, O + 10)],
        vec![(10, O + 1), (20, O + 29 * DAY)],
        vec![(10, O + 5), (20, O + 10)],
        vec![(10, O), (20, O + 1), (30, O + 2)],
        vec![(25, O - 100), (-50, O + 5000)],
        vec![(25, EPOCH), (-50, O + DAY)],
        vec![(25, O - 11), (-50, O + 30 * DAY)],
    ]
}

pub fn publisher_input() -> InputData {
    InputData::new(
        PUBLISHER_ROWS
            .iter()
            .map(|(test, o)| Row::publisher(*test, *o))
            .collect(),
    )
    .expect("fixture is not empty")
}

pub fn partner_input() -> InputData {
    InputData::new(
        partner_conversions()
            .into_iter()
            .map(|convs| {
                Row::partner(
                    convs
                        .into_iter()
                        .map(|(v, t)| Conversion::new(v, t))
                        .collect(),
                )
            })
            .collect(),
    )
    .expect("fixture is not empty")
}

pub fn params() -> LiftParams {
    LiftParams::new(NUM_CONVERSIONS_PER_USER)
}

/// Plaintext reference: attributed values per slot, computed directly on both parties' rows.
pub fn expected_purchase_values(
    publisher: &InputData,
    partner: &InputData,
    params: &LiftParams,
) -> Vec<Vec<i64>> {
    let width = params.num_conversions_per_user;
    let mut values = vec![vec![0; publisher.num_rows()]; width];
    for (i, (p, q)) in publisher.rows().iter().zip(partner.rows()).enumerate() {
        for (s, c) in q.conversions.iter().take(width).enumerate() {
            let attributed = match params.attribution {
                AttributionRule::Window(w) => w.contains(p.opportunity_timestamp, c.timestamp),
                AttributionRule::AllConversions => true,
            };
            if attributed {
                values[s][i] = c.value;
            }
        }
    }
    values
}

/// Both schedulers of a session and the running dealer.
pub fn schedulers() -> (
    Scheduler<SimpleChannel>,
    Scheduler<SimpleChannel>,
    JoinHandle<Result<usize, DealerError>>,
) {
    let mut channels = SimpleChannel::channels(SESSION_PARTIES);
    let dealer = tokio::spawn(run_dealer(channels.pop().unwrap()));
    let partner = Scheduler::new(channels.pop().unwrap(), 1, Role::Partner).unwrap();
    let publisher = Scheduler::new(channels.pop().unwrap(), 0, Role::Publisher).unwrap();
    (publisher, partner, dealer)
}
