//! Converts one party's rows into secret-shared per-user lift features.
//!
//! Both parties construct an [`InputProcessor`] at the same time, each from its own
//! [`InputData`] and its own [`Scheduler`]. Construction runs the complete protocol:
//!
//! 1. a public handshake comparing row counts, padding width, parameters and roles,
//! 2. secret-sharing of the publisher's test flags and opportunity timestamps and of the
//!    partner's padded conversions,
//! 3. secure evaluation of the attribution window for every conversion slot,
//! 4. masking and summing of purchase values, squaring of their suffix sums,
//! 5. the test/control populations and test reach.
//!
//! All rows are processed together, so every interactive step is a single batched round whose
//! size depends only on the public row count and padding width.

use serde::{Deserialize, Serialize};
use tracing::{Level, debug, instrument};

use crate::{
    channel::Channel,
    error::Error,
    policy::{AttributionRule, AttributionWindow, LiftParams, ReachRule},
    role::Role,
    row::InputData,
    scheduler::Scheduler,
    share::{SecretBits, SecretInts},
};

/// The public facts both parties compare before sharing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Handshake {
    role: Role,
    num_rows: usize,
    num_conversions_per_user: usize,
    params: [u8; 32],
}

fn mismatch(what: &'static str, local: impl ToString, remote: impl ToString) -> Error {
    Error::ConfigMismatch {
        what,
        local: local.to_string(),
        remote: remote.to_string(),
    }
}

async fn handshake<C: Channel>(
    scheduler: &mut Scheduler<C>,
    num_rows: usize,
    params: &LiftParams,
) -> Result<(), Error> {
    let ours = Handshake {
        role: scheduler.role(),
        num_rows,
        num_conversions_per_user: params.num_conversions_per_user,
        params: params.fingerprint(),
    };
    let theirs: Handshake = scheduler.exchange("handshake", &ours).await?;
    if theirs.role == ours.role {
        return Err(mismatch("role", ours.role, theirs.role));
    }
    if theirs.num_rows != ours.num_rows {
        return Err(mismatch("number of rows", ours.num_rows, theirs.num_rows));
    }
    if theirs.num_conversions_per_user != ours.num_conversions_per_user {
        return Err(mismatch(
            "conversions per user",
            ours.num_conversions_per_user,
            theirs.num_conversions_per_user,
        ));
    }
    if theirs.params != ours.params {
        return Err(mismatch(
            "lift parameters",
            blake3::Hash::from(ours.params).to_hex(),
            blake3::Hash::from(theirs.params).to_hex(),
        ));
    }
    Ok(())
}

/// The secret-shared inputs of both parties, before any derivation.
struct SharedInputs {
    test_group: SecretBits,
    has_exposure: SecretBits,
    opportunity: SecretInts,
    values: SecretInts,
    timestamps: SecretInts,
    is_real: SecretBits,
}

#[instrument(level = Level::DEBUG, skip_all, err)]
async fn share_inputs<C: Channel>(
    scheduler: &mut Scheduler<C>,
    input: &InputData,
    width: usize,
) -> Result<SharedInputs, Error> {
    let n = input.num_rows();
    let slots = n * width;
    let (test_group, has_exposure, opportunity) = if scheduler.role() == Role::Publisher {
        let opportunity = input.opportunity_timestamps();
        let has_exposure: Vec<bool> = opportunity.iter().map(|o| *o > 0).collect();
        (
            scheduler
                .input_bits(Role::Publisher, Some(&input.test_group_flags()), n)
                .await?,
            scheduler
                .input_bits(Role::Publisher, Some(&has_exposure), n)
                .await?,
            scheduler
                .input_ints(Role::Publisher, Some(&opportunity), n)
                .await?,
        )
    } else {
        (
            scheduler.input_bits(Role::Publisher, None, n).await?,
            scheduler.input_bits(Role::Publisher, None, n).await?,
            scheduler.input_ints(Role::Publisher, None, n).await?,
        )
    };
    debug!(rows = n, "Shared publisher inputs");

    let (values, timestamps, is_real) = if scheduler.role() == Role::Partner {
        let columns = input.padded_columns(width);
        (
            scheduler
                .input_ints(Role::Partner, Some(&columns.values), slots)
                .await?,
            scheduler
                .input_ints(Role::Partner, Some(&columns.timestamps), slots)
                .await?,
            scheduler
                .input_bits(Role::Partner, Some(&columns.is_real), slots)
                .await?,
        )
    } else {
        (
            scheduler.input_ints(Role::Partner, None, slots).await?,
            scheduler.input_ints(Role::Partner, None, slots).await?,
            scheduler.input_bits(Role::Partner, None, slots).await?,
        )
    };
    debug!(slots, "Shared partner inputs");

    Ok(SharedInputs {
        test_group,
        has_exposure,
        opportunity,
        values,
        timestamps,
        is_real,
    })
}

/// Computes which conversion slots are attributable (slot-major, like the inputs).
#[instrument(level = Level::DEBUG, skip_all, err)]
async fn attributable_slots<C: Channel>(
    scheduler: &mut Scheduler<C>,
    inputs: &SharedInputs,
    rule: &AttributionRule,
    width: usize,
) -> Result<SecretBits, Error> {
    let AttributionRule::Window(AttributionWindow {
        length,
        lead_tolerance,
    }) = *rule
    else {
        return Ok(inputs.is_real.clone());
    };
    let slots = inputs.values.len();
    let opportunity = inputs.opportunity.repeat(width);
    let has_exposure = inputs.has_exposure.repeat(width);

    // o <= t + tolerance, and t <= o + length if the window is bounded, in one batch
    let mut lhs = vec![opportunity.clone()];
    let mut rhs = vec![scheduler.add_public(&inputs.timestamps, lead_tolerance)];
    if let Some(length) = length {
        lhs.push(inputs.timestamps.clone());
        rhs.push(scheduler.add_public(&opportunity, length));
    }
    let in_window = scheduler
        .compare_less_equal(&SecretInts::concat(&lhs), &SecretInts::concat(&rhs))
        .await?;
    let (not_before, not_after) = if length.is_some() {
        in_window.split_at(slots)?
    } else {
        (in_window, scheduler.not(&SecretBits::falses(slots)))
    };

    // (not_before & not_after) & (is_real & has_exposure), two rounds
    let pairs = scheduler
        .and(
            &SecretBits::concat([&not_before, &inputs.is_real]),
            &SecretBits::concat([&not_after, &has_exposure]),
        )
        .await?;
    let (in_window, real_and_exposed) = pairs.split_at(slots)?;
    scheduler.and(&in_window, &real_and_exposed).await
}

/// Per-user lift features of one party, held as secret shares.
#[derive(Debug, Clone)]
pub struct InputProcessor {
    role: Role,
    num_rows: usize,
    num_conversions_per_user: usize,
    test_population: SecretBits,
    control_population: SecretBits,
    any_valid_purchase: SecretBits,
    test_reach: SecretBits,
    purchase_values: Vec<SecretInts>,
    purchase_value_totals: SecretInts,
    purchase_value_squared: Vec<SecretInts>,
}

impl InputProcessor {
    /// Runs the complete input protocol for this party.
    ///
    /// Must be called by both parties at the same time, with schedulers of opposite roles that
    /// are connected to each other and to the dealer. Returns only after all features are
    /// computed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyInput`] or [`Error::WrongRoleData`] for malformed rows,
    /// [`Error::ConfigMismatch`] if the parties disagree on any public parameter (before anything
    /// private is shared), and [`Error::Desync`] / [`Error::Channel`] / [`Error::Dealer`] if the
    /// protocol breaks down.
    #[instrument(level = Level::DEBUG, skip_all, fields(role = %scheduler.role()), err)]
    pub async fn new<C: Channel>(
        scheduler: &mut Scheduler<C>,
        input: &InputData,
        params: &LiftParams,
    ) -> Result<Self, Error> {
        let role = scheduler.role();
        let n = input.num_rows();
        let width = params.num_conversions_per_user;
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        input.validate_for(role)?;
        handshake(scheduler, n, params).await?;
        debug!(rows = n, width, "Handshake complete");

        let inputs = share_inputs(scheduler, input, width).await?;
        let valid = attributable_slots(scheduler, &inputs, &params.attribution, width).await?;

        let masked = scheduler.select_or_zero(&valid, &inputs.values).await?;
        let purchase_values = masked.chunks(n);
        let purchase_value_totals = scheduler.sum(n, &purchase_values)?;

        let mut suffix_sums = Vec::with_capacity(width);
        let mut acc = SecretInts::zeros(n);
        for values in purchase_values.iter().rev() {
            acc = acc.add(values)?;
            suffix_sums.push(acc.clone());
        }
        suffix_sums.reverse();
        let squared = scheduler.square(&SecretInts::concat(&suffix_sums)).await?;
        let purchase_value_squared = squared.chunks(n);
        debug!("Computed purchase values and squares");

        let mut any_valid_purchase = SecretBits::falses(n);
        for slot in valid.chunks(n) {
            any_valid_purchase = scheduler.or(&any_valid_purchase, &slot).await?;
        }

        let reached = match params.reach {
            ReachRule::Exposure => &inputs.has_exposure,
            ReachRule::ValidConversion => &any_valid_purchase,
        };
        let test_reach = scheduler.and(&inputs.test_group, reached).await?;
        let control_population = scheduler.not(&inputs.test_group);
        debug!("Computed populations and reach");

        Ok(Self {
            role,
            num_rows: n,
            num_conversions_per_user: width,
            test_population: inputs.test_group,
            control_population,
            any_valid_purchase,
            test_reach,
            purchase_values,
            purchase_value_totals,
            purchase_value_squared,
        })
    }

    /// The role this processor was built for.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The number of rows, identical on both parties.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// The padding width used for every row.
    pub fn num_conversions_per_user(&self) -> usize {
        self.num_conversions_per_user
    }

    /// Attributed purchase values, one vector per conversion slot, each indexed by row.
    pub fn purchase_values(&self) -> &[SecretInts] {
        &self.purchase_values
    }

    /// The total attributed purchase value per row.
    pub fn purchase_value_totals(&self) -> &SecretInts {
        &self.purchase_value_totals
    }

    /// Per conversion slot `s`, the square of the sum of attributed values in slots `s..`.
    /// Slot 0 holds the squared per-row total.
    pub fn purchase_value_squared(&self) -> &[SecretInts] {
        &self.purchase_value_squared
    }

    /// Whether each row is in the test group and reached.
    pub fn test_reach(&self) -> &SecretBits {
        &self.test_reach
    }

    /// Whether each row is in the test group.
    pub fn test_population(&self) -> &SecretBits {
        &self.test_population
    }

    /// Whether each row is in the control group.
    pub fn control_population(&self) -> &SecretBits {
        &self.control_population
    }

    /// Whether each row has at least one attributed conversion.
    pub fn any_valid_purchase(&self) -> &SecretBits {
        &self.any_valid_purchase
    }

    /// Opens every feature to `to`. Intended for tests and debugging only; a production pipeline
    /// aggregates the features before revealing anything.
    pub async fn reveal<C: Channel>(
        &self,
        scheduler: &mut Scheduler<C>,
        to: Role,
    ) -> Result<Option<RevealedFeatures>, Error> {
        let mut purchase_values = vec![];
        for v in &self.purchase_values {
            purchase_values.push(scheduler.open_ints(v, to).await?);
        }
        let mut purchase_value_squared = vec![];
        for v in &self.purchase_value_squared {
            purchase_value_squared.push(scheduler.open_ints(v, to).await?);
        }
        let purchase_value_totals = scheduler.open_ints(&self.purchase_value_totals, to).await?;
        let test_reach = scheduler.open_bits(&self.test_reach, to).await?;
        let test_population = scheduler.open_bits(&self.test_population, to).await?;
        let control_population = scheduler.open_bits(&self.control_population, to).await?;
        let any_valid_purchase = scheduler.open_bits(&self.any_valid_purchase, to).await?;
        if to != self.role {
            return Ok(None);
        }
        Ok(Some(RevealedFeatures {
            num_rows: self.num_rows,
            purchase_values: purchase_values.into_iter().flatten().collect(),
            purchase_value_totals: purchase_value_totals.unwrap_or_default(),
            purchase_value_squared: purchase_value_squared.into_iter().flatten().collect(),
            test_reach: test_reach.unwrap_or_default(),
            test_population: test_population.unwrap_or_default(),
            control_population: control_population.unwrap_or_default(),
            any_valid_purchase: any_valid_purchase.unwrap_or_default(),
        }))
    }
}

/// Plaintext features after [`InputProcessor::reveal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealedFeatures {
    /// The number of rows.
    pub num_rows: usize,
    /// `purchase_values[slot][row]`.
    pub purchase_values: Vec<Vec<i64>>,
    /// Per-row totals.
    pub purchase_value_totals: Vec<i64>,
    /// `purchase_value_squared[slot][row]`.
    pub purchase_value_squared: Vec<Vec<i64>>,
    /// Test reach per row.
    pub test_reach: Vec<bool>,
    /// Test group membership per row.
    pub test_population: Vec<bool>,
    /// Control group membership per row.
    pub control_population: Vec<bool>,
    /// Whether a row has any attributed conversion.
    pub any_valid_purchase: Vec<bool>,
}
