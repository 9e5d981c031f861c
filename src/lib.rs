//! Secret-shared input processing for private conversion lift measurement between two parties.
//!
//! A publisher knows which users were assigned to the test group and when they saw an ad; a
//! partner knows what those users bought. This crate lets both parties turn their rows into
//! secret-shared per-user features (attributed purchase values, their squares, test reach)
//! without revealing any row to the other party. The features are meant to be consumed by a
//! downstream secure aggregation that computes the lift.
//!
//! ## Main Components
//!
//! * [`input_processor`]: The [`input_processor::InputProcessor`], which runs the whole input
//!   protocol for one party.
//! * [`scheduler`]: Two-party additive / XOR secret sharing with Beaver multiplication.
//! * [`dealer`]: A (semi-)trusted dealer providing the correlated randomness.
//! * [`channel`]: Communication abstractions for exchanging data between parties.
//! * [`policy`]: The public parameters of a session (padding, attribution window, reach).
//!
//! ## Basic Usage
//!
//! Each party:
//!
//! 1. Sets up a [`channel::Channel`] connected to the other party and the dealer
//! 2. Loads its rows into an [`row::InputData`]
//! 3. Creates a [`scheduler::Scheduler`] for its channel index and [`role::Role`]
//! 4. Calls [`input_processor::InputProcessor::new`] with the agreed [`policy::LiftParams`]
//! 5. Hands the secret-shared features to the aggregation
//!
//! For simulated environments (testing/development), use [`session::simulate_lift`].
//!
//! ## Example
//!
//! ```ignore
//! use private_lift::{
//!     policy::LiftParams,
//!     role::Role,
//!     row::{Conversion, InputData, Row},
//!     session::simulate_lift,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let publisher = InputData::new(vec![Row::publisher(true, 1_000)])?;
//! let partner = InputData::new(vec![Row::partner(vec![Conversion::new(25, 1_100)])])?;
//!
//! let features = simulate_lift(publisher, partner, LiftParams::new(2), Role::Publisher).await?;
//! assert_eq!(features.purchase_value_totals, vec![25]);
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod channel;
pub mod dealer;
pub mod error;
pub mod input_processor;
pub mod policy;
pub mod role;
pub mod row;
pub mod scheduler;
pub mod session;
pub mod share;

mod circuit;

pub use error::Error;
