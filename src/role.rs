//! The two parties of a lift computation and their indices on the channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The channel index of the (semi-)trusted dealer providing correlated randomness.
pub const DEALER: usize = 2;

/// The number of channel endpoints in a session: both parties plus the dealer.
pub const SESSION_PARTIES: usize = 3;

/// Which side of the computation a party represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Holds ad opportunities and test/control assignment, party 0.
    Publisher,
    /// Holds conversion events, party 1.
    Partner,
}

impl Role {
    /// The channel index of this party.
    pub fn party_id(self) -> usize {
        match self {
            Role::Publisher => 0,
            Role::Partner => 1,
        }
    }

    /// Looks up the role for a channel index.
    pub fn from_party_id(party: usize) -> Result<Self, Error> {
        match party {
            0 => Ok(Role::Publisher),
            1 => Ok(Role::Partner),
            p => Err(Error::InvalidParty(p)),
        }
    }

    /// The counterpart of this party.
    pub fn peer(self) -> Self {
        match self {
            Role::Publisher => Role::Partner,
            Role::Partner => Role::Publisher,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Publisher => f.write_str("publisher"),
            Role::Partner => f.write_str("partner"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_ids_roundtrip() {
        for role in [Role::Publisher, Role::Partner] {
            assert_eq!(Role::from_party_id(role.party_id()).unwrap(), role);
            assert_ne!(role.peer(), role);
            assert_ne!(role.party_id(), DEALER);
        }
        assert!(matches!(
            Role::from_party_id(DEALER),
            Err(Error::InvalidParty(DEALER))
        ));
    }
}
