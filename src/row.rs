//! The plaintext rows held locally by one party.

use serde::{Deserialize, Serialize};

use crate::{error::Error, role::Role};

/// A single purchase event of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    /// The purchase amount (may be negative for refunds).
    pub value: i64,
    /// When the purchase happened, in seconds since the Unix epoch.
    pub timestamp: i64,
}

impl Conversion {
    /// Creates a conversion event.
    pub fn new(value: i64, timestamp: i64) -> Self {
        Self { value, timestamp }
    }
}

/// One user's record as held by one party.
///
/// The publisher fills `is_test_group` and `opportunity_timestamp`, the partner fills
/// `conversions`; the fields owned by the other party keep their default values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Whether the user was assigned to the test (treatment) group.
    pub is_test_group: bool,
    /// When the user was exposed to the ad, `0` if there was no exposure.
    pub opportunity_timestamp: i64,
    /// Purchases of the user in chronological order.
    pub conversions: Vec<Conversion>,
}

impl Row {
    /// A publisher-side row.
    pub fn publisher(is_test_group: bool, opportunity_timestamp: i64) -> Self {
        Self {
            is_test_group,
            opportunity_timestamp,
            conversions: vec![],
        }
    }

    /// A partner-side row.
    pub fn partner(conversions: Vec<Conversion>) -> Self {
        Self {
            conversions,
            ..Default::default()
        }
    }

    fn is_valid_for(&self, role: Role) -> bool {
        match role {
            Role::Publisher => self.conversions.is_empty(),
            Role::Partner => !self.is_test_group && self.opportunity_timestamp == 0,
        }
    }
}

/// One slot of a fixed-width conversion list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    /// The conversion in this slot, `(0, 0)` for padding.
    pub conversion: Conversion,
    /// `false` for padding slots, which are never attributed.
    pub is_real: bool,
}

/// A conversion list truncated or padded to exactly `width` slots.
///
/// The number of circuit evaluations per row depends on `width` only, never on how many
/// conversions a user actually has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedConversions {
    slots: Vec<Slot>,
}

impl PaddedConversions {
    /// Keeps the first `width` conversions and pads the rest with zero-valued slots.
    pub fn new(conversions: &[Conversion], width: usize) -> Self {
        let mut slots: Vec<Slot> = conversions
            .iter()
            .take(width)
            .map(|c| Slot {
                conversion: *c,
                is_real: true,
            })
            .collect();
        slots.resize(width, Slot::default());
        Self { slots }
    }

    /// The slots, always exactly `width` of them.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The number of slots.
    pub fn width(&self) -> usize {
        self.slots.len()
    }
}

/// The complete, ordered row collection of one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputData {
    rows: Vec<Row>,
}

impl InputData {
    /// Wraps a non-empty row collection.
    pub fn new(rows: Vec<Row>) -> Result<Self, Error> {
        if rows.is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(Self { rows })
    }

    /// The rows in order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The number of rows, which is public.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Checks that no row carries fields owned by the other party.
    pub fn validate_for(&self, role: Role) -> Result<(), Error> {
        match self.rows.iter().position(|r| !r.is_valid_for(role)) {
            Some(row) => Err(Error::WrongRoleData { role, row }),
            None => Ok(()),
        }
    }

    /// The test group flags, one per row.
    pub fn test_group_flags(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.is_test_group).collect()
    }

    /// The opportunity timestamps, one per row.
    pub fn opportunity_timestamps(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.opportunity_timestamp).collect()
    }

    /// Every row's conversions padded to `width`, laid out slot-major: all rows' slot 0, then all
    /// rows' slot 1, and so on.
    pub fn padded_columns(&self, width: usize) -> ConversionColumns {
        let padded: Vec<PaddedConversions> = self
            .rows
            .iter()
            .map(|r| PaddedConversions::new(&r.conversions, width))
            .collect();
        let mut columns = ConversionColumns::default();
        for s in 0..width {
            for row in &padded {
                let slot = row.slots()[s];
                columns.values.push(slot.conversion.value);
                columns.timestamps.push(slot.conversion.timestamp);
                columns.is_real.push(slot.is_real);
            }
        }
        columns
    }
}

/// Slot-major columns of padded conversions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionColumns {
    /// Purchase values.
    pub values: Vec<i64>,
    /// Purchase timestamps.
    pub timestamps: Vec<i64>,
    /// Whether the slot holds a real conversion.
    pub is_real: Vec<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_truncates_and_fills() {
        let convs = [
            Conversion::new(10, 100),
            Conversion::new(20, 200),
            Conversion::new(30, 300),
        ];
        let truncated = PaddedConversions::new(&convs, 2);
        assert_eq!(truncated.width(), 2);
        assert!(truncated.slots().iter().all(|s| s.is_real));
        assert_eq!(truncated.slots()[1].conversion, convs[1]);

        let padded = PaddedConversions::new(&convs[..1], 3);
        assert_eq!(padded.width(), 3);
        assert_eq!(
            padded.slots().iter().map(|s| s.is_real).collect::<Vec<_>>(),
            vec![true, false, false]
        );
        assert_eq!(padded.slots()[2].conversion, Conversion::default());

        assert_eq!(PaddedConversions::new(&convs, 0).width(), 0);
    }

    #[test]
    fn columns_are_slot_major() -> Result<(), Error> {
        let data = InputData::new(vec![
            Row::partner(vec![Conversion::new(1, 11), Conversion::new(2, 12)]),
            Row::partner(vec![Conversion::new(3, 13)]),
        ])?;
        let columns = data.padded_columns(2);
        assert_eq!(columns.values, vec![1, 3, 2, 0]);
        assert_eq!(columns.timestamps, vec![11, 13, 12, 0]);
        assert_eq!(columns.is_real, vec![true, true, true, false]);
        Ok(())
    }

    #[test]
    fn rows_are_checked_against_role() -> Result<(), Error> {
        assert!(matches!(InputData::new(vec![]), Err(Error::EmptyInput)));
        let publisher = InputData::new(vec![Row::publisher(true, 5), Row::publisher(false, 0)])?;
        publisher.validate_for(Role::Publisher)?;
        assert!(matches!(
            publisher.validate_for(Role::Partner),
            Err(Error::WrongRoleData {
                role: Role::Partner,
                row: 0
            })
        ));
        let partner = InputData::new(vec![
            Row::partner(vec![]),
            Row::partner(vec![Conversion::new(1, 1)]),
        ])?;
        partner.validate_for(Role::Partner)?;
        assert!(matches!(
            partner.validate_for(Role::Publisher),
            Err(Error::WrongRoleData { row: 1, .. })
        ));
        Ok(())
    }
}
