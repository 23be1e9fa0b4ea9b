//! The availability rule
//!
//! A pure decision function over a slot's occupancy snapshot. Slots are
//! fixed-length and exclusive per cabin, so this is a closed-form rule, not
//! interval arithmetic: the `UNIQUE(slot, cabin)` storage constraint already
//! rules out overlapping bookings on one cabin.

use banya_api::{CabinNumber, Gender};
use banya_store::OccupantRecord;

/// How many cabins may be granted at a slot to a user of `requesting`.
///
/// - empty slot: every cabin, any gender
/// - occupied by the same gender only: the remaining cabins
/// - occupied by another gender: none (cross-gender sharing is forbidden)
///
/// The caller guarantees `requesting` is the requester's recorded gender;
/// users without one never reach this function.
pub fn available_cabins(
    cabins: &[CabinNumber],
    occupants: &[OccupantRecord],
    requesting: Gender,
) -> usize {
    if occupants.is_empty() {
        return cabins.len();
    }

    if occupants.iter().any(|o| o.gender != requesting) {
        return 0;
    }

    cabins.len().saturating_sub(occupants.len())
}

/// Unoccupied cabins at a slot, in ascending cabin-number order.
///
/// Assignment always takes a prefix of this list, so the same occupancy
/// always yields the same cabins.
pub fn free_cabins(cabins: &[CabinNumber], occupants: &[OccupantRecord]) -> Vec<CabinNumber> {
    cabins
        .iter()
        .copied()
        .filter(|cabin| !occupants.iter().any(|o| o.cabin == *cabin))
        .collect()
}
