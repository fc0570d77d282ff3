use destructure::Destructure;
use vodca::References;

use crate::entity::Rental;
use crate::event::RentalNotification;

/// Outcome of a successful aggregate operation: the next state of the record
/// and the notifications that must follow once that state is persisted.
#[derive(Debug, Clone, Eq, PartialEq, References, Destructure)]
pub struct Transition {
    rental: Rental,
    notifications: Vec<RentalNotification>,
}

impl Transition {
    pub fn new(rental: Rental, notifications: Vec<RentalNotification>) -> Self {
        Self {
            rental,
            notifications,
        }
    }

    pub fn silent(rental: Rental) -> Self {
        Self::new(rental, Vec::new())
    }
}
