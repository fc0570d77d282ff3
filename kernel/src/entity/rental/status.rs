use error_stack::Report;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::KernelError;

const AVAILABLE: &str = "AVAILABLE";
const RENTED: &str = "RENTED";
const OVERDUE: &str = "OVERDUE";
const LOCKED: &str = "LOCKED";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalStatus {
    /// No outstanding obligations.
    Available,
    /// At least one active item, nothing overdue, no fee.
    Rented,
    /// At least one item is past its due date.
    Overdue,
    /// Fee outstanding or administratively disabled. Rent is refused.
    Locked,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Available => AVAILABLE,
            RentalStatus::Rented => RENTED,
            RentalStatus::Overdue => OVERDUE,
            RentalStatus::Locked => LOCKED,
        }
    }
}

impl Display for RentalStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RentalStatus {
    type Error = Report<KernelError>;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            AVAILABLE => Ok(RentalStatus::Available),
            RENTED => Ok(RentalStatus::Rented),
            OVERDUE => Ok(RentalStatus::Overdue),
            LOCKED => Ok(RentalStatus::Locked),
            _ => Err(Report::new(KernelError::Internal)
                .attach_printable(format!("Unknown rental status: {value}"))),
        }
    }
}
