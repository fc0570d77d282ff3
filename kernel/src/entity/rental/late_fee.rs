use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize, Fromln, AsRefln)]
pub struct LateFee(i64);

impl LateFee {
    pub fn new(fee: impl Into<i64>) -> Self {
        Self(fee.into())
    }

    pub fn is_outstanding(&self) -> bool {
        self.0 > 0
    }
}
