use std::fmt::Display;

use error_stack::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum BlockReason {
    Overdue,
    CapacityExceeded,
}

impl Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::Overdue => write!(f, "overdue items or outstanding late fee"),
            BlockReason::CapacityExceeded => write!(f, "rental capacity exceeded"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KernelError {
    RecordNotFound,
    ItemNotFound,
    ItemAlreadyHeld,
    RentalBlocked(BlockReason),
    InvalidArgument,
    Unavailable,
    Concurrency,
    Timeout,
    Internal,
}

impl KernelError {
    /// Store failures worth another attempt against a freshly loaded record.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KernelError::Concurrency | KernelError::Internal)
    }
}

impl Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelError::RecordNotFound => write!(f, "Rental record not found"),
            KernelError::ItemNotFound => write!(f, "Item not found"),
            KernelError::ItemAlreadyHeld => write!(f, "Item is already held by this user"),
            KernelError::RentalBlocked(reason) => write!(f, "Rental blocked: {reason}"),
            KernelError::InvalidArgument => write!(f, "Invalid argument"),
            KernelError::Unavailable => write!(f, "Dependent service unavailable"),
            KernelError::Concurrency => write!(f, "Concurrency error"),
            KernelError::Timeout => write!(f, "Process timed out"),
            KernelError::Internal => write!(f, "Internal kernel error"),
        }
    }
}

impl Context for KernelError {}
