use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::marker::PhantomData;

/// Optimistic concurrency token of a stored record. Every successful
/// compare-and-swap advances it by one.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Version<T>(i64, PhantomData<T>);

impl<T> Version<T> {
    pub fn new(version: impl Into<i64>) -> Self {
        Self(version.into(), PhantomData)
    }

    pub fn initial() -> Self {
        Self::new(0)
    }

    pub fn next(&self) -> Self {
        Self::new(self.0 + 1)
    }
}

impl<T> Clone for Version<T> {
    fn clone(&self) -> Self {
        Self(self.0, PhantomData)
    }
}

impl<T> AsRef<i64> for Version<T> {
    fn as_ref(&self) -> &i64 {
        &self.0
    }
}

impl<T> From<Version<T>> for i64 {
    fn from(value: Version<T>) -> Self {
        value.0
    }
}

impl<T> Serialize for Version<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Version<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(|version| Self(version, PhantomData))
    }
}
