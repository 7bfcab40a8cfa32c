//! Bus addresses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bus::error::{BusError, BusResult};

/// Logical routing key of a bus consumer. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> BusResult<Self> {
        let address = address.into();
        if address.is_empty() {
            return Err(BusError::EmptyAddress);
        }
        Ok(Self(address))
    }

    /// Derive an address from a request path by removing the mount prefix.
    ///
    /// `/bus/userLogin` with prefix `/bus/` yields `userLogin`. A path that
    /// does not carry the prefix, or carries nothing after it, is rejected.
    pub fn from_path(path: &str, mount_prefix: &str) -> BusResult<Self> {
        path.strip_prefix(mount_prefix)
            .ok_or(BusError::EmptyAddress)
            .and_then(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = BusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Address {
    type Error = BusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(
            Address::from_path("/bus/userLogin", "/bus/").unwrap().as_str(),
            "userLogin"
        );
        assert_eq!(
            Address::from_path("/bus/user.login", "/bus/").unwrap().as_str(),
            "user.login"
        );
    }

    #[test]
    fn test_empty_remainder_rejected() {
        assert_eq!(Address::from_path("/bus/", "/bus/"), Err(BusError::EmptyAddress));
        assert_eq!(Address::from_path("/bus", "/bus/"), Err(BusError::EmptyAddress));
        assert_eq!(Address::from_path("/other/x", "/bus/"), Err(BusError::EmptyAddress));
    }

    #[test]
    fn test_serde_rejects_empty() {
        assert!(serde_json::from_str::<Address>("\"\"").is_err());
        let address: Address = serde_json::from_str("\"browserInput\"").unwrap();
        assert_eq!(address.to_string(), "browserInput");
    }
}
