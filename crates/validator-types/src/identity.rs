use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque neuron identifier (SS58-encoded public key). Unique on a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hotkey(pub String);

impl Hotkey {
    pub fn new(ss58: impl Into<String>) -> Self {
        Self(ss58.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Hotkey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Hotkey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Neuron index within a subnet for the current epoch, as assigned by the
/// substrate chain. UID 0 is the designated burn UID (spec.md §3).
pub type Uid = u16;

pub const BURN_UID: Uid = 0;

/// Subnet identifier. 0 is the "no-alpha" reserve; 106 is this validator's
/// own subnet (second reserve); any other value is a market-priced subnet.
pub type SubnetId = u16;

pub const NO_ALPHA_SUBNET: SubnetId = 0;
pub const OWN_SUBNET: SubnetId = 106;
