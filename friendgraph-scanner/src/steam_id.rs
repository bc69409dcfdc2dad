use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimal digits in a 64-bit Steam community id.
pub const STEAM_ID_LENGTH: usize = 17;

/// Returns true iff `input` is exactly 17 ASCII decimal digits.
pub fn is_valid_format(input: &str) -> bool {
    input.len() == STEAM_ID_LENGTH && input.bytes().all(|b| b.is_ascii_digit())
}

/// A syntactically valid Steam community id.
///
/// Kept as the original digit string so ids round-trip through storage and
/// JSON exactly as the upstream API issued them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SteamId(String);

impl SteamId {
    /// Accepts exactly 17 digits. Surrounding whitespace is rejected; callers
    /// reading ids from a terminal trim them first.
    pub fn parse(input: &str) -> Result<Self, ScanError> {
        if is_valid_format(input) {
            Ok(Self(input.to_string()))
        } else {
            Err(ScanError::InvalidSteamId(input.to_string()))
        }
    }

    /// Zero-padded to 17 digits; fails for values that do not fit.
    pub fn from_u64(value: u64) -> Result<Self, ScanError> {
        Self::parse(&format!("{:017}", value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SteamId {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SteamId {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SteamId> for String {
    fn from(id: SteamId) -> Self {
        id.0
    }
}

impl AsRef<str> for SteamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
