use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const SUFFIX_LEN: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Human-presentable booking code: `<PREFIX><YYYYMMDD>-<6 alphanumeric>`,
/// always uppercase. The reference is the lookup capability for guest
/// bookings, so it is normalized identically at creation and lookup time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingReference(String);

impl BookingReference {
    pub fn generate(prefix: &str, on: NaiveDate, rng: &mut impl Rng) -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..SUFFIX_ALPHABET.len());
                SUFFIX_ALPHABET[idx] as char
            })
            .collect();

        Self(format!(
            "{}{}-{}",
            prefix.to_uppercase(),
            on.format("%Y%m%d"),
            suffix
        ))
    }

    /// Uppercase and trim a caller-supplied code so lookup is
    /// case-insensitive.
    pub fn normalize(code: &str) -> Self {
        Self(code.trim().to_uppercase())
    }

    /// Structural check: `<prefix><8 digits>-<6 alphanumeric>`, uppercase.
    pub fn is_well_formed(&self, prefix: &str) -> bool {
        let prefix = prefix.to_uppercase();
        let Some(rest) = self.0.strip_prefix(&prefix) else {
            return false;
        };

        let mut parts = rest.splitn(2, '-');
        let date = parts.next().unwrap_or("");
        let suffix = parts.next().unwrap_or("");

        date.len() == 8
            && date.chars().all(|c| c.is_ascii_digit())
            && suffix.len() == SUFFIX_LEN
            && suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
