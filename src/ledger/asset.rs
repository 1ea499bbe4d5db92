//! Numeric asset names and issuance descriptions.

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};

/// Smallest numeric asset id (26^12 + 1). Everything below collides with
/// the alphabetic namespace.
pub const NUMERIC_ASSET_MIN: u64 = 26u64.pow(12) + 1;

/// Largest numeric asset id (2^64 - 1).
pub const NUMERIC_ASSET_MAX: u64 = u64::MAX;

/// Maximum issuance description length, in bytes.
pub const MAX_DESCRIPTION_BYTES: usize = 52;

/// Generate a random numeric asset name from the OS CSPRNG.
pub fn generate_numeric_asset_name() -> String {
    generate_numeric_asset_name_with(&mut OsRng)
}

pub fn generate_numeric_asset_name_with<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    format!("A{}", rng.gen_range(NUMERIC_ASSET_MIN..=NUMERIC_ASSET_MAX))
}

/// Parse an `A<digits>` asset name, returning its id if it is in range.
pub fn parse_numeric_asset_name(name: &str) -> Option<u64> {
    let digits = name.strip_prefix('A')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id: u64 = digits.parse().ok()?;
    (id >= NUMERIC_ASSET_MIN).then_some(id)
}

/// Truncate `description` to [`MAX_DESCRIPTION_BYTES`] without splitting a
/// character.
pub fn truncate_description(description: &str) -> &str {
    if description.len() <= MAX_DESCRIPTION_BYTES {
        return description;
    }
    let mut end = MAX_DESCRIPTION_BYTES;
    while !description.is_char_boundary(end) {
        end -= 1;
    }
    &description[..end]
}
