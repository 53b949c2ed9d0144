//! Card-key generation and local validation of generation forms.

use crate::admin::types::ConsoleError;
use rand::RngCore;
use std::collections::HashSet;

/// Characters a card key is drawn from
pub const CARD_KEY_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const MIN_CARD_KEY_LENGTH: usize = 8;
pub const MAX_CARD_KEY_LENGTH: usize = 16;
pub const DEFAULT_CARD_KEY_LENGTH: usize = 8;

/// Upper bound on card keys created in one batch
pub const MAX_CARD_KEY_COUNT: usize = 1_000;

pub const MAX_GRANT_DAYS: u32 = 365;
pub const MAX_GRANT_HOURS: u32 = 23;

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;

/// Validity granted to a new credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeGrant {
    pub days: u32,
    pub hours: u32,
}

impl TimeGrant {
    pub fn new(days: u32, hours: u32) -> Self {
        Self { days, hours }
    }

    pub fn seconds(&self) -> u64 {
        u64::from(self.days) * SECONDS_PER_DAY + u64::from(self.hours) * SECONDS_PER_HOUR
    }

    /// Range-check the grant and return it in seconds; zero is rejected
    pub fn validate(&self) -> Result<u64, ConsoleError> {
        if self.days > MAX_GRANT_DAYS {
            return Err(ConsoleError::Validation(format!(
                "Days must be between 0 and {}",
                MAX_GRANT_DAYS
            )));
        }
        if self.hours > MAX_GRANT_HOURS {
            return Err(ConsoleError::Validation(format!(
                "Hours must be between 0 and {}",
                MAX_GRANT_HOURS
            )));
        }

        match self.seconds() {
            0 => Err(ConsoleError::Validation(
                "Time grant must be greater than zero".to_string(),
            )),
            seconds => Ok(seconds),
        }
    }
}

/// Bulk card-key generation form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardKeyParams {
    pub length: usize,
    pub count: usize,
    pub grant: TimeGrant,
}

impl CardKeyParams {
    /// Validate the form; returns the grant in seconds
    pub fn validate(&self) -> Result<u64, ConsoleError> {
        if !(MIN_CARD_KEY_LENGTH..=MAX_CARD_KEY_LENGTH).contains(&self.length) {
            return Err(ConsoleError::Validation(format!(
                "Card key length must be between {} and {}",
                MIN_CARD_KEY_LENGTH, MAX_CARD_KEY_LENGTH
            )));
        }
        if self.count == 0 {
            return Err(ConsoleError::Validation(
                "At least one card key must be generated".to_string(),
            ));
        }
        if self.count > MAX_CARD_KEY_COUNT {
            return Err(ConsoleError::Validation(format!(
                "At most {} card keys can be generated at once",
                MAX_CARD_KEY_COUNT
            )));
        }
        self.grant.validate()
    }
}

/// One random card key over [`CARD_KEY_ALPHABET`].
///
/// Each character is a 32-bit word from the thread-local CSPRNG reduced
/// modulo 36; the resulting bias is on the order of 36 / 2^32.
pub fn generate_card_key(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let index = rng.next_u32() as usize % CARD_KEY_ALPHABET.len();
            char::from(CARD_KEY_ALPHABET[index])
        })
        .collect()
}

/// `count` distinct card keys of `length` characters, in generation order
pub fn generate_card_keys(count: usize, length: usize) -> Result<Vec<String>, ConsoleError> {
    let capacity = (CARD_KEY_ALPHABET.len() as u128).checked_pow(length as u32);
    let exhausts_alphabet = capacity.is_some_and(|capacity| (count as u128) > capacity);
    if count > MAX_CARD_KEY_COUNT || exhausts_alphabet {
        return Err(ConsoleError::Validation(format!(
            "Cannot generate {} distinct keys of length {}",
            count, length
        )));
    }

    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    while keys.len() < count {
        let key = generate_card_key(length);
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }
    Ok(keys)
}
