//! Human-legible order and payment numbers.

use chrono::{DateTime, Utc};
use rand::Rng;

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 6;

pub const ORDER_PREFIX: &str = "RO";
pub const PAYMENT_PREFIX: &str = "PAY";

/// Builds `prefix + unix millis + 6 random upper-case alphanumerics`.
pub fn generate<R: Rng + ?Sized>(prefix: &str, now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{prefix}{}{suffix}", now.timestamp_millis())
}

pub fn order_no() -> String {
    generate(ORDER_PREFIX, Utc::now(), &mut rand::thread_rng())
}

pub fn payment_no() -> String {
    generate(PAYMENT_PREFIX, Utc::now(), &mut rand::thread_rng())
}
