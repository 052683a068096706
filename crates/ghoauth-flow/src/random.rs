//! Unpredictable opaque strings for the anti-forgery `state` parameter.

use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{AuthError, Result};

/// Characters a state token is drawn from.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of the alphabet size that fits in a byte. Bytes at or
/// above it are discarded so every character is equally likely.
const REJECTION_BOUND: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Length of the state token used by the web flow.
pub const STATE_LEN: usize = 20;

/// Generate a random alphanumeric string of exactly `len` characters.
///
/// Draws from the operating system CSPRNG via `ring`, so successive calls
/// are independent of each other and of the wall clock.
///
/// # Errors
///
/// Returns [`AuthError::Random`] if the system CSPRNG fails.
pub fn random_string(len: usize) -> Result<String> {
    let rng = SystemRandom::new();
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 64];

    while out.len() < len {
        rng.fill(&mut buf).map_err(|_| AuthError::Random)?;
        for &b in buf.iter().filter(|&&b| b < REJECTION_BOUND) {
            if out.len() == len {
                break;
            }
            out.push(ALPHABET[usize::from(b) % ALPHABET.len()] as char);
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn random_string_has_requested_length() {
        for len in [0, 1, 20, 63, 64, 65, 500] {
            assert_eq!(random_string(len).unwrap().len(), len);
        }
    }

    #[test]
    fn random_string_is_alphanumeric() {
        let s = random_string(200).unwrap();
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()), "{s}");
    }

    #[test]
    fn random_strings_do_not_collide() {
        let samples: HashSet<String> = (0..2000)
            .map(|_| random_string(STATE_LEN).unwrap())
            .collect();
        assert_eq!(samples.len(), 2000);
    }

    #[test]
    fn random_string_uses_whole_alphabet() {
        let s = random_string(10_000).unwrap();
        let distinct: HashSet<char> = s.chars().collect();
        assert_eq!(distinct.len(), ALPHABET.len());
    }

    #[test]
    fn rejection_bound_is_multiple_of_alphabet() {
        assert_eq!(usize::from(REJECTION_BOUND) % ALPHABET.len(), 0);
        assert!(usize::from(REJECTION_BOUND) + ALPHABET.len() > 255);
    }
}
