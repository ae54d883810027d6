//! Generated identifiers and credentials.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;

const UID_LENGTH: usize = 11;
const PASSWORD_LENGTH: usize = 12;

const ALPHABETIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const ALPHANUMERIC: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+~`|}{[]:;?><,./-=";

fn pick(rng: &mut OsRng, set: &[u8]) -> char {
    set[rng.gen_range(0..set.len())] as char
}

/// Generate a platform UID: 11 characters, first alphabetic, rest
/// alphanumeric.
pub fn generate_uid() -> String {
    let mut rng = OsRng;
    let mut uid = String::with_capacity(UID_LENGTH);
    uid.push(pick(&mut rng, ALPHABETIC));
    for _ in 1..UID_LENGTH {
        uid.push(pick(&mut rng, ALPHANUMERIC));
    }
    uid
}

/// Generate a password guaranteed to contain an uppercase letter, a
/// lowercase letter, a digit and a symbol, shuffled so the guaranteed
/// characters hold no fixed positions.
pub fn generate_password() -> String {
    let mut rng = OsRng;
    let mut chars: Vec<char> = vec![
        pick(&mut rng, UPPERCASE),
        pick(&mut rng, LOWERCASE),
        pick(&mut rng, DIGITS),
        pick(&mut rng, SYMBOLS),
    ];
    let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS].concat();
    for _ in chars.len()..PASSWORD_LENGTH {
        chars.push(pick(&mut rng, &all));
    }
    chars.shuffle(&mut rng);
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_shape() {
        for _ in 0..50 {
            let uid = generate_uid();
            assert_eq!(uid.len(), 11);
            assert!(uid.chars().next().unwrap().is_ascii_alphabetic());
            assert!(uid.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_password_character_classes() {
        for _ in 0..50 {
            let password = generate_password();
            assert_eq!(password.len(), 12);
            assert!(password.chars().any(|c| c.is_ascii_uppercase()));
            assert!(password.chars().any(|c| c.is_ascii_lowercase()));
            assert!(password.chars().any(|c| c.is_ascii_digit()));
            assert!(password.chars().any(|c| !c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_uids_differ() {
        assert_ne!(generate_uid(), generate_uid());
    }
}
