//! Invite code generation
//!
//! Invite codes are 8 characters drawn uniformly from `A-Z0-9` using the
//! operating system CSPRNG. Uniqueness is not checked here: the store's
//! unique constraint is the arbiter and the Organization Registry retries on
//! collision.
//!
//! ```
//! use taskhive_shared::invite_code::{generate_invite_code, is_well_formed, INVITE_CODE_LENGTH};
//!
//! let code = generate_invite_code();
//! assert_eq!(code.len(), INVITE_CODE_LENGTH);
//! assert!(is_well_formed(&code));
//! ```

use rand::{rngs::OsRng, Rng};

/// Characters an invite code may contain
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Fixed length of every invite code
pub const INVITE_CODE_LENGTH: usize = 8;

/// Draws a fresh invite code
pub fn generate_invite_code() -> String {
    let mut rng = OsRng;
    (0..INVITE_CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Returns true if `code` has the invite code shape
pub fn is_well_formed(code: &str) -> bool {
    code.len() == INVITE_CODE_LENGTH && code.bytes().all(|b| ALPHABET.contains(&b))
}

/// Normalizes user-supplied invite codes (trim, uppercase)
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Source of candidate invite codes
///
/// Production uses [`RandomInviteCodes`]; tests substitute deterministic
/// sequences to force collisions.
pub trait InviteCodeSource: Send + Sync {
    /// Produces the next candidate code
    fn next_code(&self) -> String;
}

/// Uniform random invite codes from the OS RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomInviteCodes;

impl InviteCodeSource for RandomInviteCodes {
    fn next_code(&self) -> String {
        generate_invite_code()
    }
}
