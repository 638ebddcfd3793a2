/// Random token and code generation, and destination masking
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Bytes of entropy in challenge and refresh tokens
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// Largest multiple of 10 that fits in a byte; bytes at or above it are rejected
const DIGIT_SAMPLE_LIMIT: u8 = 250;

/// Placeholder returned when an address is too short to partially reveal
pub const MASK_PLACEHOLDER: &str = "***";

/// 256-bit CSPRNG token, URL-safe base64 without padding
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Numeric one-time code of `length` digits, each uniform over 0-9
pub fn generate_numeric_code(length: usize) -> String {
    let mut code = String::with_capacity(length);
    let mut buf = [0u8; 16];

    while code.len() < length {
        OsRng.fill_bytes(&mut buf);
        for &b in buf.iter() {
            if b < DIGIT_SAMPLE_LIMIT {
                code.push(char::from(b'0' + b % 10));
                if code.len() == length {
                    break;
                }
            }
        }
    }

    code
}

/// Mask an email address for display, e.g. `john.doe@x.io` -> `jo******@x.io`
///
/// At most two leading characters of the local part are kept, and always at
/// least one is hidden. Local parts of one character (or no `@` at all) give
/// the fixed placeholder.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return MASK_PLACEHOLDER.to_string();
    };

    let len = local.chars().count();
    if len <= 1 {
        return MASK_PLACEHOLDER.to_string();
    }

    let reveal = 2.min(len - 1);
    let mut masked: String = local.chars().take(reveal).collect();
    masked.extend(std::iter::repeat('*').take(len - reveal));
    masked.push('@');
    masked.push_str(domain);
    masked
}
