//! Shortcode to numeric media id conversion.
//!
//! A shortcode is the media id written in a URL-safe base64 alphabet, most
//! significant digit first. Private-share codes carry a 28-character suffix
//! that is not part of the id.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const PRIVATE_SUFFIX_LEN: usize = 28;

/// Decodes `shortcode` into the media id used by the mobile API.
///
/// Returns `None` for characters outside the alphabet or ids that overflow
/// 128 bits.
pub(crate) fn media_id_from_shortcode(shortcode: &str) -> Option<u128> {
    let bytes = shortcode.as_bytes();
    let code = if bytes.len() > PRIVATE_SUFFIX_LEN {
        &bytes[..bytes.len() - PRIVATE_SUFFIX_LEN]
    } else {
        bytes
    };
    if code.is_empty() {
        return None;
    }

    code.iter().try_fold(0u128, |id, byte| {
        let digit = ALPHABET.iter().position(|c| c == byte)?;
        id.checked_mul(64)?.checked_add(digit as u128)
    })
}

/// Inverse of [`media_id_from_shortcode`] for ids without a private suffix.
#[cfg(test)]
fn shortcode_from_media_id(mut id: u128) -> String {
    let mut out = Vec::new();
    while id > 0 {
        out.push(ALPHABET[(id % 64) as usize]);
        id /= 64;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}
