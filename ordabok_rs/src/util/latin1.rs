//! Conversion between the UTF-8 strings of the public API and the
//! single-byte (Latin-1 superset) encoding the image stores words in.
//!
//! The conversion is lossless for every code point below 256. Anything else
//! cannot occur in the database alphabet, so a word containing such a code
//! point simply has no match and [encode] reports that up front with [None].

/// Encodes a query string into image bytes. Returns [None] as soon as a code
/// point outside the single-byte range is seen.
pub(crate) fn encode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let cp = ch as u32;
        if cp > 0xFF {
            return None;
        }
        out.push(cp as u8);
    }
    Some(out)
}

/// Decodes image bytes into an owned string. Total: every byte is a valid
/// Latin-1 code point.
pub(crate) fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
