//! Character encoding resolution for CSS sources.
//!
//! Decoding priority, strongest first: explicit override, transport
//! (HTTP) charset, byte-order mark, `@charset` rule, referrer encoding,
//! UTF-8 default. A declared encoding that cannot decode the bytes is a
//! hard [`Error::UnicodeDecode`]; guessing would corrupt the rule tree.
//!
//! Encoding output escapes unencodable characters as CSS hex escapes
//! (`\E4 `), including inside comments, so a sheet re-labeled to a
//! narrower charset still serializes losslessly.

use memchr::memchr;

use crate::error::{Error, Result};

/// A resolved codec: normalized label plus the decode/encode backend.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Codec {
    pub name: String,
    kind: CodecKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodecKind {
    /// Strict 7-bit ASCII. encoding_rs folds the "ascii" label into
    /// windows-1252, which would silently accept 8-bit input.
    Ascii,
    /// Strict ISO-8859-1 (byte == code point), not the windows-1252
    /// superset the WHATWG label table maps it to.
    Latin1,
    /// UTF-16 with BOM sniffing on decode and an LE BOM on encode.
    Utf16,
    Rs(&'static encoding_rs::Encoding),
}

impl Codec {
    /// Looks up an encoding label. Returns `None` for unknown labels.
    pub fn for_label(label: &str) -> Option<Codec> {
        let name = label.trim().to_ascii_lowercase();
        let kind = match name.as_str() {
            "ascii" | "us-ascii" => CodecKind::Ascii,
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => CodecKind::Latin1,
            "utf-16" | "utf16" => CodecKind::Utf16,
            _ => CodecKind::Rs(encoding_rs::Encoding::for_label(name.as_bytes())?),
        };
        Some(Codec { name, kind })
    }

    pub fn utf8() -> Codec {
        Codec {
            name: "utf-8".to_string(),
            kind: CodecKind::Rs(encoding_rs::UTF_8),
        }
    }

    fn decode_error(&self) -> Error {
        Error::UnicodeDecode {
            encoding: self.name.clone(),
            message: "malformed byte sequence".to_string(),
        }
    }

    /// Strict decode; any malformed sequence is an error.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self.kind {
            CodecKind::Ascii => {
                if bytes.iter().any(|&b| b >= 0x80) {
                    return Err(self.decode_error());
                }
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
            CodecKind::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            CodecKind::Utf16 => {
                let (enc, data) = match bytes {
                    [0xff, 0xfe, rest @ ..] => (encoding_rs::UTF_16LE, rest),
                    [0xfe, 0xff, rest @ ..] => (encoding_rs::UTF_16BE, rest),
                    _ => (encoding_rs::UTF_16LE, bytes),
                };
                if data.len() % 2 != 0 {
                    return Err(self.decode_error());
                }
                enc.decode_without_bom_handling_and_without_replacement(data)
                    .map(|c| c.into_owned())
                    .ok_or_else(|| self.decode_error())
            }
            CodecKind::Rs(enc) => enc
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|c| c.into_owned())
                .ok_or_else(|| self.decode_error()),
        }
    }

    /// Encodes text, replacing unencodable characters with CSS hex
    /// escapes (`\20AC `).
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self.kind {
            CodecKind::Ascii => {
                let mut out = Vec::with_capacity(text.len());
                for c in text.chars() {
                    if (c as u32) < 0x80 {
                        out.push(c as u8);
                    } else {
                        out.extend_from_slice(escape_char(c).as_bytes());
                    }
                }
                out
            }
            CodecKind::Latin1 => {
                let mut out = Vec::with_capacity(text.len());
                for c in text.chars() {
                    if (c as u32) <= 0xff {
                        out.push(c as u8);
                    } else {
                        out.extend_from_slice(escape_char(c).as_bytes());
                    }
                }
                out
            }
            CodecKind::Utf16 => {
                let mut out = vec![0xff, 0xfe];
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
                out
            }
            CodecKind::Rs(enc) => {
                let mut out = Vec::with_capacity(text.len());
                let mut buf = [0u8; 4];
                for c in text.chars() {
                    let s = c.encode_utf8(&mut buf);
                    let (bytes, _, unmappable) = enc.encode(s);
                    if unmappable {
                        out.extend_from_slice(escape_char(c).as_bytes());
                    } else {
                        out.extend_from_slice(&bytes);
                    }
                }
                out
            }
        }
    }
}

/// CSS escape for an unencodable character: uppercase hex, trailing space.
fn escape_char(c: char) -> String {
    format!("\\{:X} ", c as u32)
}

/// Detects a byte-order mark. Returns the encoding label and how many
/// bytes to skip before decoding (UTF-16 BOMs are consumed by the UTF-16
/// codec itself).
pub(crate) fn detect_bom(bytes: &[u8]) -> Option<(&'static str, usize)> {
    match bytes {
        [0xef, 0xbb, 0xbf, ..] => Some(("utf-8", 3)),
        [0xff, 0xfe, ..] | [0xfe, 0xff, ..] => Some(("utf-16", 0)),
        _ => None,
    }
}

/// Extracts the encoding from a literal `@charset "NAME";` byte prefix.
pub(crate) fn charset_in_bytes(bytes: &[u8]) -> Option<String> {
    const PREFIX: &[u8] = b"@charset \"";
    let rest = bytes.strip_prefix(PREFIX)?;
    let end = memchr(b'"', rest)?;
    if rest.get(end + 1) != Some(&b';') {
        return None;
    }
    String::from_utf8(rest[..end].to_vec()).ok()
}

/// Extracts the encoding from a literal `@charset "NAME";` text prefix.
pub(crate) fn charset_in_text(text: &str) -> Option<String> {
    charset_in_bytes(text.as_bytes())
}

/// Decodes a CSS byte source. `override_enc` and `transport_enc` come
/// from the caller and the fetch transport; `referrer_enc` is the
/// explicit encoding of the referring sheet, if any. Returns the text
/// and the explicitly determined encoding label (`None` means the UTF-8
/// default applied and no `@charset` statement should be emitted).
pub(crate) fn decode_css_bytes(
    bytes: &[u8],
    override_enc: Option<&str>,
    transport_enc: Option<&str>,
    referrer_enc: Option<&str>,
) -> Result<(String, Option<String>)> {
    let bom = detect_bom(bytes);
    let (label, skip, explicit) = if let Some(enc) = override_enc {
        (enc.to_string(), bom_skip_for(bom, enc), true)
    } else if let Some(enc) = transport_enc {
        (enc.to_string(), bom_skip_for(bom, enc), true)
    } else if let Some((label, skip)) = bom {
        (label.to_string(), skip, true)
    } else if let Some(enc) = charset_in_bytes(bytes) {
        (enc, 0, true)
    } else if let Some(enc) = referrer_enc {
        (enc.to_string(), 0, true)
    } else {
        ("utf-8".to_string(), 0, false)
    };

    let codec = Codec::for_label(&label).ok_or_else(|| Error::UnicodeDecode {
        encoding: label.clone(),
        message: "unknown encoding".to_string(),
    })?;
    let text = codec.decode(&bytes[skip..])?;
    let explicit = explicit.then_some(codec.name);
    Ok((text, explicit))
}

fn bom_skip_for(bom: Option<(&'static str, usize)>, label: &str) -> usize {
    // only skip a BOM the chosen codec will not consume itself
    match bom {
        Some(("utf-8", n)) if label.eq_ignore_ascii_case("utf-8") => n,
        _ => 0,
    }
}

/// Resolves the effective encoding of an already-decoded text source.
pub(crate) fn resolve_text_encoding(
    text: &str,
    override_enc: Option<&str>,
    referrer_enc: Option<&str>,
) -> Result<Option<String>> {
    let label = if let Some(enc) = override_enc {
        Some(enc.to_string())
    } else if let Some(enc) = charset_in_text(text) {
        Some(enc)
    } else {
        referrer_enc.map(|e| e.to_string())
    };
    match label {
        None => Ok(None),
        Some(label) => {
            let codec = Codec::for_label(&label).ok_or_else(|| Error::UnicodeDecode {
                encoding: label.clone(),
                message: "unknown encoding".to_string(),
            })?;
            Ok(Some(codec.name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_lookup() {
        assert_eq!(Codec::for_label("UTF-8").unwrap().name, "utf-8");
        assert_eq!(Codec::for_label("ascii").unwrap().name, "ascii");
        assert!(Codec::for_label("no-such-encoding").is_none());
    }

    #[test]
    fn ascii_is_strict() {
        let c = Codec::for_label("ascii").unwrap();
        assert!(c.decode("/*\u{e4}*/".as_bytes()).is_err());
        assert_eq!(c.decode(b"/*a*/").unwrap(), "/*a*/");
    }

    #[test]
    fn latin1_round_trip() {
        let c = Codec::for_label("iso-8859-1").unwrap();
        assert_eq!(c.decode(&[0xe4]).unwrap(), "\u{e4}");
        assert_eq!(c.encode("\u{e4}"), vec![0xe4]);
        // the euro sign is outside latin-1 and gets escaped
        assert_eq!(c.encode("\u{20ac}"), b"\\20AC ".to_vec());
    }

    #[test]
    fn utf16_decode_needs_even_length() {
        let c = Codec::for_label("utf-16").unwrap();
        assert!(c.decode(b"a").is_err());
        let encoded = c.encode("/**/");
        assert_eq!(&encoded[..2], &[0xff, 0xfe]);
        assert_eq!(c.decode(&encoded).unwrap(), "/**/");
    }

    #[test]
    fn escaping_on_encode() {
        let c = Codec::for_label("ascii").unwrap();
        assert_eq!(c.encode("/*\u{e4}*/"), b"/*\\E4 */".to_vec());
    }

    #[test]
    fn charset_prefix_detection() {
        assert_eq!(
            charset_in_text("@charset \"iso-8859-1\";a{}").as_deref(),
            Some("iso-8859-1")
        );
        assert_eq!(charset_in_text("@charset 'x';"), None);
        assert_eq!(charset_in_text(" @charset \"x\";"), None);
    }

    #[test]
    fn priority_override_beats_charset_rule() {
        let bytes = "@charset \"utf-16\";/**/".as_bytes();
        let (text, enc) = decode_css_bytes(bytes, Some("ascii"), None, None).unwrap();
        assert_eq!(enc.as_deref(), Some("ascii"));
        assert!(text.starts_with("@charset"));
    }

    #[test]
    fn priority_charset_rule_then_default() {
        let bytes = b"@charset \"iso-8859-1\";/*\xe4*/";
        let (text, enc) = decode_css_bytes(bytes, None, None, None).unwrap();
        assert_eq!(enc.as_deref(), Some("iso-8859-1"));
        assert!(text.contains('\u{e4}'));

        let (_, enc) = decode_css_bytes(b"/*a*/", None, None, None).unwrap();
        assert_eq!(enc, None);
    }

    #[test]
    fn override_mismatch_is_an_error() {
        let utf16 = Codec::for_label("utf-16").unwrap().encode("/*\u{20ac}*/");
        assert!(decode_css_bytes(&utf16, Some("utf-8"), None, None).is_err());
    }
}
