//! Font decoding: character codes to text and glyph widths

use super::cmap::{code_value, ToUnicodeCMap};
use crate::parser::{dict_get, object_to_f64, resolve, resolve_dict};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

const DEFAULT_SIMPLE_WIDTH: f64 = 500.0;
const DEFAULT_COMPOSITE_WIDTH: f64 = 1000.0;
const DEFAULT_ASCENT: f64 = 0.8;
const DEFAULT_DESCENT: f64 = -0.2;

/// WinAnsiEncoding differs from Latin-1 only in 0x80..=0x9F
const WIN_ANSI_HIGH: [char; 32] = [
    '€', '\u{FFFD}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{FFFD}', 'Ž',
    '\u{FFFD}', '\u{FFFD}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
    '\u{FFFD}', 'ž', 'Ÿ',
];

/// One decoded character code
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Advance width in glyph space (thousandths of an em)
    pub width: f64,
    /// Single-byte code 32, which receives word spacing
    pub is_word_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    Simple {
        first_char: u32,
        widths: Vec<f64>,
        missing: f64,
    },
    Composite {
        default: f64,
        map: HashMap<u32, f64>,
    },
}

/// Decoding information for one font resource
#[derive(Debug, Clone)]
pub struct FontInfo {
    /// BaseFont without the subset tag
    pub name: String,
    composite: bool,
    to_unicode: Option<ToUnicodeCMap>,
    differences: HashMap<u32, String>,
    widths: Widths,
    /// Ascent as a fraction of the font size
    pub ascent: f64,
    /// Descent as a fraction of the font size (negative)
    pub descent: f64,
}

impl FontInfo {
    /// Fallback for text shown with a font that cannot be resolved
    pub fn fallback(name: &str) -> Self {
        Self {
            name: name.to_string(),
            composite: false,
            to_unicode: None,
            differences: HashMap::new(),
            widths: Widths::Simple {
                first_char: 0,
                widths: Vec::new(),
                missing: DEFAULT_SIMPLE_WIDTH,
            },
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
        }
    }

    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let base_font = dict_get(doc, dict, b"BaseFont")
            .and_then(|o| o.as_name().ok())
            .map(|n| strip_subset_tag(&String::from_utf8_lossy(n)))
            .unwrap_or_else(|| "Unknown".to_string());

        let composite = matches!(
            dict_get(doc, dict, b"Subtype").and_then(|o| o.as_name().ok()),
            Some(b"Type0")
        );

        let to_unicode = dict_get(doc, dict, b"ToUnicode").and_then(|obj| match obj {
            Object::Stream(stream) => {
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                let cmap = ToUnicodeCMap::parse(&data);
                (!cmap.is_empty()).then_some(cmap)
            }
            _ => None,
        });

        let descendant = if composite {
            dict_get(doc, dict, b"DescendantFonts")
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve_dict(doc, o))
        } else {
            None
        };

        let widths = match descendant {
            Some(cid_font) => composite_widths(doc, cid_font),
            None if composite => Widths::Composite {
                default: DEFAULT_COMPOSITE_WIDTH,
                map: HashMap::new(),
            },
            None => simple_widths(doc, dict),
        };

        let descriptor = descendant
            .unwrap_or(dict)
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve_dict(doc, o));
        let (ascent, descent) = descriptor
            .map(|d| font_metrics(doc, d))
            .unwrap_or((DEFAULT_ASCENT, DEFAULT_DESCENT));

        let differences = if composite {
            HashMap::new()
        } else {
            encoding_differences(doc, dict)
        };

        Self {
            name: base_font,
            composite,
            to_unicode,
            differences,
            widths,
            ascent,
            descent,
        }
    }

    /// Split a string operand into glyphs
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let mut glyphs = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            let rest = &bytes[i..];
            let len = self
                .to_unicode
                .as_ref()
                .and_then(|cmap| cmap.code_length(rest))
                .unwrap_or(if self.composite { 2 } else { 1 })
                .clamp(1, rest.len());
            let code_bytes = &rest[..len];
            let code = code_value(code_bytes);

            glyphs.push(Glyph {
                text: self.code_text(code, code_bytes),
                width: self.width(code),
                is_word_space: len == 1 && code == 32,
            });
            i += len;
        }

        glyphs
    }

    fn code_text(&self, code: u32, code_bytes: &[u8]) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|c| c.lookup(code)) {
            return text.to_string();
        }
        if let Some(text) = self.differences.get(&code) {
            return text.clone();
        }
        if self.composite {
            // Identity-encoded fonts without ToUnicode: best effort UCS-2
            return match code_bytes {
                [hi, lo] => char::from_u32(u32::from(u16::from_be_bytes([*hi, *lo])))
                    .map(String::from)
                    .unwrap_or_default(),
                _ => String::new(),
            };
        }
        win_ansi_char(code as u8).to_string()
    }

    fn width(&self, code: u32) -> f64 {
        match &self.widths {
            Widths::Simple {
                first_char,
                widths,
                missing,
            } => code
                .checked_sub(*first_char)
                .and_then(|idx| widths.get(idx as usize))
                .copied()
                .unwrap_or(*missing),
            Widths::Composite { default, map } => map.get(&code).copied().unwrap_or(*default),
        }
    }
}

/// "ABCDEF+SimSun" -> "SimSun"
fn strip_subset_tag(name: &str) -> String {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => {
            rest.to_string()
        }
        _ => name.to_string(),
    }
}

fn win_ansi_char(byte: u8) -> char {
    match byte {
        0x80..=0x9F => WIN_ANSI_HIGH[(byte - 0x80) as usize],
        _ => char::from(byte),
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary) -> Widths {
    let first_char = dict_get(doc, dict, b"FirstChar")
        .and_then(object_to_f64)
        .unwrap_or(0.0)
        .max(0.0) as u32;
    let widths = dict_get(doc, dict, b"Widths")
        .and_then(|o| o.as_array().ok())
        .map(|arr| {
            arr.iter()
                .map(|w| {
                    resolve(doc, w)
                        .and_then(object_to_f64)
                        .unwrap_or(DEFAULT_SIMPLE_WIDTH)
                })
                .collect()
        })
        .unwrap_or_default();
    let missing = dict
        .get(b"FontDescriptor")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
        .and_then(|d| dict_get(doc, d, b"MissingWidth"))
        .and_then(object_to_f64)
        .unwrap_or(DEFAULT_SIMPLE_WIDTH);

    Widths::Simple {
        first_char,
        widths,
        missing,
    }
}

/// Parse the CIDFont `/W` array: `c [w1 w2 ...]` and `c_first c_last w` forms
fn composite_widths(doc: &Document, cid_font: &Dictionary) -> Widths {
    let default = dict_get(doc, cid_font, b"DW")
        .and_then(object_to_f64)
        .unwrap_or(DEFAULT_COMPOSITE_WIDTH);
    let mut map = HashMap::new();

    if let Some(items) = dict_get(doc, cid_font, b"W").and_then(|o| o.as_array().ok()) {
        let items: Vec<&Object> = items.iter().filter_map(|o| resolve(doc, o)).collect();
        let mut i = 0;
        while i < items.len() {
            let Some(first) = object_to_f64(items[i]) else {
                break;
            };
            let first = first.max(0.0) as u32;
            match items.get(i + 1) {
                Some(Object::Array(list)) => {
                    for (offset, w) in list.iter().enumerate() {
                        if let Some(w) = resolve(doc, w).and_then(object_to_f64) {
                            map.insert(first + offset as u32, w);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let last = object_to_f64(last).unwrap_or(first as f64).max(0.0) as u32;
                    let width = items.get(i + 2).and_then(|o| object_to_f64(o));
                    if let Some(width) = width {
                        for cid in first..=last.min(first.saturating_add(0xFFFF)) {
                            map.insert(cid, width);
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    Widths::Composite { default, map }
}

fn font_metrics(doc: &Document, descriptor: &Dictionary) -> (f64, f64) {
    let ascent = dict_get(doc, descriptor, b"Ascent")
        .and_then(object_to_f64)
        .filter(|a| *a > 0.0)
        .map(|a| a / 1000.0)
        .unwrap_or(DEFAULT_ASCENT);
    let descent = dict_get(doc, descriptor, b"Descent")
        .and_then(object_to_f64)
        .filter(|d| *d < 0.0)
        .map(|d| d / 1000.0)
        .unwrap_or(DEFAULT_DESCENT);
    (ascent, descent)
}

/// Read `/Encoding << /Differences [...] >>` into code -> text
fn encoding_differences(doc: &Document, dict: &Dictionary) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let Some(encoding) = dict_get(doc, dict, b"Encoding").and_then(|o| resolve_dict(doc, o))
    else {
        return map;
    };
    let Some(diffs) = dict_get(doc, encoding, b"Differences").and_then(|o| o.as_array().ok())
    else {
        return map;
    };

    let mut code = 0u32;
    for item in diffs {
        match resolve(doc, item) {
            Some(Object::Integer(n)) => code = (*n).max(0) as u32,
            Some(Object::Name(name)) => {
                if let Some(text) = glyph_name_to_unicode(&String::from_utf8_lossy(name)) {
                    map.insert(code, text.to_string());
                }
                code += 1;
            }
            _ => {}
        }
    }
    map
}

/// Map common glyph names to text. Covers `uniXXXX`, single characters,
/// digits and the punctuation that shows up in contract documents.
pub fn glyph_name_to_unicode(name: &str) -> Option<std::borrow::Cow<'static, str>> {
    use std::borrow::Cow;

    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 {
            let units: Vec<u16> = hex
                .as_bytes()
                .chunks(4)
                .filter_map(|c| u16::from_str_radix(std::str::from_utf8(c).ok()?, 16).ok())
                .collect();
            if !units.is_empty() {
                return Some(Cow::Owned(String::from_utf16_lossy(&units)));
            }
        }
    }
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(Cow::Owned(c.to_string()));
        }
    }

    let mapped = match name {
        "space" => " ",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "period" => ".",
        "comma" => ",",
        "colon" => ":",
        "semicolon" => ";",
        "hyphen" | "minus" => "-",
        "underscore" => "_",
        "parenleft" => "(",
        "parenright" => ")",
        "slash" => "/",
        "quotesingle" => "'",
        "quotedbl" => "\"",
        "quoteleft" => "‘",
        "quoteright" => "’",
        "quotedblleft" => "“",
        "quotedblright" => "”",
        "endash" => "–",
        "emdash" => "—",
        "percent" => "%",
        "ampersand" => "&",
        "at" => "@",
        "numbersign" => "#",
        "dollar" => "$",
        "yen" => "¥",
        "bullet" => "•",
        "fi" => "fi",
        "fl" => "fl",
        _ => return None,
    };
    Some(Cow::Borrowed(mapped))
}
