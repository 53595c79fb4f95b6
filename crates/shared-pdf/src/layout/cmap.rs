//! ToUnicode CMap parsing
//!
//! Only the parts needed to turn character codes into text are read:
//! `codespacerange`, `bfchar` and both forms of `bfrange`.

use std::collections::HashMap;

/// Ranges wider than this are truncated; real fonts never need more
const MAX_RANGE_SPAN: u32 = 0xFFFF;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Name(String),
    ArrayStart,
    ArrayEnd,
    Keyword(String),
}

/// A code space entry: byte length plus inclusive code bounds
#[derive(Debug, Clone, Copy, PartialEq)]
struct CodeSpace {
    len: usize,
    low: u32,
    high: u32,
}

/// Character code to Unicode mapping
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeCMap {
    code_spaces: Vec<CodeSpace>,
    map: HashMap<u32, String>,
}

impl ToUnicodeCMap {
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = ToUnicodeCMap::default();
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                Token::Keyword(k) if k == "begincodespacerange" => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.code_spaces.push(CodeSpace {
                            len: lo.len().max(1),
                            low: code_value(lo),
                            high: code_value(hi),
                        });
                        i += 2;
                    }
                }
                Token::Keyword(k) if k == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(dst)) = (tokens.get(i), tokens.get(i + 1))
                    {
                        if let Some(text) = destination_text(dst) {
                            cmap.map.insert(code_value(src), text);
                        }
                        i += 2;
                    }
                }
                Token::Keyword(k) if k == "beginbfrange" => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        let low = code_value(lo);
                        let high = code_value(hi).min(low.saturating_add(MAX_RANGE_SPAN));
                        i += 2;
                        match tokens.get(i) {
                            Some(Token::Hex(dst)) => {
                                cmap.insert_incrementing(low, high, dst);
                                i += 1;
                            }
                            Some(Token::ArrayStart) => {
                                i += 1;
                                let mut code = low;
                                while let Some(Token::Hex(dst)) = tokens.get(i) {
                                    if code <= high {
                                        cmap.map.insert(code, decode_utf16be(dst));
                                    }
                                    code = code.saturating_add(1);
                                    i += 1;
                                }
                                if let Some(Token::ArrayEnd) = tokens.get(i) {
                                    i += 1;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }

        cmap
    }

    /// `bfrange` with a single destination: the last UTF-16 unit increments per code
    fn insert_incrementing(&mut self, low: u32, high: u32, dst: &[u8]) {
        let mut units: Vec<u16> = dst
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], *c.get(1).unwrap_or(&0)]))
            .collect();
        if units.is_empty() {
            return;
        }
        for code in low..=high {
            self.map.insert(code, String::from_utf16_lossy(&units));
            if let Some(last) = units.last_mut() {
                *last = last.wrapping_add(1);
            }
        }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Byte length of the next code at the start of `bytes`, from the code space ranges
    pub fn code_length(&self, bytes: &[u8]) -> Option<usize> {
        if self.code_spaces.is_empty() {
            return None;
        }
        let mut lengths: Vec<usize> = self.code_spaces.iter().map(|cs| cs.len).collect();
        lengths.sort_unstable();
        lengths.dedup();

        for len in &lengths {
            if bytes.len() < *len {
                continue;
            }
            let code = code_value(&bytes[..*len]);
            let matches = self
                .code_spaces
                .iter()
                .any(|cs| cs.len == *len && code >= cs.low && code <= cs.high);
            if matches {
                return Some(*len);
            }
        }
        lengths.first().copied()
    }
}

/// Big-endian integer value of a code's bytes
pub fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn destination_text(token: &Token) -> Option<String> {
    match token {
        Token::Hex(bytes) => Some(decode_utf16be(bytes)),
        Token::Name(name) => super::font::glyph_name_to_unicode(name).map(String::from),
        _ => None,
    }
}

fn decode_utf16be(bytes: &[u8]) -> String {
    if bytes.len() == 1 {
        return char::from(bytes[0]).to_string();
    }
    let units: Vec<u16> = bytes
        .chunks(2)
        .filter(|c| c.len() == 2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                i += 1;
                let mut digits = Vec::new();
                while i < data.len() && data[i] != b'>' {
                    if data[i].is_ascii_hexdigit() {
                        digits.push(data[i]);
                    }
                    i += 1;
                }
                i += 1;
                if digits.len() % 2 == 1 {
                    digits.push(b'0');
                }
                let bytes = digits
                    .chunks(2)
                    .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
                    .collect();
                tokens.push(Token::Hex(bytes));
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'/' => {
                i += 1;
                let start = i;
                while i < data.len() && is_regular(data[i]) {
                    i += 1;
                }
                tokens.push(Token::Name(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
            b'(' => {
                // Literal strings only appear in CMap metadata; skip them
                let mut depth = 0;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
            }
            _ if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len() && is_regular(data[i]) {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(Token::Keyword(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }

    tokens
}

fn is_regular(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}
