//! `ToUnicode` CMap parsing.
//!
//! Korean work logs are almost always written with Type0 fonts whose glyph
//! codes mean nothing without the embedded CMap.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(String),
}

#[derive(Debug, Clone, Default)]
pub struct ToUnicode {
    code_len: usize,
    chars: HashMap<u32, String>,
    ranges: Vec<(u32, u32, Vec<u16>)>,
}

impl ToUnicode {
    pub fn parse(data: &[u8]) -> Self {
        let src = String::from_utf8_lossy(data);
        let tokens = tokenize(&src);
        let mut cmap = ToUnicode {
            code_len: 0,
            ..Default::default()
        };

        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == "begincodespacerange" => {
                    if let Some(Token::Hex(lo)) = tokens.get(i + 1) {
                        cmap.code_len = cmap.code_len.max(lo.len());
                    }
                    i += 1;
                }
                Token::Word(w) if w == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.chars.insert(be_code(src), utf16_be(dst));
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfrange" => {
                    i += 1;
                    i = cmap.parse_ranges(&tokens, i);
                }
                _ => i += 1,
            }
        }
        if cmap.code_len == 0 {
            cmap.code_len = 2;
        }
        cmap
    }

    fn parse_ranges(&mut self, tokens: &[Token], mut i: usize) -> usize {
        while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) = (tokens.get(i), tokens.get(i + 1)) {
            let (lo, hi) = (be_code(lo), be_code(hi));
            match tokens.get(i + 2) {
                Some(Token::Hex(dst)) => {
                    self.ranges.push((lo, hi, utf16_units(dst)));
                    i += 3;
                }
                Some(Token::Open) => {
                    let mut j = i + 3;
                    let mut code = lo;
                    while let Some(Token::Hex(dst)) = tokens.get(j) {
                        if code <= hi {
                            self.chars.insert(code, utf16_be(dst));
                        }
                        code += 1;
                        j += 1;
                    }
                    // skip the closing bracket
                    i = if matches!(tokens.get(j), Some(Token::Close)) { j + 1 } else { j };
                }
                _ => return i + 2,
            }
        }
        i
    }

    pub fn lookup(&self, code: u32) -> Option<String> {
        if let Some(s) = self.chars.get(&code) {
            return Some(s.clone());
        }
        self.ranges
            .iter()
            .find(|(lo, hi, _)| (*lo..=*hi).contains(&code))
            .map(|(lo, _, base)| {
                let mut units = base.clone();
                if let Some(last) = units.last_mut() {
                    *last = last.wrapping_add((code - lo) as u16);
                }
                decode_units(&units)
            })
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let width = self.code_len.clamp(1, 4);
        bytes
            .chunks(width)
            .filter_map(|chunk| self.lookup(be_code(chunk)))
            .collect()
    }
}

fn tokenize(src: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' => {
                if chars.peek() == Some(&'<') {
                    chars.next();
                    continue;
                }
                let mut hex = String::new();
                for h in chars.by_ref() {
                    if h == '>' {
                        break;
                    }
                    if h.is_ascii_hexdigit() {
                        hex.push(h);
                    }
                }
                tokens.push(Token::Hex(hex_bytes(&hex)));
            }
            '>' => {
                // dictionary close `>>`
                if chars.peek() == Some(&'>') {
                    chars.next();
                }
            }
            '[' => tokens.push(Token::Open),
            ']' => tokens.push(Token::Close),
            '%' => {
                for h in chars.by_ref() {
                    if h == '\n' || h == '\r' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {}
            c => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || matches!(n, '<' | '>' | '[' | ']' | '/' | '%') {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    tokens
}

fn hex_bytes(hex: &str) -> Vec<u8> {
    let mut padded = hex.to_string();
    if padded.len() % 2 == 1 {
        padded.push('0');
    }
    (0..padded.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&padded[i..i + 2], 16).ok())
        .collect()
}

fn be_code(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|c| if c.len() == 2 { u16::from_be_bytes([c[0], c[1]]) } else { u16::from(c[0]) })
        .collect()
}

fn decode_units(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

pub fn utf16_be(bytes: &[u8]) -> String {
    decode_units(&utf16_units(bytes))
}
