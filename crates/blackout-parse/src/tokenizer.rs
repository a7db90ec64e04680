//! Content stream tokenizer and serializer.
//!
//! [`tokenize`] turns raw content stream bytes into a flat list of
//! [`Operator`]s with their operands; [`serialize`] writes such a list back
//! out. The scrubber reads a page with the first, filters and rewrites the
//! operator list, and emits the replacement stream with the second.

use std::io::Write;

use crate::error::BackendError;

/// A content stream operand value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Integer(i64),
    Real(f64),
    /// Name object, stored without the leading `/`.
    Name(String),
    /// Literal string `( ... )`, stored as unescaped bytes.
    LiteralString(Vec<u8>),
    /// Hex string `< ... >`, stored as decoded bytes.
    HexString(Vec<u8>),
    Array(Vec<Operand>),
    Boolean(bool),
    Null,
    /// Dictionary `<< /Key value ... >>` in source order.
    Dictionary(Vec<(String, Operand)>),
}

impl Operand {
    /// Numeric value of an integer or real operand.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Integer(i) => Some(*i as f64),
            Operand::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Bytes of either string form.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Operand::LiteralString(b) | Operand::HexString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }

    /// A number operand, written as an integer when it has no fraction.
    pub fn number(value: f64) -> Operand {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Operand::Integer(value as i64)
        } else {
            Operand::Real(value)
        }
    }
}

/// Inline image captured from a `BI ... ID ... EI` sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// Entries between `BI` and `ID`.
    pub dict: Vec<(String, Operand)>,
    /// Raw bytes between `ID` and `EI`.
    pub data: Vec<u8>,
}

impl InlineImage {
    /// Look up a dictionary entry by its full or abbreviated key.
    pub fn get(&self, full: &str, abbreviated: &str) -> Option<&Operand> {
        self.dict
            .iter()
            .find(|(k, _)| k == full || k == abbreviated)
            .map(|(_, v)| v)
    }
}

/// A content stream operator with the operands that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub name: String,
    pub operands: Vec<Operand>,
    /// Set only for the `BI` pseudo-operator.
    pub inline_image: Option<Box<InlineImage>>,
}

impl Operator {
    pub fn new(name: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self {
            name: name.into(),
            operands,
            inline_image: None,
        }
    }

    /// Operand `i` as a number, or `0.0` when absent or not numeric.
    pub fn number(&self, i: usize) -> f64 {
        self.operands.get(i).and_then(Operand::as_f64).unwrap_or(0.0)
    }
}

/// Parse content stream bytes into a sequence of operators.
///
/// Comments are stripped. Unknown bytes at the top level are skipped.
///
/// # Errors
///
/// Returns [`BackendError::Content`] for unterminated strings, arrays,
/// dictionaries, and inline images.
pub fn tokenize(input: &[u8]) -> Result<Vec<Operator>, BackendError> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut ops = Vec::new();
    let mut stack: Vec<Operand> = Vec::new();

    loop {
        lexer.skip_whitespace_and_comments();
        let Some(b) = lexer.peek() else { break };

        match b {
            b'(' | b'<' | b'[' | b'/' | b'0'..=b'9' | b'+' | b'-' | b'.' => {
                stack.push(lexer.value()?);
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'*' | b'\'' | b'"' => {
                let keyword = lexer.keyword();
                match keyword.as_str() {
                    "true" => stack.push(Operand::Boolean(true)),
                    "false" => stack.push(Operand::Boolean(false)),
                    "null" => stack.push(Operand::Null),
                    "BI" => {
                        let image = lexer.inline_image()?;
                        stack.clear();
                        ops.push(Operator {
                            name: keyword,
                            operands: Vec::new(),
                            inline_image: Some(Box::new(image)),
                        });
                    }
                    _ => ops.push(Operator::new(keyword, std::mem::take(&mut stack))),
                }
            }
            b']' => {
                return Err(BackendError::Content("unexpected ']' outside array".into()));
            }
            _ => lexer.pos += 1,
        }
    }

    Ok(ops)
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while self.peek().is_some_and(|c| c != b'\n' && c != b'\r') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Parse one operand value starting at the current byte.
    fn value(&mut self) -> Result<Operand, BackendError> {
        let b = self
            .peek()
            .ok_or_else(|| BackendError::Content("unexpected end of stream".into()))?;
        match b {
            b'(' => Ok(Operand::LiteralString(self.literal_string()?)),
            b'<' if self.peek_at(1) == Some(b'<') => Ok(Operand::Dictionary(self.dictionary()?)),
            b'<' => Ok(Operand::HexString(self.hex_string()?)),
            b'[' => {
                self.pos += 1;
                Ok(Operand::Array(self.array()?))
            }
            b'/' => Ok(Operand::Name(self.name())),
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' => {
                let kw = self.keyword();
                Ok(match kw.as_str() {
                    "true" => Operand::Boolean(true),
                    "false" => Operand::Boolean(false),
                    "null" => Operand::Null,
                    _ => Operand::Name(kw),
                })
            }
            _ => Err(BackendError::Content(format!(
                "unexpected byte 0x{b:02X} at offset {}",
                self.pos
            ))),
        }
    }

    fn literal_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1u32;

        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => {
                    let Some(esc) = self.peek() else { break };
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut val = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        val = val * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((val & 0xFF) as u8);
                        }
                        other => out.push(other),
                    }
                }
                _ => out.push(b),
            }
        }

        Err(BackendError::Content("unterminated literal string".into()))
    }

    fn hex_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut digits = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(BackendError::Content("unterminated hex string".into()));
            };
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            let v = hex_value(b).ok_or_else(|| {
                BackendError::Content(format!("invalid hex digit {:?}", b as char))
            })?;
            digits.push(v);
        }
        if digits.len() % 2 == 1 {
            digits.push(0);
        }
        Ok(digits.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
    }

    /// Parse array elements up to `]`. The `[` is already consumed.
    fn array(&mut self) -> Result<Vec<Operand>, BackendError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(BackendError::Content("unterminated array".into())),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.value()?),
            }
        }
    }

    fn dictionary(&mut self) -> Result<Vec<(String, Operand)>, BackendError> {
        self.pos += 2;
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match (self.peek(), self.peek_at(1)) {
                (None, _) => return Err(BackendError::Content("unterminated dictionary".into())),
                (Some(b'>'), Some(b'>')) => {
                    self.pos += 2;
                    return Ok(entries);
                }
                (Some(b'/'), _) => {
                    let key = self.name();
                    self.skip_whitespace_and_comments();
                    entries.push((key, self.value()?));
                }
                _ => {
                    return Err(BackendError::Content(
                        "expected name key in dictionary".into(),
                    ));
                }
            }
        }
    }

    fn name(&mut self) -> String {
        self.pos += 1;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !is_whitespace(b) && !is_delimiter(b))
        {
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        let mut name = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    name.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            name.push(raw[i]);
            i += 1;
        }
        String::from_utf8_lossy(&name).into_owned()
    }

    fn number(&mut self) -> Result<Operand, BackendError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut seen_dot = false;
        while let Some(b) = self.peek() {
            if b == b'.' && !seen_dot {
                seen_dot = true;
            } else if !b.is_ascii_digit() {
                break;
            }
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| BackendError::Content("invalid number token".into()))?;

        // Lone signs or dots occur in damaged streams; read them as zero.
        if matches!(text, "+" | "-" | "." | "+." | "-.") {
            return Ok(Operand::Integer(0));
        }
        if seen_dot {
            text.parse::<f64>()
                .map(Operand::Real)
                .map_err(|_| BackendError::Content(format!("invalid real number: {text}")))
        } else {
            match text.parse::<i64>() {
                Ok(v) => Ok(Operand::Integer(v)),
                Err(_) => text
                    .parse::<f64>()
                    .map(Operand::Real)
                    .map_err(|_| BackendError::Content(format!("invalid integer: {text}"))),
            }
        }
    }

    /// Keyword: a letter (or `*`, `'`, `"`) followed by regular characters.
    fn keyword(&mut self) -> String {
        let start = self.pos;
        self.pos += 1;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'*' || b == b'\'' || b == b'"')
        {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Parse `<entries> ID <data> EI`. `BI` is already consumed.
    fn inline_image(&mut self) -> Result<InlineImage, BackendError> {
        let mut dict = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => {
                    return Err(BackendError::Content(
                        "unterminated inline image (missing ID)".into(),
                    ));
                }
                Some(b'I')
                    if self.peek_at(1) == Some(b'D')
                        && self.peek_at(2).is_none_or(is_whitespace) =>
                {
                    self.pos += 2;
                    if self.peek().is_some_and(is_whitespace) {
                        self.pos += 1;
                    }
                    break;
                }
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace_and_comments();
                    dict.push((key, self.value()?));
                }
                Some(_) => {
                    return Err(BackendError::Content(
                        "expected name key in inline image dictionary".into(),
                    ));
                }
            }
        }

        let data_start = self.pos;
        let input = self.input;
        while self.pos < input.len() {
            let p = self.pos;
            let preceded = p == data_start || is_whitespace(input[p - 1]);
            let followed = input
                .get(p + 2)
                .is_none_or(|&b| is_whitespace(b) || is_delimiter(b));
            if preceded && input[p] == b'E' && input.get(p + 1) == Some(&b'I') && followed {
                let mut end = p;
                if end > data_start && is_whitespace(input[end - 1]) {
                    end -= 1;
                }
                self.pos = p + 2;
                return Ok(InlineImage {
                    dict,
                    data: input[data_start..end].to_vec(),
                });
            }
            self.pos += 1;
        }

        Err(BackendError::Content(
            "unterminated inline image (missing EI)".into(),
        ))
    }
}

/// Write operators back out as content stream bytes.
pub fn serialize(ops: &[Operator]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        if let Some(image) = &op.inline_image {
            out.extend_from_slice(b"BI");
            for (key, value) in &image.dict {
                out.push(b' ');
                write_name(&mut out, key);
                out.push(b' ');
                write_operand(&mut out, value);
            }
            out.extend_from_slice(b" ID ");
            out.extend_from_slice(&image.data);
            out.extend_from_slice(b"\nEI\n");
            continue;
        }
        for operand in &op.operands {
            write_operand(&mut out, operand);
            out.push(b' ');
        }
        out.extend_from_slice(op.name.as_bytes());
        out.push(b'\n');
    }
    out
}

fn write_operand(out: &mut Vec<u8>, operand: &Operand) {
    match operand {
        Operand::Integer(i) => {
            let _ = write!(out, "{i}");
        }
        Operand::Real(r) => write_real(out, *r),
        Operand::Name(n) => write_name(out, n),
        Operand::LiteralString(bytes) => write_literal(out, bytes),
        Operand::HexString(bytes) => {
            out.push(b'<');
            for b in bytes {
                let _ = write!(out, "{b:02X}");
            }
            out.push(b'>');
        }
        Operand::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_operand(out, item);
            }
            out.push(b']');
        }
        Operand::Boolean(v) => out.extend_from_slice(if *v { b"true" } else { b"false" }),
        Operand::Null => out.extend_from_slice(b"null"),
        Operand::Dictionary(entries) => {
            out.extend_from_slice(b"<<");
            for (key, value) in entries {
                write_name(out, key);
                out.push(b' ');
                write_operand(out, value);
                out.push(b' ');
            }
            out.extend_from_slice(b">>");
        }
    }
}

fn write_real(out: &mut Vec<u8>, value: f64) {
    if !value.is_finite() {
        out.push(b'0');
        return;
    }
    let text = format!("{value:.6}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => out.push(b'0'),
        t => out.extend_from_slice(t.as_bytes()),
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for &b in name.as_bytes() {
        if b.is_ascii_graphic() && b != b'#' && !is_delimiter(b) {
            out.push(b);
        } else {
            let _ = write!(out, "#{b:02X}");
        }
    }
}

fn write_literal(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out.push(b')');
}
