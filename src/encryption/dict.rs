//! Raw encryption-dictionary probe.
//!
//! Security parameters have to be read from the file bytes before anything
//! else can parse them. This module scans the raw bytes for the trailer's
//! `/Encrypt` entry (inline dictionary or indirect reference), parses the
//! dictionary with a small self-contained object parser, and extracts the
//! first element of the trailer `/ID` array needed for key derivation. The
//! same parser drives the whole-file decryptor.

/// Parameters lifted from a file's encryption dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptDict {
    /// The `Filter` name, normally `Standard`.
    pub filter: String,
    /// The `V` (algorithm version) value.
    pub version: i64,
    /// The `R` (revision) value.
    pub revision: i64,
    /// The `Length` value in bits.
    pub length: i64,
    /// The `O` value.
    pub owner_value: Vec<u8>,
    /// The `U` value.
    pub user_value: Vec<u8>,
    /// The `OE` value (V5 only).
    pub owner_key_value: Option<Vec<u8>>,
    /// The `UE` value (V5 only).
    pub user_key_value: Option<Vec<u8>>,
    /// The `P` value, as the signed 32-bit integer stored in the file.
    pub permissions: i32,
    /// The `EncryptMetadata` flag (default true).
    pub encrypt_metadata: bool,
    /// The `CFM` name of the default stream crypt filter, for V4/V5
    /// (`V2`, `AESV2` or `AESV3`).
    pub stream_filter: Option<String>,
    /// First element of the trailer `ID` array.
    pub file_id: Vec<u8>,
}

/// Scan raw file bytes for the encryption dictionary.
///
/// Returns `None` for unencrypted files. Incremental updates may leave
/// several trailers; the last parseable `/Encrypt` entry wins.
pub fn probe(bytes: &[u8]) -> Option<EncryptDict> {
    let dict = find_encrypt_dict(bytes)?;
    let file_id = find_file_id(bytes).unwrap_or_default();
    build(&dict, file_id)
}

fn build(dict: &Value, file_id: Vec<u8>) -> Option<EncryptDict> {
    let filter = dict.get("Filter")?.as_name()?.to_string();
    let version = dict.get("V").and_then(Value::as_int).unwrap_or(0);
    let revision = dict.get("R").and_then(Value::as_int)?;
    let length = dict.get("Length").and_then(Value::as_int).unwrap_or(40);
    let owner_value = dict.get("O")?.as_bytes()?.to_vec();
    let user_value = dict.get("U")?.as_bytes()?.to_vec();
    let permissions = dict.get("P").and_then(Value::as_int)? as i32;
    let encrypt_metadata = dict
        .get("EncryptMetadata")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let owner_key_value = dict.get("OE").and_then(Value::as_bytes).map(<[u8]>::to_vec);
    let user_key_value = dict.get("UE").and_then(Value::as_bytes).map(<[u8]>::to_vec);

    // For V4/V5 the actual cipher hides behind the StmF crypt filter.
    let stream_filter = dict
        .get("StmF")
        .and_then(Value::as_name)
        .and_then(|stmf| dict.get("CF")?.get(stmf))
        .and_then(|cf| cf.get("CFM")?.as_name())
        .map(str::to_string);

    Some(EncryptDict {
        filter,
        version,
        revision,
        length,
        owner_value,
        user_value,
        owner_key_value,
        user_key_value,
        permissions,
        encrypt_metadata,
        stream_filter,
        file_id,
    })
}

fn find_encrypt_dict(bytes: &[u8]) -> Option<Value> {
    for start in occurrences(bytes, b"/Encrypt").into_iter().rev() {
        // Skip /EncryptMetadata and similar longer names.
        let after = start + b"/Encrypt".len();
        if bytes.get(after).is_some_and(|b| b.is_ascii_alphanumeric()) {
            continue;
        }

        let mut parser = Parser::new(bytes, after);
        parser.skip_whitespace();
        let value = match parser.parse_value() {
            Some(value) => value,
            None => continue,
        };

        let resolved = match value {
            Value::Dict(_) => Some(value),
            Value::Reference(id, generation) => find_indirect_object(bytes, id, generation),
            _ => None,
        };
        if let Some(dict @ Value::Dict(_)) = resolved {
            return Some(dict);
        }
    }
    None
}

fn find_indirect_object(bytes: &[u8], id: u32, generation: u16) -> Option<Value> {
    let header = format!("{id} {generation} obj");
    for start in occurrences(bytes, header.as_bytes()).into_iter().rev() {
        // The header must not be the tail of a longer number.
        if start > 0 && bytes[start - 1].is_ascii_digit() {
            continue;
        }
        let mut parser = Parser::new(bytes, start + header.len());
        parser.skip_whitespace();
        if let Some(value @ Value::Dict(_)) = parser.parse_value() {
            return Some(value);
        }
    }
    None
}

/// Object id of the `/Encrypt` dictionary, when the trailer references it
/// indirectly. `None` for inline dictionaries and unencrypted files.
pub(crate) fn encrypt_object_id(bytes: &[u8]) -> Option<(u32, u16)> {
    for start in occurrences(bytes, b"/Encrypt").into_iter().rev() {
        let after = start + b"/Encrypt".len();
        if bytes.get(after).is_some_and(|b| b.is_ascii_alphanumeric()) {
            continue;
        }
        let mut parser = Parser::new(bytes, after);
        if let Some(Value::Reference(id, generation)) = parser.parse_value() {
            return Some((id, generation));
        }
    }
    None
}

/// Last parseable trailer reference under `key` (`Root`, `Info`).
pub(crate) fn find_trailer_reference(bytes: &[u8], key: &[u8]) -> Option<(u32, u16)> {
    let mut needle = vec![b'/'];
    needle.extend_from_slice(key);
    for start in occurrences(bytes, &needle).into_iter().rev() {
        let after = start + needle.len();
        if bytes.get(after).is_some_and(|b| b.is_ascii_alphanumeric()) {
            continue;
        }
        let mut parser = Parser::new(bytes, after);
        if let Some(Value::Reference(id, generation)) = parser.parse_value() {
            return Some((id, generation));
        }
    }
    None
}

fn find_file_id(bytes: &[u8]) -> Option<Vec<u8>> {
    for start in occurrences(bytes, b"/ID").into_iter().rev() {
        let after = start + b"/ID".len();
        if bytes.get(after).is_some_and(|b| b.is_ascii_alphanumeric()) {
            continue;
        }
        let mut parser = Parser::new(bytes, after);
        parser.skip_whitespace();
        if let Some(Value::Array(items)) = parser.parse_value() {
            if let Some(first) = items.first().and_then(Value::as_bytes) {
                return Some(first.to_vec());
            }
        }
    }
    None
}

fn occurrences(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut found = Vec::new();
    if needle.is_empty() || haystack.len() < needle.len() {
        return found;
    }
    for index in 0..=haystack.len() - needle.len() {
        if &haystack[index..index + needle.len()] == needle {
            found.push(index);
        }
    }
    found
}

/// A parsed PDF object value, restricted to what an encryption dictionary
/// can contain.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Dict(Vec<(String, Value)>),
    Reference(u32, u16),
}

impl Value {
    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn as_name(&self) -> Option<&str> {
        match self {
            Value::Name(name) => Some(name),
            _ => None,
        }
    }

    pub(crate) fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

pub(crate) struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    /// Byte offset just past the last parsed value.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' => self.pos += 1,
                b'%' => {
                    while self.peek().is_some_and(|b| b != b'\n' && b != b'\r') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    pub(crate) fn parse_value(&mut self) -> Option<Value> {
        self.skip_whitespace();
        match self.peek()? {
            b'<' => {
                if self.bytes.get(self.pos + 1) == Some(&b'<') {
                    self.parse_dict()
                } else {
                    self.parse_hex_string()
                }
            }
            b'(' => self.parse_literal_string(),
            b'/' => self.parse_name(),
            b'[' => self.parse_array(),
            b't' | b'f' => self.parse_keyword(),
            b'n' => self.parse_keyword(),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.parse_number(),
            _ => None,
        }
    }

    fn parse_dict(&mut self) -> Option<Value> {
        self.pos += 2; // <<
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'>') {
                if self.bytes.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    return Some(Value::Dict(entries));
                }
                return None;
            }
            let key = match self.parse_name()? {
                Value::Name(name) => name,
                _ => return None,
            };
            let value = self.parse_value()?;
            entries.push((key, value));
        }
    }

    fn parse_array(&mut self) -> Option<Value> {
        self.pos += 1; // [
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b']') {
                self.pos += 1;
                return Some(Value::Array(items));
            }
            items.push(self.parse_value()?);
        }
    }

    fn parse_name(&mut self) -> Option<Value> {
        if self.peek() != Some(b'/') {
            return None;
        }
        self.pos += 1;
        let mut name = Vec::new();
        while let Some(byte) = self.peek() {
            match byte {
                b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' | b'/' | b'(' | b')' | b'<'
                | b'>' | b'[' | b']' | b'{' | b'}' | b'%' => break,
                b'#' => {
                    let high = self.bytes.get(self.pos + 1).copied()?;
                    let low = self.bytes.get(self.pos + 2).copied()?;
                    name.push(hex_value(high)? << 4 | hex_value(low)?);
                    self.pos += 3;
                }
                _ => {
                    name.push(byte);
                    self.pos += 1;
                }
            }
        }
        Some(Value::Name(String::from_utf8_lossy(&name).into_owned()))
    }

    fn parse_keyword(&mut self) -> Option<Value> {
        for (keyword, value) in [
            ("true", Value::Boolean(true)),
            ("false", Value::Boolean(false)),
            ("null", Value::Null),
        ] {
            if self.bytes[self.pos..].starts_with(keyword.as_bytes()) {
                self.pos += keyword.len();
                return Some(value);
            }
        }
        None
    }

    /// Parse a number, or an `n g R` indirect reference when one follows.
    fn parse_number(&mut self) -> Option<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        let mut is_real = false;
        while let Some(byte) = self.peek() {
            match byte {
                b'0'..=b'9' => self.pos += 1,
                b'.' => {
                    is_real = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
        if is_real {
            return Some(Value::Real(text.parse().ok()?));
        }
        let integer: i64 = text.parse().ok()?;

        // Lookahead for "g R" to distinguish references from plain integers.
        if integer >= 0 {
            let mut lookahead = Parser::new(self.bytes, self.pos);
            lookahead.skip_whitespace();
            let generation_start = lookahead.pos;
            while lookahead.peek().is_some_and(|b| b.is_ascii_digit()) {
                lookahead.pos += 1;
            }
            if lookahead.pos > generation_start {
                let generation: Option<u16> = std::str::from_utf8(
                    &lookahead.bytes[generation_start..lookahead.pos],
                )
                .ok()
                .and_then(|t| t.parse().ok());
                lookahead.skip_whitespace();
                if let (Some(generation), Some(b'R')) = (generation, lookahead.peek()) {
                    let boundary = lookahead.bytes.get(lookahead.pos + 1);
                    if !boundary.is_some_and(|b| b.is_ascii_alphanumeric()) {
                        self.pos = lookahead.pos + 1;
                        return Some(Value::Reference(integer as u32, generation));
                    }
                }
            }
        }

        Some(Value::Integer(integer))
    }

    fn parse_literal_string(&mut self) -> Option<Value> {
        self.pos += 1; // (
        let mut bytes = Vec::new();
        let mut depth = 1u32;
        while let Some(byte) = self.peek() {
            self.pos += 1;
            match byte {
                b'(' => {
                    depth += 1;
                    bytes.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(Value::Bytes(bytes));
                    }
                    bytes.push(byte);
                }
                b'\\' => {
                    let escaped = self.peek()?;
                    self.pos += 1;
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0C),
                        b'(' | b')' | b'\\' => bytes.push(escaped),
                        b'\r' => {
                            // Line continuation; consume a following LF too.
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u16::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(digit @ b'0'..=b'7') => {
                                        value = value * 8 + u16::from(digit - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            bytes.push(value as u8);
                        }
                        other => bytes.push(other),
                    }
                }
                _ => bytes.push(byte),
            }
        }
        None
    }

    fn parse_hex_string(&mut self) -> Option<Value> {
        self.pos += 1; // <
        let mut digits = Vec::new();
        loop {
            let byte = self.peek()?;
            self.pos += 1;
            match byte {
                b'>' => break,
                b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' => {}
                _ => digits.push(hex_value(byte)?),
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(0);
        }
        let bytes = digits
            .chunks_exact(2)
            .map(|pair| pair[0] << 4 | pair[1])
            .collect();
        Some(Value::Bytes(bytes))
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
