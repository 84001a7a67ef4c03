//! Raw-byte document decryption.
//!
//! The engine library parses plaintext files only, so an encrypted file is
//! decrypted here first: every top-level object is located in the raw bytes,
//! parsed with [`dict`]'s object parser, its strings and stream payloads
//! decrypted, and the results re-serialized into a fresh plaintext file with
//! a rebuilt cross-reference table and a trailer without `/Encrypt`.
//!
//! Objects packed into object streams keep their container stream (decrypted
//! verbatim) but are not lifted into the rebuilt table.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use md5::{Digest, Md5};
use std::collections::BTreeMap;

use super::algorithms::{self, PasswordRole};
use super::dict::{self, EncryptDict, Parser, Value};
use super::rc4::rc4_apply;
use super::EncryptionMethod;

/// Decrypt a whole file into plaintext bytes.
///
/// `role` must come from a successful password classification; the content
/// key is derived for that role without re-authenticating. Returns `None`
/// when the file cannot be rewritten (unsupported method, undecryptable
/// payload, or no recoverable object structure).
pub(crate) fn decrypt_document(
    bytes: &[u8],
    dict: &EncryptDict,
    password: &str,
    role: PasswordRole,
) -> Option<Vec<u8>> {
    let key = ContentKey::derive(dict, password, role)?;
    rebuild(bytes, &key, dict.encrypt_metadata)
}

/// File-level content key plus the cipher the crypt filter selects.
struct ContentKey {
    method: EncryptionMethod,
    file_key: Vec<u8>,
}

impl ContentKey {
    fn derive(dict: &EncryptDict, password: &str, role: PasswordRole) -> Option<Self> {
        let method = EncryptionMethod::from_encrypt_dict(dict)?;
        let params = super::handler_params(dict);

        let file_key = if params.revision >= 5 {
            algorithms::file_key_v5(password.as_bytes(), role, &params)?
        } else {
            match role {
                // The owner password only reaches the file key through the
                // padded user password hidden in the O value.
                PasswordRole::Owner => {
                    let padded_user =
                        algorithms::decrypt_owner_value(password.as_bytes(), &params);
                    algorithms::compute_encryption_key(&padded_user, &params)
                }
                PasswordRole::User => {
                    algorithms::compute_encryption_key(password.as_bytes(), &params)
                }
            }
        };

        Some(Self { method, file_key })
    }

    /// Per-object key (Algorithm 1): MD5 over the file key, the low three
    /// bytes of the object number, the low two of the generation, and the
    /// AES salt where applicable. AES-256 uses the file key directly.
    fn object_key(&self, (number, generation): (u32, u16), aes: bool) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(&self.file_key);
        hasher.update(&number.to_le_bytes()[..3]);
        hasher.update(&generation.to_le_bytes()[..2]);
        if aes {
            hasher.update(b"sAlT");
        }
        let mut key = hasher.finalize().to_vec();
        key.truncate((self.file_key.len() + 5).min(16));
        key
    }

    fn decrypt(&self, id: (u32, u16), data: &[u8]) -> Option<Vec<u8>> {
        match self.method {
            EncryptionMethod::Rc4_40 | EncryptionMethod::Rc4_128 => {
                Some(rc4_apply(&self.object_key(id, false), data))
            }
            EncryptionMethod::Aes128 => aes_cbc_decrypt(&self.object_key(id, true), data),
            EncryptionMethod::Aes256 => aes_cbc_decrypt(&self.file_key, data),
        }
    }
}

/// AES-CBC with the IV prepended to the ciphertext and PKCS#7 padding.
fn aes_cbc_decrypt(key: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 32 {
        // Too short for an IV plus one block: an empty payload.
        return Some(Vec::new());
    }
    let (iv, body) = data.split_at(16);
    if body.len() % 16 != 0 {
        return None;
    }
    match key.len() {
        16 => cbc::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .ok(),
        32 => cbc::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .ok(),
        _ => None,
    }
}

/// A `N G obj` header located in the raw bytes.
struct ObjectHeader {
    id: u32,
    generation: u16,
    body_start: usize,
}

/// Scan forward from `from` for the next top-level object header.
///
/// Stream payloads are never scanned (the caller advances the cursor past
/// them), so a chance `obj` inside ciphertext cannot match; keywords such as
/// `endobj` are rejected by requiring digits before the token.
fn next_object_header(bytes: &[u8], from: usize) -> Option<ObjectHeader> {
    let is_ws = |b: u8| matches!(b, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ');
    let mut search = from;
    while let Some(at) = find(bytes, b"obj", search) {
        search = at + 3;
        if bytes.get(at + 3).is_some_and(|b| b.is_ascii_alphanumeric()) {
            continue;
        }

        let mut pos = at;
        let ws_end = pos;
        while pos > 0 && is_ws(bytes[pos - 1]) {
            pos -= 1;
        }
        if pos == ws_end {
            continue;
        }

        let generation_end = pos;
        while pos > 0 && bytes[pos - 1].is_ascii_digit() {
            pos -= 1;
        }
        if pos == generation_end {
            continue;
        }
        let Some(generation) = parse_decimal::<u16>(&bytes[pos..generation_end]) else {
            continue;
        };

        let ws_end = pos;
        while pos > 0 && is_ws(bytes[pos - 1]) {
            pos -= 1;
        }
        if pos == ws_end {
            continue;
        }

        let id_end = pos;
        while pos > 0 && bytes[pos - 1].is_ascii_digit() {
            pos -= 1;
        }
        if pos == id_end {
            continue;
        }
        if pos > 0
            && (bytes[pos - 1].is_ascii_alphanumeric()
                || matches!(bytes[pos - 1], b'+' | b'-' | b'.'))
        {
            continue;
        }
        let Some(id) = parse_decimal::<u32>(&bytes[pos..id_end]) else {
            continue;
        };
        if id == 0 {
            continue;
        }

        return Some(ObjectHeader {
            id,
            generation,
            body_start: at + 3,
        });
    }
    None
}

fn parse_decimal<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn find(bytes: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= bytes.len() || bytes.len() - from < needle.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|index| from + index)
}

/// Byte span of a stream payload following a parsed stream dictionary.
struct StreamSpan {
    start: usize,
    data_end: usize,
    end: usize,
}

fn stream_span(bytes: &[u8], value_end: usize, value: &Value) -> Option<StreamSpan> {
    let is_ws = |b: u8| matches!(b, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ');
    let mut pos = value_end;
    while bytes.get(pos).copied().is_some_and(is_ws) {
        pos += 1;
    }
    if !bytes[pos..].starts_with(b"stream") {
        return None;
    }
    let mut start = pos + b"stream".len();
    if bytes.get(start) == Some(&b'\r') {
        start += 1;
    }
    if bytes.get(start) == Some(&b'\n') {
        start += 1;
    }

    // Trust a direct /Length when the keyword actually follows it.
    if let Some(length) = value.get("Length").and_then(Value::as_int) {
        if length >= 0 {
            let data_end = start.checked_add(length as usize)?;
            if data_end <= bytes.len() {
                let mut after = data_end;
                while bytes.get(after).copied().is_some_and(is_ws) {
                    after += 1;
                }
                if bytes[after..].starts_with(b"endstream") {
                    return Some(StreamSpan {
                        start,
                        data_end,
                        end: after + b"endstream".len(),
                    });
                }
            }
        }
    }

    // Indirect or broken /Length: fall back to the endstream keyword.
    let keyword = find(bytes, b"endstream", start)?;
    let mut data_end = keyword;
    if data_end > start && bytes[data_end - 1] == b'\n' {
        data_end -= 1;
        if data_end > start && bytes[data_end - 1] == b'\r' {
            data_end -= 1;
        }
    } else if data_end > start && bytes[data_end - 1] == b'\r' {
        data_end -= 1;
    }
    Some(StreamSpan {
        start,
        data_end,
        end: keyword + b"endstream".len(),
    })
}

fn type_name(value: &Value) -> Option<&str> {
    value.get("Type").and_then(Value::as_name)
}

fn decrypt_strings(value: &mut Value, key: &ContentKey, id: (u32, u16)) -> Option<()> {
    match value {
        Value::Bytes(bytes) => *bytes = key.decrypt(id, bytes)?,
        Value::Array(items) => {
            for item in items {
                decrypt_strings(item, key, id)?;
            }
        }
        Value::Dict(entries) => {
            for (_, item) in entries {
                decrypt_strings(item, key, id)?;
            }
        }
        _ => {}
    }
    Some(())
}

fn set_length(value: &mut Value, length: usize) {
    if let Value::Dict(entries) = value {
        match entries.iter_mut().find(|(key, _)| key == "Length") {
            Some(entry) => entry.1 = Value::Integer(length as i64),
            None => entries.push(("Length".to_string(), Value::Integer(length as i64))),
        }
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Boolean(true) => out.extend_from_slice(b"true"),
        Value::Boolean(false) => out.extend_from_slice(b"false"),
        Value::Integer(number) => out.extend_from_slice(number.to_string().as_bytes()),
        Value::Real(number) => {
            let mut text = format!("{number:.6}");
            while text.ends_with('0') {
                text.pop();
            }
            if text.ends_with('.') {
                text.pop();
            }
            out.extend_from_slice(text.as_bytes());
        }
        Value::Name(name) => write_name(out, name),
        // Hex form sidesteps literal-string escaping for binary content.
        Value::Bytes(bytes) => {
            out.push(b'<');
            for byte in bytes {
                out.extend_from_slice(format!("{byte:02X}").as_bytes());
            }
            out.push(b'>');
        }
        Value::Array(items) => {
            out.push(b'[');
            for item in items {
                out.push(b' ');
                write_value(out, item);
            }
            out.extend_from_slice(b" ]");
        }
        Value::Dict(entries) => {
            out.extend_from_slice(b"<<");
            for (key, item) in entries {
                out.push(b' ');
                write_name(out, key);
                out.push(b' ');
                write_value(out, item);
            }
            out.extend_from_slice(b" >>");
        }
        Value::Reference(id, generation) => {
            out.extend_from_slice(format!("{id} {generation} R").as_bytes());
        }
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for &byte in name.as_bytes() {
        let regular = (0x21..=0x7E).contains(&byte)
            && !matches!(
                byte,
                b'/' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'%' | b'#'
            );
        if regular {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        }
    }
}

fn header_line(bytes: &[u8]) -> &[u8] {
    match find(bytes, b"%PDF", 0) {
        Some(start) => {
            let end = bytes[start..]
                .iter()
                .position(|&b| b == b'\r' || b == b'\n')
                .map(|offset| start + offset)
                .unwrap_or(bytes.len());
            &bytes[start..end]
        }
        None => b"%PDF-1.4",
    }
}

/// Rewrite the file as plaintext: decrypted objects, fresh cross-reference
/// table, and a trailer reduced to `/Size`, `/Root` and `/Info`.
fn rebuild(bytes: &[u8], key: &ContentKey, encrypt_metadata: bool) -> Option<Vec<u8>> {
    let root = dict::find_trailer_reference(bytes, b"Root")?;
    let info = dict::find_trailer_reference(bytes, b"Info");
    let encrypt_id = dict::encrypt_object_id(bytes);

    let mut out = Vec::with_capacity(bytes.len() + 512);
    out.extend_from_slice(header_line(bytes));
    out.extend_from_slice(b"\n%\xB5\xB5\xB5\xB5\n");

    let mut offsets: BTreeMap<u32, (u16, usize)> = BTreeMap::new();
    let mut cursor = 0usize;
    while let Some(header) = next_object_header(bytes, cursor) {
        let ObjectHeader {
            id,
            generation,
            body_start,
        } = header;

        let mut parser = Parser::new(bytes, body_start);
        let mut value = match parser.parse_value() {
            Some(value) => value,
            None => {
                cursor = body_start;
                continue;
            }
        };
        let value_end = parser.position();

        let span = stream_span(bytes, value_end, &value);
        cursor = span.as_ref().map(|s| s.end).unwrap_or(value_end);

        if encrypt_id == Some((id, generation)) {
            continue;
        }
        // Cross-reference streams describe the layout being replaced.
        if type_name(&value) == Some("XRef") {
            continue;
        }

        let object_id = (id, generation);
        decrypt_strings(&mut value, key, object_id)?;

        let data = match &span {
            Some(span) => {
                let raw = &bytes[span.start..span.data_end];
                let plain = if type_name(&value) == Some("Metadata") && !encrypt_metadata {
                    raw.to_vec()
                } else {
                    key.decrypt(object_id, raw)?
                };
                set_length(&mut value, plain.len());
                Some(plain)
            }
            None => None,
        };

        offsets.insert(id, (generation, out.len()));
        out.extend_from_slice(format!("{id} {generation} obj\n").as_bytes());
        write_value(&mut out, &value);
        if let Some(data) = data {
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&data);
            out.extend_from_slice(b"\nendstream");
        }
        out.extend_from_slice(b"\nendobj\n");
    }

    if offsets.is_empty() {
        return None;
    }

    let size = offsets.keys().next_back().copied().unwrap_or(0) + 1;
    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for number in 1..size {
        match offsets.get(&number) {
            Some((generation, offset)) => {
                out.extend_from_slice(format!("{offset:010} {generation:05} n \n").as_bytes());
            }
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }

    out.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root {} {} R", root.0, root.1).as_bytes(),
    );
    if let Some((id, generation)) = info {
        out.extend_from_slice(format!(" /Info {id} {generation} R").as_bytes());
    }
    out.extend_from_slice(format!(" >>\nstartxref\n{xref_offset}\n%%EOF").as_bytes());

    Some(out)
}
