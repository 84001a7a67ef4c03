//! Standard security handler password algorithms.
//!
//! Implements the password-to-key derivation and authentication procedures
//! of the PDF standard security handler: MD5/RC4 based for revisions 2–4,
//! SHA-2 based validation for revisions 5 and 6. Revision 7+ does not exist.
//!
//! The owner-password path for R2–R4 also yields the document's user
//! password (decrypting the `O` value with the owner key produces the padded
//! user password), which is what makes user-password recovery possible.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};
use sha2::{Sha256, Sha384, Sha512};

use super::rc4::rc4_apply;

/// Password padding constant (Algorithm 2, step a).
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Inputs shared by every password algorithm, lifted from the encryption
/// dictionary and the trailer.
#[derive(Debug, Clone)]
pub struct HandlerParams {
    /// Revision number (`R`).
    pub revision: u32,
    /// Key length in bytes.
    pub key_length: usize,
    /// The `O` value.
    pub owner_value: Vec<u8>,
    /// The `U` value.
    pub user_value: Vec<u8>,
    /// The `OE` value (R5/R6 only).
    pub owner_key_value: Option<Vec<u8>>,
    /// The `UE` value (R5/R6 only).
    pub user_key_value: Option<Vec<u8>>,
    /// The `P` value, signed as stored.
    pub permissions: i32,
    /// First element of the trailer `ID` array.
    pub file_id: Vec<u8>,
    /// The `EncryptMetadata` flag.
    pub encrypt_metadata: bool,
}

/// Which password a supplied string turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRole {
    /// The owner (full-permission) password.
    Owner,
    /// The user (restricted) password.
    User,
}

/// Classify a supplied password against the handler parameters.
///
/// Tries the owner password first, then the user password, mirroring the
/// precedence the composer's readers give to supplied credentials. Returns
/// `None` when the password matches neither.
pub fn classify_password(password: &[u8], params: &HandlerParams) -> Option<PasswordRole> {
    if params.revision >= 5 {
        return classify_password_v5(password, params);
    }
    if authenticate_owner_password(password, params) {
        Some(PasswordRole::Owner)
    } else if authenticate_user_password(password, params) {
        Some(PasswordRole::User)
    } else {
        None
    }
}

/// Pad or truncate a password to 32 bytes (Algorithm 2, step a).
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    if len < 32 {
        padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    }
    padded
}

/// Undo [`pad_password`]: strip the earliest padding suffix.
pub fn strip_password_padding(padded: &[u8]) -> &[u8] {
    for len in 0..=padded.len().min(32) {
        let tail = &padded[len..];
        if tail == &PASSWORD_PADDING[..tail.len().min(32)] {
            return &padded[..len];
        }
    }
    padded
}

/// Derive the file encryption key from a user password (Algorithm 2).
pub fn compute_encryption_key(password: &[u8], params: &HandlerParams) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(&params.owner_value);
    hasher.update(params.permissions.to_le_bytes());
    hasher.update(&params.file_id);
    if params.revision >= 4 && !params.encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut hash = hasher.finalize().to_vec();

    let key_length = params.key_length.min(16);
    if params.revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_length]).to_vec();
        }
    }

    hash.truncate(key_length);
    hash
}

/// Compute the expected `U` value for a derived key (Algorithms 4 and 5).
pub fn compute_user_value(key: &[u8], file_id: &[u8], revision: u32) -> Vec<u8> {
    if revision == 2 {
        return rc4_apply(key, &PASSWORD_PADDING);
    }

    let mut hasher = Md5::new();
    hasher.update(PASSWORD_PADDING);
    hasher.update(file_id);
    let mut value = rc4_apply(key, &hasher.finalize());

    for round in 1..20u8 {
        let xored: Vec<u8> = key.iter().map(|byte| byte ^ round).collect();
        value = rc4_apply(&xored, &value);
    }

    // The stored U value is 32 bytes; the trailing 16 are arbitrary.
    value.extend_from_slice(&[0u8; 16]);
    value
}

/// Authenticate a user password (Algorithm 6). Returns true on a match.
pub fn authenticate_user_password(password: &[u8], params: &HandlerParams) -> bool {
    if params.user_value.len() < 16 {
        return false;
    }
    let key = compute_encryption_key(password, params);
    let expected = compute_user_value(&key, &params.file_id, params.revision);
    if params.revision == 2 {
        constant_time_eq(&expected[..32.min(expected.len())], &params.user_value[..32.min(params.user_value.len())])
    } else {
        constant_time_eq(&expected[..16], &params.user_value[..16])
    }
}

/// Derive the RC4 key from an owner password (Algorithm 3, steps a–d).
fn owner_key(password: &[u8], revision: u32, key_length: usize) -> Vec<u8> {
    let mut hash = Md5::digest(pad_password(password)).to_vec();
    let key_length = key_length.min(16);
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash).to_vec();
        }
    }
    hash.truncate(if revision >= 3 { key_length } else { 5 });
    hash
}

/// Decrypt the `O` value with an owner password, yielding the padded user
/// password (Algorithm 7, steps a–b).
pub fn decrypt_owner_value(owner_password: &[u8], params: &HandlerParams) -> Vec<u8> {
    let key = owner_key(owner_password, params.revision, params.key_length);
    if params.revision == 2 {
        rc4_apply(&key, &params.owner_value)
    } else {
        let mut value = params.owner_value.clone();
        for round in (0..20u8).rev() {
            let xored: Vec<u8> = key.iter().map(|byte| byte ^ round).collect();
            value = rc4_apply(&xored, &value);
        }
        value
    }
}

/// Authenticate an owner password (Algorithm 7).
pub fn authenticate_owner_password(password: &[u8], params: &HandlerParams) -> bool {
    let padded_user = decrypt_owner_value(password, params);
    authenticate_user_password(&padded_user, params)
}

/// Recover the document's user password from its owner password.
///
/// Only possible for R2–R4, where the `O` value is an RC4 encryption of the
/// padded user password. Returns `None` when the owner password does not
/// authenticate or the recovered bytes are not valid UTF-8.
pub fn recover_user_password(owner_password: &[u8], params: &HandlerParams) -> Option<String> {
    if params.revision >= 5 {
        return None;
    }
    let padded_user = decrypt_owner_value(owner_password, params);
    if !authenticate_user_password(&padded_user, params) {
        return None;
    }
    let stripped = strip_password_padding(&padded_user);
    String::from_utf8(stripped.to_vec()).ok()
}

/// Unwrap the R5/R6 file encryption key from the `OE`/`UE` value
/// (Algorithm 2.A, steps d–f).
///
/// The intermediate key is the password hash over the role's key salt; the
/// wrapped key is AES-256-CBC with a zero IV and no padding. Returns `None`
/// when the dictionary lacks the role's key value.
pub fn file_key_v5(
    password: &[u8],
    role: PasswordRole,
    params: &HandlerParams,
) -> Option<Vec<u8>> {
    let owner = &params.owner_value;
    let user = &params.user_value;
    if owner.len() < 48 || user.len() < 48 {
        return None;
    }

    let password = truncate_password_utf8(password);
    let (salt, vector, wrapped) = match role {
        PasswordRole::Owner => (
            &owner[40..48],
            Some(&user[..48]),
            params.owner_key_value.as_deref()?,
        ),
        PasswordRole::User => (&user[40..48], None, params.user_key_value.as_deref()?),
    };
    if wrapped.len() < 32 {
        return None;
    }

    let intermediate = password_hash_v5(&password, salt, vector, params.revision);
    aes_cbc_decrypt_256(&intermediate, &[0u8; 16], &wrapped[..32])
}

/// Classify a password for R5/R6 via the SHA-2 validation hashes.
fn classify_password_v5(password: &[u8], params: &HandlerParams) -> Option<PasswordRole> {
    let owner = &params.owner_value;
    let user = &params.user_value;
    if owner.len() < 48 || user.len() < 48 {
        return None;
    }

    let password = truncate_password_utf8(password);

    // Owner: hash over password + O validation salt + full U value.
    let hash = password_hash_v5(&password, &owner[32..40], Some(&user[..48]), params.revision);
    if constant_time_eq(&hash, &owner[..32]) {
        return Some(PasswordRole::Owner);
    }

    // User: hash over password + U validation salt.
    let hash = password_hash_v5(&password, &user[32..40], None, params.revision);
    if constant_time_eq(&hash, &user[..32]) {
        return Some(PasswordRole::User);
    }

    None
}

/// R5 uses a single SHA-256; R6 uses the iterated hash of Algorithm 2.B.
fn password_hash_v5(password: &[u8], salt: &[u8], vector: Option<&[u8]>, revision: u32) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    if let Some(vector) = vector {
        hasher.update(vector);
    }
    let mut k = hasher.finalize().to_vec();

    if revision == 5 {
        return k;
    }

    let vector = vector.unwrap_or(&[]);
    let mut round = 0u32;
    let mut last_byte = 0u8;
    while round < 64 || last_byte > (round as u8).wrapping_sub(32) {
        let base: Vec<u8> = password
            .iter()
            .chain(k.iter())
            .chain(vector.iter())
            .copied()
            .collect();
        let mut block = Vec::with_capacity(base.len() * 64);
        for _ in 0..64 {
            block.extend_from_slice(&base);
        }

        let encrypted = aes_cbc_encrypt_128(&k[..16], &k[16..32], &block);

        k = match encrypted[..16].iter().map(|b| u32::from(*b)).sum::<u32>() % 3 {
            0 => Sha256::digest(&encrypted).to_vec(),
            1 => Sha384::digest(&encrypted).to_vec(),
            _ => Sha512::digest(&encrypted).to_vec(),
        };

        last_byte = *encrypted.last().unwrap_or(&0);
        round += 1;
    }

    k.truncate(32);
    k
}

/// AES-128-CBC encryption without padding; block length must be a multiple
/// of 16 bytes.
fn aes_cbc_encrypt_128(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
    let mut buffer = data.to_vec();
    let cipher = Aes128CbcEnc::new(key.into(), iv.into());
    cipher
        .encrypt_padded_mut::<NoPadding>(&mut buffer, data.len())
        .expect("block length is a multiple of 16");
    buffer
}

/// AES-256-CBC decryption without padding; block length must be a multiple
/// of 16 bytes.
fn aes_cbc_decrypt_256(key: &[u8], iv: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
    let mut buffer = data.to_vec();
    let length = Aes256CbcDec::new_from_slices(key, iv)
        .ok()?
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .ok()?
        .len();
    buffer.truncate(length);
    Some(buffer)
}

/// Truncate a password to 127 UTF-8 bytes on a character boundary (R5/R6).
fn truncate_password_utf8(password: &[u8]) -> Vec<u8> {
    let mut truncated = password.to_vec();
    if truncated.len() > 127 {
        let mut end = 127;
        while end > 0 && (truncated[end] & 0xC0) == 0x80 {
            end -= 1;
        }
        truncated.truncate(end);
    }
    truncated
}

/// Constant-time byte comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
