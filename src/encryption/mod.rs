//! Encryption model: access status, write-side descriptor, and the
//! standard security handler.
//!
//! Reading and writing sit on different feet here. On the read side the
//! engine library parses plaintext files only, so classification works from
//! a raw-byte probe ([`dict`]) and our own password algorithms
//! ([`algorithms`]), and an encrypted file is rewritten as plaintext
//! ([`decrypt`]) before it is handed to the parser. On the write side the
//! caller fills in an [`Encryption`] descriptor which the composer's stamp
//! pass translates into the engine's encryption state.

pub(crate) mod algorithms;
pub(crate) mod decrypt;
pub(crate) mod dict;
mod rc4;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::error::{PdfBindError, Result};
use algorithms::{HandlerParams, PasswordRole};
use dict::EncryptDict;

/// Access level a supplied password earned on an opened document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncryptionStatus {
    /// The document is not encrypted (or required no password at all).
    #[default]
    NotEncrypted,
    /// The supplied password was accepted as the owner password.
    FullAccess,
    /// The supplied password was accepted as the user password only.
    RestrictedAccess,
}

/// Cipher the document's standard security handler uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncryptionMethod {
    /// RC4 with a 40-bit key (V1/R2).
    Rc4_40,
    /// RC4 with a 128-bit key (V2/R3, or a V4 `/V2` crypt filter).
    #[default]
    Rc4_128,
    /// AES-128 (V4 with an `/AESV2` crypt filter).
    Aes128,
    /// AES-256 (V5, R5 or R6).
    Aes256,
}

impl EncryptionMethod {
    /// Key length in bits.
    pub fn key_length(&self) -> u32 {
        match self {
            EncryptionMethod::Rc4_40 => 40,
            EncryptionMethod::Rc4_128 | EncryptionMethod::Aes128 => 128,
            EncryptionMethod::Aes256 => 256,
        }
    }

    /// True for the AES-256 handler, whose user password cannot be recovered
    /// from the owner password.
    pub fn is_aes_256(&self) -> bool {
        matches!(self, EncryptionMethod::Aes256)
    }

    fn from_encrypt_dict(dict: &EncryptDict) -> Option<Self> {
        match dict.version {
            1 => Some(EncryptionMethod::Rc4_40),
            2 => {
                if dict.length <= 40 {
                    Some(EncryptionMethod::Rc4_40)
                } else {
                    Some(EncryptionMethod::Rc4_128)
                }
            }
            4 => match dict.stream_filter.as_deref() {
                Some("AESV2") => Some(EncryptionMethod::Aes128),
                Some("V2") | None => Some(EncryptionMethod::Rc4_128),
                _ => None,
            },
            5 => Some(EncryptionMethod::Aes256),
            _ => None,
        }
    }
}

/// Permission bitset over the PDF `P` value.
///
/// Cleared bits deny the action. Bits 1–2 and 7–8 (1-based) are reserved and
/// kept set; viewers ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions(u32);

const PERMIT_PRINT: u32 = 1 << 2;
const PERMIT_MODIFY: u32 = 1 << 3;
const PERMIT_COPY: u32 = 1 << 4;
const PERMIT_ANNOTATE: u32 = 1 << 5;
const PERMIT_FILL_FORMS: u32 = 1 << 8;
const PERMIT_ACCESSIBILITY: u32 = 1 << 9;
const PERMIT_ASSEMBLE: u32 = 1 << 10;
const PERMIT_PRINT_HIGH_RES: u32 = 1 << 11;

const PERMISSION_BITS: u32 = PERMIT_PRINT
    | PERMIT_MODIFY
    | PERMIT_COPY
    | PERMIT_ANNOTATE
    | PERMIT_FILL_FORMS
    | PERMIT_ACCESSIBILITY
    | PERMIT_ASSEMBLE
    | PERMIT_PRINT_HIGH_RES;

impl Permissions {
    /// All actions permitted.
    pub fn allow_all() -> Self {
        Self(u32::MAX)
    }

    /// All actions denied.
    pub fn deny_all() -> Self {
        Self(!PERMISSION_BITS)
    }

    /// Wrap the signed `P` value stored in an encryption dictionary.
    pub fn from_p_value(p: i32) -> Self {
        Self(p as u32)
    }

    /// The signed `P` value as stored in the file.
    pub fn p_value(&self) -> i32 {
        self.0 as i32
    }

    fn with(mut self, flag: u32, allowed: bool) -> Self {
        if allowed {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
        self
    }

    /// Allow or deny printing.
    pub fn with_print(self, allowed: bool) -> Self {
        self.with(PERMIT_PRINT, allowed)
    }

    /// Allow or deny content modification.
    pub fn with_modify(self, allowed: bool) -> Self {
        self.with(PERMIT_MODIFY, allowed)
    }

    /// Allow or deny text and graphics extraction.
    pub fn with_copy(self, allowed: bool) -> Self {
        self.with(PERMIT_COPY, allowed)
    }

    /// Allow or deny adding or editing annotations.
    pub fn with_annotate(self, allowed: bool) -> Self {
        self.with(PERMIT_ANNOTATE, allowed)
    }

    /// Allow or deny filling form fields.
    pub fn with_fill_forms(self, allowed: bool) -> Self {
        self.with(PERMIT_FILL_FORMS, allowed)
    }

    /// Allow or deny extraction for accessibility tools.
    pub fn with_accessibility(self, allowed: bool) -> Self {
        self.with(PERMIT_ACCESSIBILITY, allowed)
    }

    /// Allow or deny document assembly (page insertion, rotation, deletion).
    pub fn with_assemble(self, allowed: bool) -> Self {
        self.with(PERMIT_ASSEMBLE, allowed)
    }

    /// Allow or deny high-resolution printing.
    pub fn with_print_high_res(self, allowed: bool) -> Self {
        self.with(PERMIT_PRINT_HIGH_RES, allowed)
    }

    /// Printing permitted.
    pub fn print(&self) -> bool {
        self.0 & PERMIT_PRINT != 0
    }

    /// Content modification permitted.
    pub fn modify(&self) -> bool {
        self.0 & PERMIT_MODIFY != 0
    }

    /// Text and graphics extraction permitted.
    pub fn copy(&self) -> bool {
        self.0 & PERMIT_COPY != 0
    }

    /// Annotation editing permitted.
    pub fn annotate(&self) -> bool {
        self.0 & PERMIT_ANNOTATE != 0
    }

    /// Form filling permitted.
    pub fn fill_forms(&self) -> bool {
        self.0 & PERMIT_FILL_FORMS != 0
    }

    /// Extraction for accessibility permitted.
    pub fn accessibility(&self) -> bool {
        self.0 & PERMIT_ACCESSIBILITY != 0
    }

    /// Document assembly permitted.
    pub fn assemble(&self) -> bool {
        self.0 & PERMIT_ASSEMBLE != 0
    }

    /// High-resolution printing permitted.
    pub fn print_high_res(&self) -> bool {
        self.0 & PERMIT_PRINT_HIGH_RES != 0
    }

    /// Translate into the engine's permission type for writing.
    pub(crate) fn to_lopdf(self) -> lopdf::Permissions {
        lopdf::Permissions::from_bits_truncate(self.0 as _)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::allow_all()
    }
}

/// Write-side encryption descriptor, owned by the caller of the composer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Encryption {
    /// Whether the composed document should be encrypted at all.
    pub is_enabled: bool,
    /// Owner (full-permission) password. Required when enabled.
    pub owner_password: String,
    /// Whether a distinct user password applies.
    pub is_user_password_enabled: bool,
    /// User (restricted) password. Ignored unless the flag above is set.
    pub user_password: String,
    /// Cipher to encrypt with.
    pub method: EncryptionMethod,
    /// Permissions granted to user-password opens.
    pub permissions: Permissions,
}

impl Encryption {
    /// The password user-level opens must supply: the explicit user password
    /// when one is enabled, otherwise the owner password.
    pub fn effective_user_password(&self) -> &str {
        if self.is_user_password_enabled {
            &self.user_password
        } else {
            &self.owner_password
        }
    }

    /// Check the descriptor is self-consistent before a save applies it.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.is_enabled && self.owner_password.is_empty() {
            bail!("encryption is enabled but no owner password is set");
        }
        Ok(())
    }
}

/// Outcome of probing and authenticating an encrypted file's raw bytes.
#[derive(Debug, Clone)]
pub(crate) struct AccessCheck {
    /// Parsed encryption dictionary, `None` for unencrypted files.
    pub dict: Option<EncryptDict>,
    /// Which password the supplied string matched.
    pub role: Option<PasswordRole>,
}

/// Probe raw file bytes and classify the supplied password.
///
/// Returns `PasswordRejected` when the file is encrypted and the password
/// matches neither role, and `UnsupportedEncryption` for handlers other than
/// the standard one.
pub(crate) fn check_access(
    bytes: &[u8],
    path: &std::path::Path,
    password: &str,
) -> Result<AccessCheck> {
    let dict = match dict::probe(bytes) {
        Some(dict) => dict,
        None => {
            return Ok(AccessCheck {
                dict: None,
                role: None,
            })
        }
    };

    if dict.filter != "Standard" {
        return Err(PdfBindError::unsupported_encryption(
            path.to_path_buf(),
            format!("security handler {:?}", dict.filter),
        ));
    }
    if EncryptionMethod::from_encrypt_dict(&dict).is_none() {
        return Err(PdfBindError::unsupported_encryption(
            path.to_path_buf(),
            format!("V {} with filter {:?}", dict.version, dict.stream_filter),
        ));
    }

    let params = handler_params(&dict);
    match algorithms::classify_password(password.as_bytes(), &params) {
        Some(role) => Ok(AccessCheck {
            dict: Some(dict),
            role: Some(role),
        }),
        None => Err(PdfBindError::password_rejected(path.to_path_buf())),
    }
}

/// Derive the access status from a classified open. An owner-level open
/// with an empty password means the file never demanded one.
pub(crate) fn resolve_status(check: &AccessCheck, supplied: &str) -> EncryptionStatus {
    match (&check.dict, check.role) {
        (None, _) => EncryptionStatus::NotEncrypted,
        (Some(_), Some(PasswordRole::Owner)) => {
            if supplied.is_empty() {
                EncryptionStatus::NotEncrypted
            } else {
                EncryptionStatus::FullAccess
            }
        }
        (Some(_), Some(PasswordRole::User)) => EncryptionStatus::RestrictedAccess,
        // Unauthenticated opens never get this far.
        (Some(_), None) => EncryptionStatus::RestrictedAccess,
    }
}

/// Derive a write-side descriptor from a classified open.
///
/// Only a `FullAccess` open discloses the owner password; for such opens the
/// user password is additionally recovered from the owner key where the
/// handler permits it (every method except AES-256).
pub(crate) fn resolve_encryption(
    check: &AccessCheck,
    supplied: &str,
    status: EncryptionStatus,
) -> Encryption {
    let dict = match (&check.dict, status) {
        (Some(dict), EncryptionStatus::FullAccess)
        | (Some(dict), EncryptionStatus::RestrictedAccess) => dict,
        _ => return Encryption::default(),
    };

    let method = EncryptionMethod::from_encrypt_dict(dict).unwrap_or_default();
    let mut encryption = Encryption {
        is_enabled: true,
        method,
        permissions: Permissions::from_p_value(dict.permissions),
        ..Encryption::default()
    };

    match status {
        EncryptionStatus::FullAccess => {
            encryption.owner_password = supplied.to_string();
            if !method.is_aes_256() {
                let params = handler_params(dict);
                if let Some(user) = algorithms::recover_user_password(supplied.as_bytes(), &params)
                {
                    encryption.is_user_password_enabled = true;
                    encryption.user_password = user;
                }
            }
        }
        EncryptionStatus::RestrictedAccess => {
            encryption.is_user_password_enabled = true;
            encryption.user_password = supplied.to_string();
        }
        EncryptionStatus::NotEncrypted => {}
    }

    encryption
}

fn handler_params(dict: &EncryptDict) -> HandlerParams {
    HandlerParams {
        revision: dict.revision.max(0) as u32,
        key_length: (dict.length.clamp(40, 256) / 8) as usize,
        owner_value: dict.owner_value.clone(),
        user_value: dict.user_value.clone(),
        owner_key_value: dict.owner_key_value.clone(),
        user_key_value: dict.user_key_value.clone(),
        permissions: dict.permissions,
        file_id: dict.file_id.clone(),
        encrypt_metadata: dict.encrypt_metadata,
    }
}
