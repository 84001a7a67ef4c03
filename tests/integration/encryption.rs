//! Password classification and output re-encryption.

use pdfbind::{
    classify_all, Binder, DocumentReader, EncryptionStatus, PdfBindError, PdfPage, Permissions,
};

use crate::common::{encrypted_pdf, simple_pdf, FixtureDir};

#[test]
fn test_status_classification() {
    let dir = FixtureDir::new();
    let plain = dir.write("plain.pdf", simple_pdf(1, 612.0, 792.0));
    let locked = dir.write("locked.pdf", encrypted_pdf(1, "owner", "user"));

    let reader = DocumentReader::open(&plain, "").unwrap();
    assert_eq!(reader.status(), EncryptionStatus::NotEncrypted);

    let reader = DocumentReader::open(&locked, "owner").unwrap();
    assert_eq!(reader.status(), EncryptionStatus::FullAccess);

    let reader = DocumentReader::open(&locked, "user").unwrap();
    assert_eq!(reader.status(), EncryptionStatus::RestrictedAccess);

    let result = DocumentReader::open(&locked, "wrong");
    assert!(matches!(result, Err(PdfBindError::PasswordRejected { .. })));
}

#[tokio::test]
async fn test_concurrent_classification() {
    let dir = FixtureDir::new();
    let plain = dir.write("plain.pdf", simple_pdf(1, 612.0, 792.0));
    let locked = dir.write("locked.pdf", encrypted_pdf(1, "owner", "user"));

    let results = classify_all(
        vec![
            (plain.clone(), String::new()),
            (locked.clone(), "user".to_string()),
        ],
        4,
    )
    .await;

    for (path, status) in results {
        if path == plain {
            assert_eq!(status.unwrap(), EncryptionStatus::NotEncrypted);
        } else {
            assert_eq!(status.unwrap(), EncryptionStatus::RestrictedAccess);
        }
    }
}

#[test]
fn test_owner_open_recovers_encryption_settings() {
    let dir = FixtureDir::new();
    let locked = dir.write("locked.pdf", encrypted_pdf(1, "owner", "user"));

    let reader = DocumentReader::open(&locked, "owner").unwrap();
    let descriptor = reader.encryption();
    assert!(descriptor.is_enabled);
    assert_eq!(descriptor.owner_password, "owner");
    assert!(descriptor.is_user_password_enabled);
    assert_eq!(descriptor.user_password, "user");
}

#[test]
fn test_reencrypted_output_round_trip() {
    let dir = FixtureDir::new();
    let source = dir.write("plain.pdf", simple_pdf(3, 612.0, 792.0));
    let output = dir.path().join("locked.pdf");

    let mut binder = Binder::new();
    for page in DocumentReader::open(&source, "").unwrap().pages() {
        binder.add(page);
    }
    binder.encryption.is_enabled = true;
    binder.encryption.owner_password = "secret-owner".to_string();
    binder.encryption.is_user_password_enabled = true;
    binder.encryption.user_password = "secret-user".to_string();
    binder.encryption.permissions = Permissions::deny_all().with_print(true);
    binder.save(&output).unwrap();

    // No password: rejected outright.
    assert!(matches!(
        DocumentReader::open(&output, ""),
        Err(PdfBindError::PasswordRejected { .. })
    ));

    // User password: restricted access, pages readable.
    let reader = DocumentReader::open(&output, "secret-user").unwrap();
    assert_eq!(reader.status(), EncryptionStatus::RestrictedAccess);
    assert_eq!(reader.page_count(), 3);
    assert!(reader.encryption().permissions.print());
    assert!(!reader.encryption().permissions.modify());

    // Owner password: full access and settings recovered.
    let reader = DocumentReader::open(&output, "secret-owner").unwrap();
    assert_eq!(reader.status(), EncryptionStatus::FullAccess);
    assert_eq!(reader.encryption().user_password, "secret-user");
}

#[test]
fn test_encryption_carried_from_source_to_output() {
    // Open an encrypted source with its owner password, compose an
    // unencrypted copy, then re-protect it with the recovered descriptor.
    let dir = FixtureDir::new();
    let locked = dir.write("locked.pdf", encrypted_pdf(2, "owner", "user"));
    let output = dir.path().join("relocked.pdf");

    let reader = DocumentReader::open(&locked, "owner").unwrap();
    let descriptor = reader.encryption().clone();

    let mut binder = Binder::new();
    for page in reader.pages() {
        binder.add(page);
    }
    binder.encryption = descriptor;
    binder.save(&output).unwrap();

    let reopened = DocumentReader::open(&output, "owner").unwrap();
    assert_eq!(reopened.status(), EncryptionStatus::FullAccess);
    assert_eq!(reopened.page_count(), 2);
}
