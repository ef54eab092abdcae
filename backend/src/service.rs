use std::sync::Arc;

use thiserror::Error;

use crate::{
    crypto::{CryptoError, FieldCipher},
    models::{Birthday, BirthdayInput, ImportEntry, NewBirthday},
    store::{BirthdayStore, StoreError},
};

const MAX_NAME_LENGTH: usize = 1000;
const MAX_FINGERPRINT_LENGTH: usize = 256;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl ServiceError {
    pub fn is_decryption(&self) -> bool {
        matches!(
            self,
            ServiceError::Crypto(
                CryptoError::Decryption | CryptoError::Malformed(_) | CryptoError::InvalidUtf8
            )
        )
    }
}

// Rejects null bytes and control characters other than line breaks and tabs.
fn validate_input_string(field: &str, input: &str, max_length: usize) -> Result<(), ServiceError> {
    if input.contains('\0') {
        return Err(ServiceError::Invalid(format!("{} contains null bytes", field)));
    }

    for ch in input.chars() {
        if ch.is_control() && ch != '\n' && ch != '\r' && ch != '\t' {
            return Err(ServiceError::Invalid(format!(
                "{} contains invalid control characters",
                field
            )));
        }
    }

    if input.chars().count() > max_length {
        return Err(ServiceError::Invalid(format!(
            "{} exceeds maximum length of {} characters",
            field, max_length
        )));
    }

    Ok(())
}

fn validate_fingerprint(fingerprint: &str) -> Result<(), ServiceError> {
    if fingerprint.trim().is_empty() {
        return Err(ServiceError::Invalid("Fingerprint is required".to_string()));
    }
    validate_input_string("Fingerprint", fingerprint, MAX_FINGERPRINT_LENGTH)
}

fn validate_entry(name: &str, month: i32, day: i32) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::Invalid("Name is required".to_string()));
    }
    validate_input_string("Name", name, MAX_NAME_LENGTH)?;

    if !(1..=12).contains(&month) {
        return Err(ServiceError::Invalid("Month must be between 1 and 12".to_string()));
    }
    if !(1..=31).contains(&day) {
        return Err(ServiceError::Invalid("Day must be between 1 and 31".to_string()));
    }

    Ok(())
}

/// Birthday operations with validation and optional encryption of the `name` column.
///
/// Names leave this type decrypted; they only exist as ciphertext inside the store.
pub struct BirthdayService {
    store: Arc<dyn BirthdayStore>,
    cipher: Option<FieldCipher>,
}

impl BirthdayService {
    pub fn new(store: Arc<dyn BirthdayStore>, cipher: Option<FieldCipher>) -> Self {
        Self { store, cipher }
    }

    fn seal(&self, name: &str) -> Result<String, ServiceError> {
        match &self.cipher {
            Some(cipher) => Ok(cipher.encrypt(name)?),
            None => Ok(name.to_string()),
        }
    }

    fn open(&self, mut birthdays: Vec<Birthday>) -> Result<Vec<Birthday>, ServiceError> {
        if let Some(cipher) = &self.cipher {
            for birthday in &mut birthdays {
                birthday.name = cipher.decrypt(&birthday.name)?;
            }
        }
        Ok(birthdays)
    }

    fn prepare(&self, input: &BirthdayInput) -> Result<NewBirthday, ServiceError> {
        validate_fingerprint(&input.fingerprint)?;
        validate_entry(&input.name, input.month, input.day)?;

        Ok(NewBirthday {
            name: self.seal(&input.name)?,
            month: input.month,
            day: input.day,
            fingerprint: input.fingerprint.clone(),
        })
    }

    pub async fn list(&self, fingerprint: &str) -> Result<Vec<Birthday>, ServiceError> {
        let birthdays = self.store.list_by_fingerprint(fingerprint).await?;
        self.open(birthdays)
    }

    pub async fn due_on(&self, month: i32, day: i32) -> Result<Vec<Birthday>, ServiceError> {
        let birthdays = self.store.list_by_date(month, day).await?;
        self.open(birthdays)
    }

    pub async fn add(&self, input: &BirthdayInput) -> Result<i32, ServiceError> {
        let birthday = self.prepare(input)?;
        Ok(self.store.create(&birthday).await?)
    }

    pub async fn update(&self, id: i32, input: &BirthdayInput) -> Result<(), ServiceError> {
        let birthday = self.prepare(input)?;
        if self.store.update(id, &birthday).await? == 0 {
            log::debug!("Update of birthday {} matched no rows", id);
        }
        Ok(())
    }

    pub async fn remove(&self, id: i32) -> Result<(), ServiceError> {
        if self.store.delete(id).await? == 0 {
            log::debug!("Delete of birthday {} matched no rows", id);
        }
        Ok(())
    }

    /// Stores every entry under `fingerprint`; any invalid entry rejects the whole batch.
    pub async fn import(
        &self,
        entries: &[ImportEntry],
        fingerprint: &str,
    ) -> Result<u64, ServiceError> {
        validate_fingerprint(fingerprint)?;

        let mut rows = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            validate_entry(&entry.name, entry.month, entry.day).map_err(|e| {
                ServiceError::Invalid(format!("Invalid birthday at index {}: {}", index, e))
            })?;
            rows.push(NewBirthday {
                name: self.seal(&entry.name)?,
                month: entry.month,
                day: entry.day,
                fingerprint: fingerprint.to_string(),
            });
        }

        Ok(self.store.bulk_import(&rows).await?)
    }
}
