use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Birthday {
    pub id: i32,
    pub name: String,
    pub month: i32,
    pub day: i32,
    pub fingerprint: String,
}

/// A row as written to the store. `name` is ciphertext when field encryption is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBirthday {
    pub name: String,
    pub month: i32,
    pub day: i32,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BirthdayInput {
    pub name: String,
    pub month: i32,
    pub day: i32,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportEntry {
    pub name: String,
    pub month: i32,
    pub day: i32,
}

/// Import body. `birthdays` stays untyped so a non-array can be reported as a 400.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub birthdays: serde_json::Value,
    #[serde(default)]
    pub fingerprint: Option<String>,
}
