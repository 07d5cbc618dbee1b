//! Task identifiers, task types, and launch payloads.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::{AppError, Result};

/// Response code the task service uses for accepted requests.
pub const API_CODE_OK: i64 = 200;

/// Response code the task service uses for rejected input.
pub const API_CODE_WRONG_INPUT: i64 = 401;

/// Reserved form field naming the task type.
pub const TYPE_FIELD: &str = "type";

/// Opaque server-assigned task identifier.
///
/// The service may encode the id as a JSON string or number; both forms
/// are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawTaskId", into = "String")]
pub struct TaskId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTaskId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawTaskId> for TaskId {
    fn from(raw: RawTaskId) -> Self {
        match raw {
            RawTaskId::Text(text) => Self(text),
            RawTaskId::Number(num) => Self(num.to_string()),
        }
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl TaskId {
    /// Wrap an identifier received out of band.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task kinds understood by the task service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Form-based template injection analysis.
    Crack,
    /// Path-based template injection analysis.
    CrackPath,
    /// Crawl a site and analyse every discovered form.
    Scan,
    /// Run a command through a previously successful analysis.
    Interactive,
}

impl TaskType {
    /// Wire value sent in the `type` form field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crack => "crack",
            Self::CrackPath => "crack-path",
            Self::Scan => "scan",
            Self::Interactive => "interactive",
        }
    }

    /// Whether launching this type requires a prior successful task.
    #[must_use]
    pub fn is_dependent(self) -> bool {
        matches!(self, Self::Interactive)
    }
}

impl FromStr for TaskType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "crack" => Ok(Self::Crack),
            "crack-path" => Ok(Self::CrackPath),
            "scan" => Ok(Self::Scan),
            "interactive" => Ok(Self::Interactive),
            other => Err(AppError::Config(format!("unknown task type {other:?}"))),
        }
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered key/value form payload submitted to the create endpoint.
///
/// Serializes as a sequence of pairs so it can be URL-encoded directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload {
    fields: Vec<(String, String)>,
}

impl FormPayload {
    /// Empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload pre-seeded with the `type` field.
    #[must_use]
    pub fn for_type(task_type: TaskType) -> Self {
        let mut payload = Self::new();
        payload.set(TYPE_FIELD, task_type.as_str());
        payload
    }

    /// Parse `key=value` arguments. A bare `key` yields an empty value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a key is empty.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut payload = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if key.is_empty() {
                return Err(AppError::Config(format!("form field without a name: {pair:?}")));
            }
            payload.append(key, value);
        }
        Ok(payload)
    }

    /// Set a field, replacing every existing value under the same key.
    ///
    /// The replacement keeps the position of the first occurrence.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter().position(|(k, _)| *k == key) {
            Some(index) => {
                self.fields[index].1 = value;
                let mut seen = 0usize;
                self.fields.retain(|(k, _)| {
                    if *k == key {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.fields.push((key, value)),
        }
    }

    /// Append a field without touching existing values.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// First value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Task type named by the `type` field, if present and known.
    #[must_use]
    pub fn task_type(&self) -> Option<TaskType> {
        self.get(TYPE_FIELD).and_then(|t| t.parse().ok())
    }

    /// Iterate over fields in submission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the payload has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for FormPayload {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.fields.iter())
    }
}

/// Body returned by the create endpoint.
///
/// An accepted request carries `taskid`; a rejected one carries `message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreateTaskResponse {
    /// Service response code.
    #[serde(default)]
    pub code: Option<i64>,
    /// Identifier of the new task.
    #[serde(default)]
    pub taskid: Option<TaskId>,
    /// Human-readable rejection reason.
    #[serde(default)]
    pub message: Option<String>,
}

impl CreateTaskResponse {
    /// Identifier of the new task, ignoring empty values.
    #[must_use]
    pub fn task_id(&self) -> Option<&TaskId> {
        self.taskid.as_ref().filter(|id| !id.as_str().is_empty())
    }
}
