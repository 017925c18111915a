use std::fmt;
use std::str::FromStr;

use chrono::serde::{
  ts_milliseconds,
  ts_milliseconds_option
};
use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};
use thiserror::Error;

/// Length of every identifier the
/// backend issues.
pub const TASK_ID_LEN: usize = 21;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
  #[error(
    "task id must be exactly {expected} characters, got {0}",
    expected = TASK_ID_LEN
  )]
  InvalidTaskId(usize),
  #[error("task text must not be empty")]
  EmptyText,
  #[error(
    "task {0} carries a completedDate but is not completed"
  )]
  CompletedDateWithoutCompletion(TaskId),
  #[error(
    "unknown filter '{0}', expected all, active or completed"
  )]
  UnknownFilter(String)
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(
  try_from = "String",
  into = "String"
)]
pub struct TaskId(String);

impl TaskId {
  pub fn parse(
    raw: impl Into<String>
  ) -> Result<Self, ModelError> {
    let raw = raw.into();
    let len = raw.chars().count();
    if len != TASK_ID_LEN {
      return Err(
        ModelError::InvalidTaskId(len)
      );
    }
    Ok(Self(raw))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl TryFrom<String> for TaskId {
  type Error = ModelError;

  fn try_from(
    raw: String
  ) -> Result<Self, Self::Error> {
    Self::parse(raw)
  }
}

impl From<TaskId> for String {
  fn from(id: TaskId) -> Self {
    id.0
  }
}

impl FromStr for TaskId {
  type Err = ModelError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for TaskId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(
  try_from = "String",
  into = "String"
)]
pub struct TaskText(String);

impl TaskText {
  pub fn parse(
    raw: impl Into<String>
  ) -> Result<Self, ModelError> {
    let raw = raw.into();
    if raw.is_empty() {
      return Err(ModelError::EmptyText);
    }
    Ok(Self(raw))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl TryFrom<String> for TaskText {
  type Error = ModelError;

  fn try_from(
    raw: String
  ) -> Result<Self, Self::Error> {
    Self::parse(raw)
  }
}

impl From<TaskText> for String {
  fn from(text: TaskText) -> Self {
    text.0
  }
}

impl fmt::Display for TaskText {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A task as the REST backend returns
/// it. Timestamps travel as epoch
/// milliseconds.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(
  rename_all = "camelCase",
  try_from = "TaskRecord"
)]
pub struct Task {
  pub id:             TaskId,
  pub text:           TaskText,
  pub completed:      bool,
  #[serde(with = "ts_milliseconds")]
  pub created_date:   DateTime<Utc>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "ts_milliseconds_option"
  )]
  pub completed_date:
    Option<DateTime<Utc>>
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
  id:             TaskId,
  text:           TaskText,
  completed:      bool,
  #[serde(with = "ts_milliseconds")]
  created_date:   DateTime<Utc>,
  #[serde(
    default,
    with = "ts_milliseconds_option"
  )]
  completed_date: Option<DateTime<Utc>>
}

impl TryFrom<TaskRecord> for Task {
  type Error = ModelError;

  fn try_from(
    record: TaskRecord
  ) -> Result<Self, Self::Error> {
    if !record.completed
      && record.completed_date.is_some()
    {
      return Err(
        ModelError::CompletedDateWithoutCompletion(
          record.id
        )
      );
    }

    Ok(Self {
      id:             record.id,
      text:           record.text,
      completed:      record.completed,
      created_date:   record.created_date,
      completed_date: record
        .completed_date
    })
  }
}

impl Task {
  pub fn is_active(&self) -> bool {
    !self.completed
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct CreateTaskRequest {
  pub text: TaskText
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct UpdateTaskRequest {
  pub text: TaskText
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
  #[default]
  All,
  Active,
  Completed
}

impl Filter {
  pub const VALUES: [Filter; 3] = [
    Filter::All,
    Filter::Active,
    Filter::Completed
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | Filter::All => "all",
      | Filter::Active => "active",
      | Filter::Completed => {
        "completed"
      }
    }
  }

  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | Filter::All => true,
      | Filter::Active => !task.completed,
      | Filter::Completed => {
        task.completed
      }
    }
  }
}

impl FromStr for Filter {
  type Err = ModelError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Filter::VALUES
      .into_iter()
      .find(|filter| filter.as_str() == s)
      .ok_or_else(|| {
        ModelError::UnknownFilter(
          s.to_string()
        )
      })
  }
}

impl fmt::Display for Filter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
