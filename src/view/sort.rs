//! Type-aware ordering for table sorting.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A sortable field of one item type, addressed by its query-string name.
pub trait SortField: Copy + fmt::Debug + Send + Sync + 'static {
  /// Resolve a query-string name or alias. Unknown names yield `None`.
  fn parse(name: &str) -> Option<Self>;

  /// Canonical name echoed back to clients.
  fn name(&self) -> &'static str;
}

/// The comparable projection of one field of one item.
///
/// Values of different variants never meet in practice (a field always
/// projects to the same variant); if they do, the variant order decides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
  Bool(bool),
  Int(i64),
  /// Already lowercased, so ordering is case-insensitive
  Text(String),
  Time(DateTime<Utc>),
  Missing,
}

impl SortValue {
  pub fn text(value: &str) -> Self {
    Self::Text(value.to_lowercase())
  }

  /// Absent or empty strings count as missing.
  pub fn opt_text(value: Option<&str>) -> Self {
    match value {
      Some(s) if !s.is_empty() => Self::text(s),
      _ => Self::Missing,
    }
  }

  pub fn int(value: impl Into<i64>) -> Self {
    Self::Int(value.into())
  }

  pub fn opt_time(value: Option<DateTime<Utc>>) -> Self {
    value.map_or(Self::Missing, Self::Time)
  }

  pub fn is_missing(&self) -> bool {
    matches!(self, Self::Missing)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
  #[default]
  Asc,
  Desc,
}

impl SortDirection {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Asc => "asc",
      Self::Desc => "desc",
    }
  }
}

impl FromStr for SortDirection {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "asc" => Ok(Self::Asc),
      "desc" => Ok(Self::Desc),
      other => Err(format!("unknown sort direction: {other}")),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec<F> {
  pub field: F,
  pub direction: SortDirection,
}

impl<F> SortSpec<F> {
  pub fn new(field: F, direction: SortDirection) -> Self {
    Self { field, direction }
  }
}

/// Compare two projected values. Missing values go last in both directions;
/// `Desc` only reverses the order of present values.
pub fn compare(a: &SortValue, b: &SortValue, direction: SortDirection) -> Ordering {
  match (a.is_missing(), b.is_missing()) {
    (true, true) => Ordering::Equal,
    (true, false) => Ordering::Greater,
    (false, true) => Ordering::Less,
    (false, false) => match direction {
      SortDirection::Asc => a.cmp(b),
      SortDirection::Desc => b.cmp(a),
    },
  }
}
