//! View processor: derives the filtered, sorted, paginated slice a client
//! asked for from the one cached collection.
//!
//! Everything here is pure. The collection is borrowed read-only and the
//! result is recomputed on every request.

mod sort;

use serde::Serialize;

use crate::cache::CachedCollection;

pub use sort::{compare, SortDirection, SortField, SortSpec, SortValue};

/// Items that can be searched and table-sorted.
pub trait Listable: Clone {
  type Field: SortField;

  /// True when any searchable field contains `needle`, which is already
  /// trimmed and lowercased.
  fn matches(&self, needle: &str) -> bool;

  fn sort_value(&self, field: Self::Field) -> SortValue;
}

/// Case-insensitive substring test over several fields.
pub fn any_contains<'a>(fields: impl IntoIterator<Item = &'a str>, needle: &str) -> bool {
  fields
    .into_iter()
    .any(|field| field.to_lowercase().contains(needle))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRequest<F> {
  pub search: Option<String>,
  pub sort: Option<SortSpec<F>>,
  /// 1-based
  pub page: u32,
  pub page_size: u32,
}

impl<F> Default for ViewRequest<F> {
  fn default() -> Self {
    Self {
      search: None,
      sort: None,
      page: 1,
      page_size: 30,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewResult<T> {
  pub items: Vec<T>,
  pub page: u32,
  pub page_size: u32,
  pub total_count: usize,
  pub total_pages: u32,
  pub has_next: bool,
  pub has_prev: bool,
}

/// Filter, sort and paginate a cached collection.
pub fn apply<T: Listable>(
  collection: &CachedCollection<T>,
  request: &ViewRequest<T::Field>,
) -> ViewResult<T> {
  let page = request.page.max(1);
  let page_size = request.page_size.max(1);

  // Filter
  let needle = request
    .search
    .as_deref()
    .map(|s| s.trim().to_lowercase())
    .filter(|s| !s.is_empty());
  let mut selected: Vec<&T> = match needle.as_deref() {
    Some(needle) => collection
      .items
      .iter()
      .filter(|item| item.matches(needle))
      .collect(),
    None => collection.items.iter().collect(),
  };

  // Sort (stable: equal keys keep fetch order)
  if let Some(spec) = &request.sort {
    let mut keyed: Vec<(SortValue, &T)> = selected
      .into_iter()
      .map(|item| (item.sort_value(spec.field), item))
      .collect();
    keyed.sort_by(|(a, _), (b, _)| compare(a, b, spec.direction));
    selected = keyed.into_iter().map(|(_, item)| item).collect();
  }

  // Paginate
  let total_count = selected.len();
  let total_pages = total_count.div_ceil(page_size as usize).max(1);
  let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
  let start = (page as usize - 1).saturating_mul(page_size as usize);
  let items = if start >= total_count {
    Vec::new()
  } else {
    let end = (start + page_size as usize).min(total_count);
    selected[start..end].iter().map(|item| (*item).clone()).collect()
  };

  let current = page.clamp(1, total_pages);

  ViewResult {
    items,
    page: request.page,
    page_size,
    total_count,
    total_pages,
    has_next: current < total_pages,
    has_prev: current > 1,
  }
}
