//! Query parameters of the list endpoints.
//!
//! Nothing here is ever rejected: unparsable or out-of-range values are
//! replaced by defaults.

use serde::Deserialize;

use crate::view::{SortDirection, SortField, SortSpec, ViewRequest};

/// Page sizes a client may ask for
pub const ALLOWED_PAGE_SIZES: [u32; 5] = [10, 20, 30, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 30;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListParams {
  pub page: Option<String>,
  pub per_page: Option<String>,
  pub search: Option<String>,
  /// Upstream-style sort (e.g. `updated`), applied descending when no
  /// table sort is given
  pub sort: Option<String>,
  pub table_sort: Option<String>,
  pub table_sort_direction: Option<String>,
}

impl ListParams {
  /// 1-based page, 1 when missing or invalid.
  pub fn page(&self) -> u32 {
    self
      .page
      .as_deref()
      .and_then(|p| p.trim().parse::<u32>().ok())
      .filter(|p| *p >= 1)
      .unwrap_or(1)
  }

  pub fn per_page(&self) -> u32 {
    self
      .per_page
      .as_deref()
      .and_then(|p| p.trim().parse::<u32>().ok())
      .filter(|p| ALLOWED_PAGE_SIZES.contains(p))
      .unwrap_or(DEFAULT_PAGE_SIZE)
  }

  /// Trimmed search text; empty means none.
  pub fn search(&self) -> String {
    self
      .search
      .as_deref()
      .map(str::trim)
      .unwrap_or_default()
      .to_string()
  }

  pub fn table_sort_direction(&self) -> SortDirection {
    self
      .table_sort_direction
      .as_deref()
      .and_then(|d| d.parse().ok())
      .unwrap_or_default()
  }

  /// The table sort, if `table_sort` names a sortable field.
  pub fn table_sort<F: SortField>(&self) -> Option<SortSpec<F>> {
    let field = F::parse(self.table_sort.as_deref()?)?;
    Some(SortSpec::new(field, self.table_sort_direction()))
  }

  /// Sort to apply: the table sort, else the legacy `sort` descending.
  pub fn effective_sort<F: SortField>(&self) -> Option<SortSpec<F>> {
    self.table_sort().or_else(|| {
      let field = F::parse(self.sort.as_deref()?)?;
      Some(SortSpec::new(field, SortDirection::Desc))
    })
  }

  pub fn view_request<F: SortField>(&self) -> ViewRequest<F> {
    let search = self.search();
    ViewRequest {
      search: (!search.is_empty()).then_some(search),
      sort: self.effective_sort(),
      page: self.page(),
      page_size: self.per_page(),
    }
  }
}
