//! List parameters and their normalised cache key.

use formwork_api_models::SortOrder;

use crate::config::PageLimits;

/// Caller-facing listing parameters; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page; `None` and `0` both mean the first page.
    pub page: Option<u32>,
    /// Requested page size, clamped by [`PageLimits`].
    pub page_size: Option<u32>,
    /// Field to sort by.
    pub sort_by: Option<String>,
    /// Direction applied when `sort_by` is set.
    pub sort_order: Option<SortOrder>,
    /// Free-text search; blank means no search.
    pub search: Option<String>,
}

impl ListQuery {
    /// Query for the first page with default size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a page.
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Request a page size.
    #[must_use]
    pub const fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Sort by `field` in `order`.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = Some(order);
        self
    }

    /// Route through the search listing.
    #[must_use]
    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    /// Normalise against `limits` into the key for `object_id`.
    #[must_use]
    pub fn to_key(&self, object_id: &str, limits: PageLimits) -> PageKey {
        let sort = self
            .sort_by
            .as_deref()
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(|field| SortKey {
                field: field.to_string(),
                order: self.sort_order.unwrap_or_default(),
            });
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty())
            .map(str::to_string);

        PageKey {
            object_id: object_id.to_string(),
            page: self.page.unwrap_or(1).max(1),
            page_size: limits.clamp(self.page_size),
            search,
            sort,
        }
    }
}

/// Sort column and direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey {
    /// Field name.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

/// Identity of one cached page.
///
/// Search and plain listings never share a key: a key with `search` set is
/// always served by the search listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    /// Owning object.
    pub object_id: String,
    /// 1-based page.
    pub page: u32,
    /// Clamped page size.
    pub page_size: u32,
    /// Trimmed, non-empty search text.
    pub search: Option<String>,
    /// Sort applied by the backend.
    pub sort: Option<SortKey>,
}

impl PageKey {
    /// Whether this page comes from the search listing.
    #[must_use]
    pub const fn is_search(&self) -> bool {
        self.search.is_some()
    }

    /// Query-string pairs for the listing endpoint.
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("object_id", self.object_id.clone())];
        if let Some(search) = &self.search {
            pairs.push(("q", search.clone()));
        }
        pairs.push(("page", self.page.to_string()));
        pairs.push(("page_size", self.page_size.to_string()));
        if let Some(sort) = &self.sort {
            pairs.push(("sort_by", sort.field.clone()));
            pairs.push(("sort_order", sort.order.as_str().to_string()));
        }
        pairs
    }
}
