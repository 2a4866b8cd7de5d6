use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Raw paging parameters as they arrive in a query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationOptions {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Normalized paging window: page and limit are at least 1, limit is capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn skip(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl From<&PaginationOptions> for Pagination {
    fn from(options: &PaginationOptions) -> Self {
        Self {
            page: options.page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: options.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub meta: PageMeta,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(pagination: Pagination, total: u64, data: Vec<T>) -> Self {
        Self {
            meta: PageMeta {
                page: pagination.page,
                limit: pagination.limit,
                total,
            },
            data,
        }
    }

    /// Slice an already filtered and sorted collection into one page.
    pub fn from_sorted(pagination: Pagination, items: Vec<T>) -> Self {
        let total = items.len() as u64;
        let data = items
            .into_iter()
            .skip(pagination.skip())
            .take(pagination.limit as usize)
            .collect();
        Self::new(pagination, total, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_normalizes_zero_and_oversized_values() {
        let pagination = Pagination::from(&PaginationOptions {
            page: Some(0),
            limit: Some(10_000),
        });
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.limit, MAX_LIMIT);
        assert_eq!(pagination.skip(), 0);
    }

    #[test]
    fn from_sorted_reports_total_before_slicing() {
        let pagination = Pagination { page: 2, limit: 3 };
        let page = Page::from_sorted(pagination, (1..=7).collect::<Vec<_>>());
        assert_eq!(page.meta.total, 7);
        assert_eq!(page.data, vec![4, 5, 6]);
    }
}
