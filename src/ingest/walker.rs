//! Page planning for paginated searches
//!
//! The service never says how many results a page holds. The size is
//! inferred from the first response and used to lay out the offsets of every
//! later page.

use crate::archive::PaginationMeta;

/// How many pages a search will fetch, and at which offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    /// Results per page; 0 when nothing could be inferred
    pub page_size: u64,
    /// Pages the service holds for this query, as far as can be told
    pub total_pages: u64,
    /// Pages that will actually be fetched, the first one included
    pub pages_to_fetch: u64,
}

impl PagePlan {
    /// Infers the plan from the first page of results
    ///
    /// The page size is `rows * limit` when both counters are present and
    /// their product fits, otherwise the number of entries the first page
    /// yielded. The reported
    /// page count is only a lower bound: when the total is known it is raised
    /// to `ceil(total / page_size)`.
    ///
    /// # Arguments
    ///
    /// * `meta` - Pagination counters scraped from the first page
    /// * `parsed_count` - Entries decoded from the first page
    /// * `max_pages` - Upper bound on pages fetched, the first one included
    ///
    /// # Example
    ///
    /// ```
    /// use fotoladu_ingest::archive::PaginationMeta;
    /// use fotoladu_ingest::ingest::PagePlan;
    ///
    /// let meta = PaginationMeta { total: 125, pages: 1, rows: 2, limit: 30 };
    /// let plan = PagePlan::from_first_page(&meta, 60, 20);
    /// assert_eq!(plan.page_size, 60);
    /// assert_eq!(plan.total_pages, 3);
    /// ```
    pub fn from_first_page(meta: &PaginationMeta, parsed_count: usize, max_pages: u32) -> Self {
        let page_size = match meta.rows.checked_mul(meta.limit) {
            Some(size) if size > 0 => size,
            _ => parsed_count as u64,
        };

        let mut total_pages = meta.pages.max(1);
        if meta.total > 0 && page_size > 0 {
            total_pages = total_pages.max(meta.total.div_ceil(page_size));
        }

        let pages_to_fetch = if page_size == 0 {
            1
        } else {
            total_pages.min(u64::from(max_pages)).max(1)
        };

        Self {
            page_size,
            total_pages,
            pages_to_fetch,
        }
    }

    /// Offsets of every page after the first: `page_index * page_size`
    ///
    /// The walk ends early if an offset would not fit in a `u64`.
    pub fn offsets(&self) -> impl Iterator<Item = u64> {
        let page_size = self.page_size;
        (1..self.pages_to_fetch).map_while(move |page| page.checked_mul(page_size))
    }
}
