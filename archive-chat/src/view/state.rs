//! Results state
//!
//! Pure state transitions of the results view: the raw page, the paging
//! cursor and the sort selection. Nothing here performs I/O or paints.

use feruca::Collator;
use std::cmp::Ordering;

use crate::search::{parse_date, PageState, ResultRow, SearchParams, SortDir, SortKey, SortState};

#[derive(Debug, Clone)]
pub struct ResultsState {
    raw: Vec<ResultRow>,
    page: PageState,
    sort: SortState,
    params: Option<SearchParams>,
}

impl ResultsState {
    pub fn new(page_size: u64) -> Self {
        Self {
            raw: Vec::new(),
            page: PageState::new(page_size),
            sort: SortState::default(),
            params: None,
        }
    }

    /// Replace the held page. The rows are copied; sorting is reset.
    pub fn load_page(&mut self, rows: &[ResultRow], total_hits: u64, page: u64) {
        self.raw = rows.to_vec();
        self.sort = SortState::default();
        self.page.total_hits = total_hits;
        self.page.current_page = page.max(1);
    }

    /// Same key flips the direction, another key starts ascending
    pub fn toggle_sort(&mut self, key: SortKey) {
        if self.sort.key == Some(key) {
            self.sort.dir = self.sort.dir.flip();
        } else {
            self.sort = SortState {
                key: Some(key),
                dir: SortDir::Asc,
            };
        }
    }

    /// Rows in the order they should be shown.
    ///
    /// Works on a copy; the raw page keeps the engine's order.
    pub fn display_rows(&self) -> Vec<ResultRow> {
        let mut rows = self.raw.clone();

        let Some(key) = self.sort.key else {
            return rows;
        };

        let dir = self.sort.dir;
        let mut collator = Collator::default();
        rows.sort_by(|a, b| {
            let ordering = match key {
                SortKey::Date => date_millis(&a.date).cmp(&date_millis(&b.date)),
                _ => text_cmp(&mut collator, a.field(key), b.field(key)),
            };
            match dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });

        rows
    }

    pub fn raw_rows(&self) -> &[ResultRow] {
        &self.raw
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn params(&self) -> Option<&SearchParams> {
        self.params.as_ref()
    }

    pub fn set_params(&mut self, params: SearchParams) {
        self.params = Some(params);
    }

    /// Page `previous_page` would fetch, if any
    pub fn previous_target(&self) -> Option<u64> {
        self.page
            .has_previous()
            .then(|| self.page.current_page - 1)
    }

    /// Page `next_page` would fetch, if any
    pub fn next_target(&self) -> Option<u64> {
        self.page.has_next().then(|| self.page.current_page + 1)
    }
}

/// Unparsable and empty dates sort as the epoch
fn date_millis(value: &str) -> i64 {
    parse_date(value)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

/// Unicode collation (CLDR root order); code-point order breaks ties so the
/// result never depends on the input order of collation-equal values.
fn text_cmp(collator: &mut Collator, a: &str, b: &str) -> Ordering {
    collator.collate(a, b).then_with(|| a.cmp(b))
}
