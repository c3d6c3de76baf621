//! Results view model
//!
//! Owns one [`ResultsState`] and drives it from searches, page navigation and
//! sort toggles, painting through the injected [`Renderer`].
//!
//! Every fetch takes a ticket from a counter. A response is applied only when
//! its ticket is the latest one handed out, so a slow response to an older
//! request can never overwrite a newer page.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::render::Renderer;
use super::state::ResultsState;
use crate::error::QueryError;
use crate::search::{ResultRow, SearchGateway, SearchPage, SearchParams, SortKey};
use crate::session::SessionHook;

/// A fetch that has been issued but not yet applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub seq: u64,
    pub params: SearchParams,
    pub page: u64,
}

/// What a navigation call did to the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// A new page replaced the shown one
    Loaded,
    /// Nothing to do (already on the first/last page, no search yet)
    Unchanged,
    /// A newer request was issued meanwhile; this response was dropped
    Stale,
}

pub struct ResultsViewModel {
    state: ResultsState,
    gateway: Arc<dyn SearchGateway>,
    renderer: Box<dyn Renderer>,
    session_hook: Option<Arc<dyn SessionHook>>,
    untitled_title: String,
    last_issued: u64,
}

impl ResultsViewModel {
    pub fn new(gateway: Arc<dyn SearchGateway>, renderer: Box<dyn Renderer>, page_size: u64) -> Self {
        Self {
            state: ResultsState::new(page_size),
            gateway,
            renderer,
            session_hook: None,
            untitled_title: "Untitled search".to_string(),
            last_issued: 0,
        }
    }

    /// Open a session after each successful new search.
    ///
    /// The session is titled with the trimmed search text, or `untitled_title`
    /// when the text is blank.
    pub fn with_session_hook(mut self, hook: Arc<dyn SessionHook>, untitled_title: impl Into<String>) -> Self {
        self.session_hook = Some(hook);
        self.untitled_title = untitled_title.into();
        self
    }

    pub fn state(&self) -> &ResultsState {
        &self.state
    }

    /// Replace the shown page and repaint everything
    pub fn load_page(&mut self, rows: &[ResultRow], total_hits: u64, page: u64) {
        self.state.load_page(rows, total_hits, page);
        self.paint();
    }

    /// Toggle sorting on `key` and repaint from the held page
    pub fn toggle_sort(&mut self, key: SortKey) {
        self.state.toggle_sort(key);
        let sort = self.state.sort();
        debug!("Sorting by {} {:?}", key, sort.dir);

        self.renderer.render_sort_indicators(sort.key, sort.dir);
        self.renderer.render_rows(&self.state.display_rows());
    }

    /// Paint rows, sort indicators and pagination from the current state
    pub fn paint(&mut self) {
        let sort = self.state.sort();
        let page = *self.state.page();

        self.renderer.render_sort_indicators(sort.key, sort.dir);
        self.renderer.render_rows(&self.state.display_rows());
        self.renderer.render_summary(page.total_hits);
        self.renderer
            .render_pagination(page.current_page, page.total_pages(), page.has_multiple_pages());
    }

    /// Start a fetch; any request issued earlier becomes stale
    pub fn begin_request(&mut self, params: SearchParams, page: u64) -> PageRequest {
        self.last_issued += 1;
        PageRequest {
            seq: self.last_issued,
            params,
            page,
        }
    }

    /// Apply the result of `request` if it is still the latest one.
    ///
    /// On success the request's params become the stored params and its page
    /// is loaded. On failure the error is reported to the renderer and
    /// returned; the shown page and cursor stay as they were.
    pub fn complete(
        &mut self,
        request: PageRequest,
        result: Result<SearchPage, QueryError>,
    ) -> Result<PageOutcome, QueryError> {
        if request.seq != self.last_issued {
            debug!(
                "Dropping response to request {} (latest is {})",
                request.seq, self.last_issued
            );
            return Ok(PageOutcome::Stale);
        }

        match result {
            Ok(page) => {
                self.state.set_params(request.params);
                self.load_page(&page.rows, page.total_hits, request.page);
                Ok(PageOutcome::Loaded)
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                self.renderer.show_error(&format!("Search failed: {}", e));
                Err(e)
            }
        }
    }

    async fn fetch(&mut self, params: SearchParams, page: u64) -> Result<PageOutcome, QueryError> {
        let request = self.begin_request(params, page);

        self.renderer.set_busy(true);
        let result = self.gateway.search(&request.params, request.page).await;
        self.renderer.set_busy(false);

        self.complete(request, result)
    }

    /// Run a new search from page 1.
    ///
    /// After a successful search the session hook, if any, opens a session
    /// for it. A failing hook is reported but does not undo the search.
    pub async fn new_search(&mut self, params: SearchParams) -> Result<PageOutcome, QueryError> {
        let title = params.session_title(&self.untitled_title);
        info!("New search: '{}'", params.search_text.trim());

        let outcome = self.fetch(params, 1).await?;
        if outcome != PageOutcome::Loaded {
            return Ok(outcome);
        }

        if let Some(hook) = self.session_hook.clone() {
            if let Err(e) = hook.create_and_select_session(&title).await {
                warn!("Could not open a session for the search: {}", e);
                self.renderer
                    .show_error(&format!("Creating a new session failed: {}", e));
            }
        }

        Ok(outcome)
    }

    pub async fn next_page(&mut self) -> Result<PageOutcome, QueryError> {
        let Some(page) = self.state.next_target() else {
            return Ok(PageOutcome::Unchanged);
        };
        self.fetch_stored(page).await
    }

    pub async fn previous_page(&mut self) -> Result<PageOutcome, QueryError> {
        let Some(page) = self.state.previous_target() else {
            return Ok(PageOutcome::Unchanged);
        };
        self.fetch_stored(page).await
    }

    async fn fetch_stored(&mut self, page: u64) -> Result<PageOutcome, QueryError> {
        let Some(params) = self.state.params().cloned() else {
            return Ok(PageOutcome::Unchanged);
        };
        self.fetch(params, page).await
    }
}
