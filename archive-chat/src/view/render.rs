//! Rendering sink for the results view

use std::io::Write;
use tracing::warn;

use crate::search::{parse_date, ResultRow, SortDir, SortKey};

/// Paints what the results view hands it
pub trait Renderer: Send {
    /// Replace the shown rows; an empty slice shows an explicit empty state
    fn render_rows(&mut self, rows: &[ResultRow]);

    /// Total number of hits for the current search
    fn render_summary(&mut self, total_hits: u64);

    /// Page status and prev/next availability; hidden when there is one page
    fn render_pagination(&mut self, current_page: u64, total_pages: u64, has_multiple_pages: bool);

    /// Mark the active sort column, clear the others
    fn render_sort_indicators(&mut self, key: Option<SortKey>, dir: SortDir);

    /// Transient error notice
    fn show_error(&mut self, message: &str);

    /// Busy indicator around network calls
    fn set_busy(&mut self, _busy: bool) {}
}

const COLUMNS: [(SortKey, &str, usize); 4] = [
    (SortKey::Subject, "Subject", 32),
    (SortKey::Body, "Body", 44),
    (SortKey::Sender, "Sender", 28),
    (SortKey::Date, "Date", 12),
];

/// Plain-text table renderer for terminals
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    sort: (Option<SortKey>, SortDir),
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            sort: (None, SortDir::Asc),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            warn!("Failed to write to terminal: {}", e);
        }
    }

    fn header(&self) -> String {
        COLUMNS
            .iter()
            .map(|(key, title, width)| {
                let title = match self.sort {
                    (Some(active), SortDir::Asc) if active == *key => format!("{} ^", title),
                    (Some(active), SortDir::Desc) if active == *key => format!("{} v", title),
                    _ => title.to_string(),
                };
                pad(&title, *width)
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render_rows(&mut self, rows: &[ResultRow]) {
        if rows.is_empty() {
            self.emit("No results found.");
            self.emit("Adjust your search criteria.");
            return;
        }

        let header = self.header();
        let rule = "-".repeat(header.chars().count());
        self.emit(&header);
        self.emit(&rule);

        for row in rows {
            let date = format_date(&row.date);
            let cells = [
                row.subject.as_str(),
                row.body.as_str(),
                row.sender.as_str(),
                date.as_str(),
            ];
            let line = COLUMNS
                .iter()
                .zip(cells)
                .map(|((_, _, width), cell)| pad(&truncate(&single_line(cell), *width), *width))
                .collect::<Vec<_>>()
                .join(" | ");
            self.emit(line.trim_end());
        }
    }

    fn render_summary(&mut self, total_hits: u64) {
        self.emit(&format!("{} results found", total_hits));
    }

    fn render_pagination(&mut self, current_page: u64, total_pages: u64, has_multiple_pages: bool) {
        if !has_multiple_pages {
            return;
        }
        let prev = if current_page > 1 { "[prev]" } else { "      " };
        let next = if current_page < total_pages { "[next]" } else { "      " };
        self.emit(&format!("{} page {} of {} {}", prev, current_page, total_pages, next));
    }

    fn render_sort_indicators(&mut self, key: Option<SortKey>, dir: SortDir) {
        self.sort = (key, dir);
    }

    fn show_error(&mut self, message: &str) {
        self.emit(&format!("error: {}", message));
    }

    fn set_busy(&mut self, busy: bool) {
        if busy {
            self.emit("Searching...");
        }
    }
}

/// Short calendar date, `N/A` when empty, the raw text when unparsable
pub fn format_date(value: &str) -> String {
    if value.trim().is_empty() {
        return "N/A".to_string();
    }
    parse_date(value)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Cut `text` to `max` characters, marking the cut with `...`
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - len))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn output(renderer: TerminalRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_empty_rows_show_empty_state() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.render_rows(&[]);
        assert!(output(renderer).contains("No results found."));
    }

    #[test]
    fn test_rows_and_sort_marker() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.render_sort_indicators(Some(SortKey::Date), SortDir::Desc);
        renderer.render_rows(&[ResultRow {
            id: "1".to_string(),
            subject: "Quarterly\nreport".to_string(),
            sender: "alice@example.com".to_string(),
            date: "2024-02-01T08:00:00Z".to_string(),
            ..Default::default()
        }]);

        let text = output(renderer);
        assert!(text.contains("Date v"));
        assert!(!text.contains("Subject ^"));
        assert!(text.contains("Quarterly report"));
        assert!(text.contains("2024-02-01"));
    }

    #[test]
    fn test_pagination_hidden_for_single_page() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.render_pagination(1, 1, false);
        assert!(output(renderer).is_empty());

        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.render_pagination(1, 3, true);
        let text = output(renderer);
        assert!(text.contains("page 1 of 3"));
        assert!(text.contains("[next]"));
        assert!(!text.contains("[prev]"));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_date(""), "N/A");
        assert_eq!(format_date("someday"), "someday");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
        assert_eq!(truncate("abc", 6), "abc");
    }
}
