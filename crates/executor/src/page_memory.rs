//! Per-run page memory: which pages were touched, what was found.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct PageVisit {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub visited_count: u32,
    pub last_visited: DateTime<Utc>,
    pub key_info: Vec<String>,
}

/// Best-effort visit bookkeeping, keyed by URL with trailing slashes
/// ignored. Insertion order is preserved for the summary.
#[derive(Default)]
pub struct TaskMemory {
    pages: Vec<PageVisit>,
    findings: Vec<String>,
}

fn visit_key(url: &str) -> &str {
    url.trim_end_matches('/')
}

impl TaskMemory {
    pub fn new() -> Self {
        TaskMemory::default()
    }

    /// Record a visit; repeated visits to the same page bump the counter.
    pub fn record_visit(&mut self, url: &str, title: &str) {
        let key = visit_key(url).to_string();
        if let Some(page) = self.pages.iter_mut().find(|p| visit_key(&p.url) == key) {
            page.visited_count += 1;
            page.last_visited = Utc::now();
            if !title.is_empty() && page.title.is_empty() {
                page.title = title.to_string();
            }
            return;
        }
        self.pages.push(PageVisit {
            url: url.to_string(),
            title: title.to_string(),
            summary: String::new(),
            visited_count: 1,
            last_visited: Utc::now(),
            key_info: Vec::new(),
        });
    }

    /// Record a distinct textual finding.
    pub fn add_finding(&mut self, finding: &str) {
        let text = finding.trim();
        if !text.is_empty() && !self.findings.iter().any(|f| f == text) {
            self.findings.push(text.to_string());
        }
    }

    pub fn pages(&self) -> &[PageVisit] {
        &self.pages
    }

    /// Human-readable summary for the trajectory-completion event.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.pages.is_empty() {
            let lines: Vec<String> = self
                .pages
                .iter()
                .map(|page| {
                    let label = if page.title.is_empty() { &page.url } else { &page.title };
                    let mut line = format!("- {} ({})", label, page.url);
                    if !page.summary.is_empty() {
                        line.push_str(": ");
                        line.push_str(&page.summary);
                    }
                    line
                })
                .collect();
            parts.push(format!("Visited pages:\n{}", lines.join("\n")));
        }
        if !self.findings.is_empty() {
            let lines: Vec<String> = self.findings.iter().map(|f| format!("- {f}")).collect();
            parts.push(format!("Findings:\n{}", lines.join("\n")));
        }
        parts.join("\n\n")
    }
}
