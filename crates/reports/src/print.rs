//! Print staging and the printable HTML document.
//!
//! A session stages at most one report at a time. The browser prints the
//! rendered document (or saves it as PDF).

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use proventory_core::DomainError;

use crate::table::{Table, Tabular};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub summary: Vec<String>,
}

impl StagedReport {
    pub fn new(
        title: impl Into<String>,
        view: &impl Tabular,
        summary: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("report title cannot be empty"));
        }
        let columns = view.headers();
        if columns.is_empty() {
            return Err(DomainError::validation("report needs at least one column"));
        }
        Ok(Self {
            title,
            generated_at: now,
            columns,
            rows: view.rows(),
            summary,
        })
    }

    pub fn table(&self) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.clone(),
        }
    }
}

/// Per-session staging slot.
#[derive(Debug, Clone, Default)]
pub struct PrintStage {
    staged: Option<StagedReport>,
}

impl PrintStage {
    /// Replaces whatever was staged before and returns it.
    pub fn stage(&mut self, report: StagedReport) -> Option<StagedReport> {
        self.staged.replace(report)
    }

    pub fn current(&self) -> Option<&StagedReport> {
        self.staged.as_ref()
    }

    /// Returns whether anything was staged.
    pub fn clear(&mut self) -> bool {
        self.staged.take().is_some()
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:sans-serif;margin:24px}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #999;padding:4px 8px;text-align:left}\
th{background:#eee}\
@media print{button{display:none}}";

/// Self-contained printable document for a staged report.
pub fn render_html(report: &StagedReport) -> String {
    let mut html = String::new();
    let title = escape(&report.title);

    // Writing into a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title><style>{STYLE}</style></head><body>\n"
    );
    let _ = writeln!(html, "<h1>{title}</h1>");
    let _ = writeln!(
        html,
        "<p>Generated {}</p>",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    html.push_str("<table>\n<thead><tr>");
    for col in &report.columns {
        let _ = write!(html, "<th>{}</th>", escape(col));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in &report.rows {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td>{}</td>", escape(cell));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");

    if !report.summary.is_empty() {
        html.push_str("<ul class=\"summary\">\n");
        for line in &report.summary {
            let _ = writeln!(html, "<li>{}</li>", escape(line));
        }
        html.push_str("</ul>\n");
    }

    html.push_str("<button onclick=\"window.print()\">Print</button>\n</body></html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(title: &str) -> StagedReport {
        let mut t = Table::new(["Name", "Qty"]);
        t.push_row(["<script>", "3"]);
        StagedReport::new(title, &t, vec!["Total: 3".to_string()], Utc::now()).unwrap()
    }

    #[test]
    fn staging_replaces_previous_report() {
        let mut stage = PrintStage::default();
        assert!(stage.stage(report("First")).is_none());
        let previous = stage.stage(report("Second")).unwrap();
        assert_eq!(previous.title, "First");
        assert_eq!(stage.current().unwrap().title, "Second");
        assert!(stage.clear());
        assert!(!stage.clear());
        assert!(stage.current().is_none());
    }

    #[test]
    fn html_escapes_cells_and_title() {
        let html = render_html(&report("Stock & Value"));
        assert!(html.contains("<title>Stock &amp; Value</title>"));
        assert!(html.contains("<td>&lt;script&gt;</td>"));
        assert!(!html.contains("<td><script>"));
        assert!(html.contains("<li>Total: 3</li>"));
    }

    #[test]
    fn blank_title_or_no_columns_is_rejected() {
        let t = Table::new(["a"]);
        assert!(StagedReport::new(" ", &t, Vec::new(), Utc::now()).is_err());
        let empty = Table::default();
        assert!(StagedReport::new("x", &empty, Vec::new(), Utc::now()).is_err());
    }
}
