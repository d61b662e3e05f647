//! Human-facing document numbers (`PO-20240501-0007`).

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PurchaseOrder,
    PurchaseReturn,
}

impl DocumentKind {
    fn prefix(self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::PurchaseReturn => "PR",
        }
    }
}

/// Next number for `date`, one past the highest same-day number in `existing`.
///
/// Numbers from other days or with another prefix are ignored, so the daily
/// counter restarts at 0001.
pub fn next_document_number<'a>(
    kind: DocumentKind,
    date: NaiveDate,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    let day_prefix = format!("{}-{}-", kind.prefix(), date.format("%Y%m%d"));
    let highest = existing
        .into_iter()
        .filter_map(|n| n.strip_prefix(&day_prefix))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{day_prefix}{:04}", highest + 1)
}
