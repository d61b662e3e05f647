//! Exports and printable reports built from already-fetched records.

pub mod csv_export;
pub mod print;
pub mod table;
pub mod views;

pub use csv_export::{ExportError, to_csv};
pub use print::{PrintStage, StagedReport, render_html};
pub use table::{Table, Tabular};
pub use views::{ReportView, format_money, items_summary, items_table, orders_table, parties_table};
