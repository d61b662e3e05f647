use thiserror::Error;

use crate::table::Tabular;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv output is not valid UTF-8")]
    Encoding,
}

/// Render a tabular view as CSV with a header row.
pub fn to_csv<T: Tabular + ?Sized>(view: &T) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(view.headers())?;
    for row in view.rows() {
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))?;
    String::from_utf8(bytes).map_err(|_| ExportError::Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;

    #[test]
    fn writes_header_and_quotes_awkward_cells() {
        let mut t = Table::new(["sku", "name"]);
        t.push_row(["B-1", "Bolt, hex"]);
        t.push_row(["N-2", "6\" nail"]);
        let out = to_csv(&t).unwrap();
        assert_eq!(out, "sku,name\nB-1,\"Bolt, hex\"\nN-2,\"6\"\" nail\"\n");
    }

    #[test]
    fn empty_table_still_has_header() {
        let t = Table::new(["a", "b"]);
        assert_eq!(to_csv(&t).unwrap(), "a,b\n");
    }
}
