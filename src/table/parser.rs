use super::types::*;
use crate::{Error, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

/// Parses the model's CSV output into item rows.
///
/// Column names and cells are trimmed, an `ID` column is dropped, and the
/// remaining header must be exactly [`COLUMNS`] (any order). The first cell
/// that fails to parse aborts the whole batch.
pub fn parse(text: &str) -> Result<Vec<ItemRow>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::processing(format!("Unreadable header row: {e}")))?
        .clone();

    if headers.iter().all(str::is_empty) {
        return Err(Error::processing("Extraction output has no header row"));
    }

    let layout = ColumnLayout::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 1;
        let record =
            record.map_err(|e| Error::processing(format!("Row {line} is not valid CSV: {e}")))?;

        if record.iter().all(str::is_empty) {
            continue;
        }

        if record.len() != headers.len() {
            return Err(Error::processing(format!(
                "Row {line} has {} fields, expected {}",
                record.len(),
                headers.len()
            )));
        }

        rows.push(layout.read_row(&record, line)?);
    }

    debug!("Parsed {} item rows", rows.len());
    Ok(rows)
}

/// Renders rows back to CSV with the canonical header and no `ID` column.
pub fn to_csv(rows: &[ItemRow]) -> Result<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(COLUMNS)?;

    for row in rows {
        let price = row.item_price.to_string();
        let date = row.date.format(DATE_FORMAT).to_string();
        writer.write_record([
            row.item_name.as_str(),
            row.item_category.as_str(),
            price.as_str(),
            row.location.as_str(),
            date.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::internal(format!("Failed to flush CSV writer: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::internal(format!("CSV output is not UTF-8: {e}")))
}

/// Position of each expected column within a header row.
struct ColumnLayout {
    positions: [usize; COLUMNS.len()],
}

impl ColumnLayout {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut positions = [None; COLUMNS.len()];

        for (position, name) in headers.iter().enumerate() {
            if name == ID_COLUMN {
                continue;
            }

            let slot = COLUMNS
                .iter()
                .position(|column| *column == name)
                .ok_or_else(|| Error::processing(format!("Unexpected column '{name}'")))?;

            if positions[slot].replace(position).is_some() {
                return Err(Error::processing(format!("Duplicate column '{name}'")));
            }
        }

        let missing: Vec<&str> = COLUMNS
            .iter()
            .zip(positions.iter())
            .filter(|(_, position)| position.is_none())
            .map(|(column, _)| *column)
            .collect();

        if !missing.is_empty() {
            return Err(Error::processing(format!(
                "Missing column(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            positions: positions.map(Option::unwrap_or_default),
        })
    }

    fn cell<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        let slot = COLUMNS.iter().position(|c| *c == column).unwrap_or_default();
        record.get(self.positions[slot]).unwrap_or_default()
    }

    fn read_row(&self, record: &StringRecord, line: usize) -> Result<ItemRow> {
        let raw_price = self.cell(record, ITEM_PRICE);
        let item_price = Decimal::from_str(raw_price).map_err(|e| {
            Error::processing(format!(
                "Row {line}, column '{ITEM_PRICE}': '{raw_price}' is not a decimal ({e})"
            ))
        })?;

        let raw_date = self.cell(record, DATE);
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|e| {
            Error::processing(format!(
                "Row {line}, column '{DATE}': '{raw_date}' is not a YYYY-MM-DD date ({e})"
            ))
        })?;

        Ok(ItemRow {
            item_name: self.cell(record, ITEM_NAME).to_string(),
            item_category: self.cell(record, ITEM_CATEGORY).to_string(),
            item_price,
            location: self.cell(record, LOCATION).to_string(),
            date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn price(raw: &str) -> Decimal {
        Decimal::from_str(raw).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_single_row_drops_id() {
        let rows = parse(
            "ID,Item Name,Item Category,Item Price,Location,Date\n1,X,Y,1.00,Z,2025-01-01",
        )
        .unwrap();

        assert_eq!(
            rows,
            vec![ItemRow {
                item_name: "X".to_string(),
                item_category: "Y".to_string(),
                item_price: price("1.00"),
                location: "Z".to_string(),
                date: date(2025, 1, 1),
            }]
        );
    }

    #[test]
    fn test_sample_output_parses() {
        let rows = parse(SAMPLE_OUTPUT).unwrap();

        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].item_name, "US Tomato");
        assert_eq!(rows[0].item_price.to_string(), "7.00");
        assert_eq!(rows[2].item_name, "Carrot Large & Short");
        assert_eq!(rows[6].item_name, "Snow Peas");
        assert!(rows.iter().all(|r| r.location == "Test Supermarket"));
        assert!(rows.iter().all(|r| r.date == date(2025, 1, 25)));
    }

    #[test]
    fn test_headers_and_cells_are_trimmed() {
        let rows = parse(
            " Item Name , Item Category,Item Price ,Location, Date \n  Milk , Dairy , 2.49 , Corner Shop , 2024-12-31 \n",
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_name, "Milk");
        assert_eq!(rows[0].item_category, "Dairy");
        assert_eq!(rows[0].item_price, price("2.49"));
        assert_eq!(rows[0].location, "Corner Shop");
    }

    #[test]
    fn test_columns_in_any_order() {
        let rows =
            parse("Date,Location,Item Price,Item Category,Item Name\n2025-02-03,Mart,3.10,Bakery,Bagel")
                .unwrap();

        assert_eq!(rows[0].item_name, "Bagel");
        assert_eq!(rows[0].item_category, "Bakery");
        assert_eq!(rows[0].date, date(2025, 2, 3));
    }

    #[test]
    fn test_quoted_fields_with_commas() {
        let rows = parse(
            "Item Name,Item Category,Item Price,Location,Date\n\"Chips, Salted\",Snacks,1.99,\"Mart, Downtown\",2025-03-01",
        )
        .unwrap();

        assert_eq!(rows[0].item_name, "Chips, Salted");
        assert_eq!(rows[0].location, "Mart, Downtown");
    }

    #[test]
    fn test_header_only_yields_no_rows() {
        let rows = parse("ID,Item Name,Item Category,Item Price,Location,Date\n").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let rows = parse(
            "Item Name,Item Category,Item Price,Location,Date\n\nTea,Drinks,4.00,Cafe,2025-01-02\n   \n",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[rstest]
    #[case::empty("", "no header row")]
    #[case::whitespace("   \n", "no header row")]
    #[case::missing_date("Item Name,Item Category,Item Price,Location\nA,B,1.00,C", "Missing column(s): Date")]
    #[case::unexpected("Item Name,Item Category,Item Price,Location,Date,Qty\nA,B,1.00,C,2025-01-01,2", "Unexpected column 'Qty'")]
    #[case::lowercase_id("id,Item Name,Item Category,Item Price,Location,Date\n1,A,B,1.00,C,2025-01-01", "Unexpected column 'id'")]
    #[case::duplicate("Item Name,Item Name,Item Category,Item Price,Location,Date\nA,A,B,1.00,C,2025-01-01", "Duplicate column 'Item Name'")]
    #[case::bad_price("Item Name,Item Category,Item Price,Location,Date\nA,B,$1.00,C,2025-01-01", "Row 1, column 'Item Price'")]
    #[case::bad_date("Item Name,Item Category,Item Price,Location,Date\nA,B,1.00,C,01/25/2025", "Row 1, column 'Date'")]
    #[case::short_row("Item Name,Item Category,Item Price,Location,Date\nA,B,1.00", "Row 1 has 3 fields")]
    fn test_malformed_output_is_processing_error(#[case] text: &str, #[case] expected: &str) {
        let err = parse(text).unwrap_err();
        assert!(matches!(err, Error::Processing(_)), "got {err:?}");
        assert!(
            err.to_string().contains(expected),
            "expected '{expected}' in '{err}'"
        );
    }

    #[test]
    fn test_bad_cell_aborts_whole_batch() {
        let err = parse(
            "Item Name,Item Category,Item Price,Location,Date\nA,B,1.00,C,2025-01-01\nD,E,oops,F,2025-01-01\nG,H,2.00,I,2025-01-01",
        )
        .unwrap_err();

        assert!(err.to_string().contains("Row 2"));
    }

    #[test]
    fn test_parse_is_idempotent_through_csv() {
        let first = parse(SAMPLE_OUTPUT).unwrap();
        let rendered = to_csv(&first).unwrap();
        let second = parse(&rendered).unwrap();

        assert_eq!(first, second);
        assert!(rendered.starts_with("Item Name,Item Category,Item Price,Location,Date\n"));
        assert!(!rendered.contains("ID"));
    }
}
