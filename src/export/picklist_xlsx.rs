use rust_xlsxwriter::{Format, Workbook};

use super::ExportError;
use crate::database::models::{Event, PicklistRow};

const HEADERS: [&str; 7] = ["SKU", "Name", "Category", "Quantity", "Unit", "Status", "Notes"];
const WIDTHS: [f64; 7] = [14.0, 36.0, 18.0, 10.0, 8.0, 10.0, 40.0];

/// Row of the column headers; rows above it hold the sheet title
const HEADER_ROW: u32 = 2;

pub fn sheet_title(event: &Event) -> String {
    format!("{} ({})", event.title, event.start_at.format("%Y-%m-%d"))
}

/// Pick-list workbook: a title row, a bold header row, then one row per item
pub fn render_picklist(event: &Event, rows: &[PicklistRow]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let title = Format::new().set_bold().set_font_size(14);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Pick list")?;
    worksheet.write_string_with_format(0, 0, sheet_title(event), &title)?;

    for (col, (header, width)) in HEADERS.iter().zip(WIDTHS).enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(HEADER_ROW, col, *header, &bold)?;
        worksheet.set_column_width(col, width)?;
    }

    for (offset, row) in rows.iter().enumerate() {
        let r = HEADER_ROW + 1 + offset as u32;
        worksheet.write_string(r, 0, &row.sku)?;
        worksheet.write_string(r, 1, &row.name)?;
        worksheet.write_string(r, 2, row.category.as_deref().unwrap_or(""))?;
        worksheet.write_number(r, 3, row.quantity as f64)?;
        worksheet.write_string(r, 4, &row.unit)?;
        worksheet.write_string(r, 5, &row.status)?;
        worksheet.write_string(r, 6, row.notes.as_deref().unwrap_or(""))?;
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn event() -> Event {
        let start = Utc.with_ymd_and_hms(2024, 9, 14, 16, 0, 0).unwrap();
        testing::event("Harbour Festival", start, 8)
    }

    #[test]
    fn title_has_event_date() {
        assert_eq!(sheet_title(&event()), "Harbour Festival (2024-09-14)");
    }

    #[test]
    fn renders_an_xlsx_archive() {
        let rows = vec![PicklistRow {
            item_id: Uuid::new_v4(),
            sku: "MIC-SM58".into(),
            name: "Shure SM58".into(),
            category: Some("Audio".into()),
            unit: "pcs".into(),
            quantity: 12,
            status: "reserved".into(),
            notes: None,
        }];
        let bytes = render_picklist(&event(), &rows).unwrap();
        // xlsx files are zip archives
        assert!(bytes.starts_with(b"PK"));
    }
}
