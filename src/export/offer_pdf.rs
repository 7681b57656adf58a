//! A4 offer document: company and client header, item table, totals block.

use std::ops::Range;

use printpdf::{IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Point};
use rust_decimal::Decimal;

use super::ExportError;
use crate::config::OfferConfig;
use crate::database::models::{Offer, OfferItem};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const HEADER_HEIGHT: f32 = 80.0;
const ROW_HEIGHT: f32 = 6.0;

const FIRST_PAGE_ROWS: usize = 28;
const NEXT_PAGE_ROWS: usize = 40;
/// Row slots the totals block occupies
const TOTALS_ROWS: usize = 8;

const MAX_COMPANY_DETAILS: usize = 4;

// Unicode TrueType faces; the PDF base-14 fonts only cover WinAnsi and drop Polish letters
const FONT_REGULAR: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const FONT_BOLD: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Column x offsets in mm: #, name, qty, unit, days, unit price, discount, total
const COLUMNS: [f32; 8] = [15.0, 23.0, 110.0, 124.0, 138.0, 150.0, 170.0, 182.0];

/// Which items a page carries and whether the totals block goes on it
#[derive(Debug, Clone, PartialEq)]
pub struct PageSlice {
    pub items: Range<usize>,
    pub totals: bool,
}

/// Split `item_count` rows over pages. The totals block follows the last row
/// and moves to a page of its own when it does not fit.
pub fn layout_pages(item_count: usize) -> Vec<PageSlice> {
    let mut pages = Vec::new();
    let mut start = 0;
    let mut capacity = FIRST_PAGE_ROWS;

    loop {
        let end = (start + capacity).min(item_count);
        let used = end - start;
        let is_last = end == item_count;
        if is_last && used + TOTALS_ROWS <= capacity {
            pages.push(PageSlice { items: start..end, totals: true });
            break;
        }
        pages.push(PageSlice { items: start..end, totals: false });
        if is_last {
            pages.push(PageSlice { items: end..end, totals: true });
            break;
        }
        start = end;
        capacity = NEXT_PAGE_ROWS;
    }
    pages
}

fn pdf_error(err: impl std::fmt::Display) -> ExportError {
    ExportError::Pdf(err.to_string())
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}

fn money(value: Decimal, currency: &str) -> String {
    format!("{:.2} {}", value, currency)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn embed(doc: &PdfDocumentReference) -> Result<Self, ExportError> {
        Ok(Self {
            regular: doc.add_external_font(FONT_REGULAR).map_err(pdf_error)?,
            bold: doc.add_external_font(FONT_BOLD).map_err(pdf_error)?,
        })
    }
}

fn rule(layer: &PdfLayerReference, y: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(MARGIN), Mm(y)), false),
            (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
        ],
        is_closed: false,
    });
}

fn draw_header(layer: &PdfLayerReference, fonts: &Fonts, offer: &Offer, company: &OfferConfig) {
    let mut y = PAGE_HEIGHT - MARGIN - 5.0;
    layer.use_text(&company.company_name, 14.0, Mm(MARGIN), Mm(y), &fonts.bold);
    for detail in company.company_details.iter().take(MAX_COMPANY_DETAILS) {
        y -= 5.0;
        layer.use_text(clip(detail, 90), 9.0, Mm(MARGIN), Mm(y), &fonts.regular);
    }

    let mut y = PAGE_HEIGHT - MARGIN - 35.0;
    layer.use_text(format!("Offer {}", offer.offer_number), 16.0, Mm(MARGIN), Mm(y), &fonts.bold);
    y -= 7.0;
    layer.use_text(clip(&offer.title, 80), 11.0, Mm(MARGIN), Mm(y), &fonts.regular);

    y -= 8.0;
    layer.use_text(
        format!("Issued: {}", offer.created_at.format("%Y-%m-%d")),
        9.0,
        Mm(MARGIN),
        Mm(y),
        &fonts.regular,
    );
    if let Some(valid_until) = offer.valid_until {
        layer.use_text(
            format!("Valid until: {}", valid_until.format("%Y-%m-%d")),
            9.0,
            Mm(MARGIN + 50.0),
            Mm(y),
            &fonts.regular,
        );
    }

    y -= 8.0;
    layer.use_text("Client:", 9.0, Mm(MARGIN), Mm(y), &fonts.bold);
    layer.use_text(clip(&offer.client_name, 70), 9.0, Mm(MARGIN + 15.0), Mm(y), &fonts.regular);
    if let Some(email) = &offer.client_email {
        y -= 5.0;
        layer.use_text(clip(email, 70), 9.0, Mm(MARGIN + 15.0), Mm(y), &fonts.regular);
    }
}

/// Returns the y of the first row
fn draw_table_header(layer: &PdfLayerReference, fonts: &Fonts, top: f32) -> f32 {
    let labels = ["#", "Item", "Qty", "Unit", "Days", "Unit price", "Disc %", "Total"];
    for (x, label) in COLUMNS.iter().zip(labels) {
        layer.use_text(label, 9.0, Mm(*x), Mm(top), &fonts.bold);
    }
    rule(layer, top - 2.0);
    top - ROW_HEIGHT - 1.0
}

fn draw_item(layer: &PdfLayerReference, fonts: &Fonts, item: &OfferItem, y: f32) {
    let cells = [
        item.position.to_string(),
        clip(&item.name, 44),
        item.quantity.normalize().to_string(),
        clip(&item.unit, 6),
        item.days.to_string(),
        format!("{:.2}", item.unit_price),
        item.discount_percent.normalize().to_string(),
        format!("{:.2}", item.line_total),
    ];
    for (x, cell) in COLUMNS.iter().zip(cells) {
        layer.use_text(cell, 9.0, Mm(*x), Mm(y), &fonts.regular);
    }
}

fn draw_totals(layer: &PdfLayerReference, fonts: &Fonts, offer: &Offer, top: f32) {
    let label_x = Mm(120.0);
    let value_x = Mm(165.0);
    let mut y = top - 4.0;
    rule(layer, y + ROW_HEIGHT - 1.0);

    let lines = [
        ("Subtotal".to_string(), offer.subtotal),
        (format!("Discount ({}%)", offer.discount_percent.normalize()), -offer.discount_amount),
        ("Net total".to_string(), offer.total_net),
        (format!("VAT ({}%)", offer.vat_rate.normalize()), offer.vat_amount),
    ];
    for (label, value) in lines {
        layer.use_text(label, 10.0, label_x, Mm(y), &fonts.regular);
        layer.use_text(money(value, &offer.currency), 10.0, value_x, Mm(y), &fonts.regular);
        y -= ROW_HEIGHT;
    }
    layer.use_text("Gross total", 11.0, label_x, Mm(y), &fonts.bold);
    layer.use_text(money(offer.total_gross, &offer.currency), 11.0, value_x, Mm(y), &fonts.bold);

    if let Some(notes) = offer.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        y -= ROW_HEIGHT * 2.0;
        layer.use_text(format!("Notes: {}", clip(notes.trim(), 100)), 9.0, Mm(MARGIN), Mm(y), &fonts.regular);
    }
}

pub fn render_offer_pdf(offer: &Offer, items: &[OfferItem], company: &OfferConfig) -> Result<Vec<u8>, ExportError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(&offer.offer_number, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "content");
    let fonts = Fonts::embed(&doc)?;

    let pages = layout_pages(items.len());
    let page_count = pages.len();
    for (index, slice) in pages.into_iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "content");
            doc.get_page(page).get_layer(layer)
        };

        let mut y = PAGE_HEIGHT - MARGIN;
        if index == 0 {
            draw_header(&layer, &fonts, offer, company);
            y -= HEADER_HEIGHT;
        }
        if !slice.items.is_empty() {
            y = draw_table_header(&layer, &fonts, y);
            for item in &items[slice.items] {
                draw_item(&layer, &fonts, item, y);
                y -= ROW_HEIGHT;
            }
        }
        if slice.totals {
            draw_totals(&layer, &fonts, offer, y);
        }

        layer.use_text(
            format!("{} - page {} of {}", offer.offer_number, index + 1, page_count),
            8.0,
            Mm(MARGIN),
            Mm(MARGIN - 5.0),
            &fonts.regular,
        );
    }

    doc.save_to_bytes().map_err(pdf_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OfferStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn offer() -> Offer {
        Offer {
            id: Uuid::new_v4(),
            offer_number: "OF/2024/0007".into(),
            year: 2024,
            sequence: 7,
            event_id: None,
            client_name: "Acme Festivals".into(),
            client_email: Some("booking@acme.test".into()),
            title: "Stage and lights".into(),
            status: OfferStatus::Draft,
            currency: "PLN".into(),
            discount_percent: Decimal::new(5, 0),
            vat_rate: Decimal::new(23, 0),
            subtotal: Decimal::new(100000, 2),
            discount_amount: Decimal::new(5000, 2),
            total_net: Decimal::new(95000, 2),
            vat_amount: Decimal::new(21850, 2),
            total_gross: Decimal::new(116850, 2),
            valid_until: None,
            notes: Some("Power on site provided by the venue".into()),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(position: i32) -> OfferItem {
        OfferItem {
            id: Uuid::new_v4(),
            offer_id: Uuid::new_v4(),
            position,
            name: format!("Moving head #{}", position),
            description: None,
            unit: "pcs".into(),
            quantity: Decimal::new(2, 0),
            days: 1,
            unit_price: Decimal::new(25000, 2),
            discount_percent: Decimal::ZERO,
            line_total: Decimal::new(50000, 2),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn short_offers_fit_one_page() {
        assert_eq!(layout_pages(0), vec![PageSlice { items: 0..0, totals: true }]);
        assert_eq!(layout_pages(10), vec![PageSlice { items: 0..10, totals: true }]);
    }

    #[test]
    fn totals_move_to_a_new_page_when_full() {
        let pages = layout_pages(FIRST_PAGE_ROWS - 2);
        assert_eq!(pages.len(), 2);
        assert!(!pages[0].totals);
        assert_eq!(pages[1], PageSlice { items: FIRST_PAGE_ROWS - 2..FIRST_PAGE_ROWS - 2, totals: true });
    }

    #[test]
    fn long_offers_cover_every_item_once() {
        let count = 100;
        let pages = layout_pages(count);
        let covered: usize = pages.iter().map(|p| p.items.len()).sum();
        assert_eq!(covered, count);
        assert_eq!(pages.iter().filter(|p| p.totals).count(), 1);
        assert!(pages.last().unwrap().totals);
        for pair in pages.windows(2) {
            assert_eq!(pair[0].items.end, pair[1].items.start);
        }
    }

    #[test]
    fn clips_long_text() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("a very long item name", 10), "a very ...");
    }

    #[test]
    fn renders_a_pdf_document() {
        let items: Vec<OfferItem> = (1..=60).map(item).collect();
        let bytes = render_offer_pdf(&offer(), &items, &crate::config::config().offers).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_polish_text_with_embedded_fonts() {
        let mut offer = offer();
        offer.client_name = "Fundacja Żółć i Gęślą Jaźń".into();
        offer.title = "Nagłośnienie sceny, oświetlenie".into();
        let mut line = item(1);
        line.name = "Łącznik kabli, źródło zasilania".into();

        let bytes = render_offer_pdf(&offer, &[line], &crate::config::config().offers).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        // a base-14 font document is a few kB; the embedded faces dominate the size
        assert!(bytes.len() > 20_000);
    }
}
