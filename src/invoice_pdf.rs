use std::{fs, io::BufWriter, path::Path};

use chrono::NaiveDate;
use printpdf::{
    image_crate::{self, GenericImageView},
    BuiltinFont, Color, Greyscale, Image, ImageTransform, IndirectFontRef, Line, Mm,
    PdfDocument, PdfDocumentReference, PdfLayerReference, Point,
};

use crate::{
    business::BusinessProfile,
    customers::Customer,
    discount::{invoice_totals, Discount},
    error::{AppError, AppResult},
    ledger::Ledger,
    snapshot::{self, DiscountDescriptor, InvoiceSnapshot},
};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 25.0;
const MARGIN_RIGHT: f32 = PAGE_WIDTH - 25.0;
const TABLE_TOP: f32 = 270.0;
// Rows stop here; below is reserved for the footer.
const TABLE_BOTTOM: f32 = 45.0;
const SUMMARY_HEIGHT: f32 = 40.0;
const FOOTER_Y: f32 = 22.0;
const LOGO_SIZE: f32 = 35.0;
const MAX_PRODUCT_CHARS: usize = 38;

const COL_POS: f32 = MARGIN_LEFT;
const COL_PRODUCT: f32 = 38.0;
// Right edges of the numeric columns.
const COL_QTY: f32 = 125.0;
const COL_PRICE: f32 = 155.0;
const COL_SUM: f32 = MARGIN_RIGHT;

pub struct RenderInput<'a> {
    pub ledger: &'a Ledger,
    pub customer: Option<&'a Customer>,
    pub profile: &'a BusinessProfile,
    pub logo: Option<&'a [u8]>,
    pub discount: Option<&'a Discount>,
    pub date: NaiveDate,
    pub invoice_number: &'a str,
}

#[derive(Debug, Clone)]
pub struct RenderedInvoice {
    pub bytes: Vec<u8>,
    pub snapshot: InvoiceSnapshot,
}

pub fn format_money(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, dec_part)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

// Helvetica averages about half an em per glyph; good enough for right alignment.
fn approx_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * 0.5 * 0.3528
}

struct Canvas<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    profile: &'a BusinessProfile,
    y: f32,
    pages: usize,
}

impl<'a> Canvas<'a> {
    fn text(&self, text: &str, bold: bool, font_size: f32, x: f32, y: f32) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.layer.use_text(text, font_size, Mm(x), Mm(y), font);
    }

    fn text_right(&self, text: &str, bold: bool, font_size: f32, right: f32, y: f32) {
        let x = right - approx_text_width(text, font_size);
        self.text(text, bold, font_size, x, y);
    }

    fn rule(&self, y: f32) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN_LEFT), Mm(y)), false),
                (Point::new(Mm(MARGIN_RIGHT), Mm(y)), false),
            ],
            is_closed: false,
        });
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.pages += 1;
        self.y = TABLE_TOP;
        self.draw_footer();
    }

    fn ensure_room(&mut self, height: f32) -> bool {
        if self.y - height >= TABLE_BOTTOM {
            return false;
        }
        self.new_page();
        true
    }

    fn draw_footer(&self) {
        let p = self.profile;
        let mut y = FOOTER_Y;

        let contact = join_non_empty(&[
            p.phone.as_str(),
            p.fax.as_str(),
            p.email.as_str(),
            p.website.as_str(),
        ]);
        let bank = join_non_empty(&[
            p.bank_name.as_str(),
            labelled("IBAN", &p.iban).as_str(),
            labelled("BIC", &p.bic).as_str(),
            p.account_holder.as_str(),
        ]);
        let company = join_non_empty(&[
            p.company_name.as_str(),
            p.address.as_str(),
            labelled("VAT ID", &p.vat_id).as_str(),
        ]);

        self.rule(y + 5.0);
        for line in [company, contact, bank] {
            if !line.is_empty() {
                self.text(&line, false, 7.5, MARGIN_LEFT, y);
                y -= 4.0;
            }
        }
    }

    fn draw_logo(&self, bytes: &[u8]) {
        let decoded = match image_crate::load_from_memory(bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(error = %err, "logo could not be decoded, skipping");
                return;
            }
        };

        let (width_px, height_px) = decoded.dimensions();
        if width_px == 0 || height_px == 0 {
            return;
        }

        let dpi = 300.0;
        let natural_width = width_px as f32 / dpi * 25.4;
        let natural_height = height_px as f32 / dpi * 25.4;
        let scale = (LOGO_SIZE / natural_width).min(LOGO_SIZE / natural_height);

        Image::from_dynamic_image(&decoded).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN_RIGHT - natural_width * scale)),
                translate_y: Some(Mm(PAGE_HEIGHT - 25.0 - natural_height * scale)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }

    fn draw_header(&mut self, input: &RenderInput<'_>) {
        if let Some(logo) = input.logo {
            self.draw_logo(logo);
        }

        let mut y = PAGE_HEIGHT - 35.0;
        let profile = input.profile;
        self.text(&profile.company_name, true, 12.0, MARGIN_LEFT, y);
        y -= 5.0;
        self.text(&profile.address, false, 10.0, MARGIN_LEFT, y);
        y -= 20.0;

        if let Some(customer) = input.customer {
            self.text(&customer.name, true, 11.0, MARGIN_LEFT, y);
            let mut line_y = y - 5.0;
            let zip_city = join_with(&[customer.zip_code.as_str(), customer.city.as_str()], " ");
            for line in [
                customer.contact_name.as_str(),
                customer.address.as_str(),
                zip_city.as_str(),
                customer.country.as_str(),
            ] {
                if !line.is_empty() {
                    self.text(line, false, 10.0, MARGIN_LEFT, line_y);
                    line_y -= 5.0;
                }
            }
            self.text_right(
                &format!("Customer no.: {}", customer.id),
                false,
                10.0,
                MARGIN_RIGHT,
                y,
            );
        }
        self.text_right(
            &format!("Date: {}", input.date.format("%d.%m.%Y")),
            false,
            10.0,
            MARGIN_RIGHT,
            y - 6.0,
        );

        y -= 35.0;
        self.text(
            &format!("Invoice No. {}", input.invoice_number),
            true,
            16.0,
            MARGIN_LEFT,
            y,
        );
        self.y = y - 15.0;
    }

    fn draw_table_header(&mut self) {
        let y = self.y;
        self.text("Pos", true, 10.0, COL_POS, y);
        self.text("Product", true, 10.0, COL_PRODUCT, y);
        self.text_right("Qty", true, 10.0, COL_QTY, y);
        self.text_right("Unit price", true, 10.0, COL_PRICE, y);
        self.text_right("Total", true, 10.0, COL_SUM, y);
        self.rule(y - 3.0);
        self.y = y - 9.0;
    }

    fn draw_row(&mut self, pos: &str, product: &str, qty: &str, price: &str, sum: &str) {
        if self.ensure_room(6.0) {
            self.draw_table_header();
        }
        let y = self.y;
        self.text(pos, false, 9.0, COL_POS, y);
        self.text(&truncate(product, MAX_PRODUCT_CHARS), false, 9.0, COL_PRODUCT, y);
        self.text_right(qty, false, 9.0, COL_QTY, y);
        self.text_right(price, false, 9.0, COL_PRICE, y);
        self.text_right(sum, false, 9.0, COL_SUM, y);
        self.y -= 6.0;
    }

    fn draw_summary(&mut self, net: f64, tax: f64, gross: f64) {
        self.ensure_room(SUMMARY_HEIGHT);
        self.y -= 2.0;
        self.rule(self.y);
        self.y -= 8.0;

        let label_x = MARGIN_RIGHT - 30.0;
        self.text_right("Net total:", false, 10.0, label_x, self.y);
        self.text_right(&format_money(net), false, 10.0, MARGIN_RIGHT, self.y);
        self.y -= 6.0;
        self.text_right("VAT (19%):", false, 10.0, label_x, self.y);
        self.text_right(&format_money(tax), false, 10.0, MARGIN_RIGHT, self.y);
        self.y -= 6.0;
        self.text_right("Total amount:", true, 11.0, label_x, self.y);
        self.text_right(&format_money(gross), true, 11.0, MARGIN_RIGHT, self.y);
        self.y -= 10.0;

        self.layer
            .set_fill_color(Color::Greyscale(Greyscale::new(0.5, None)));
        self.text("Thank you for your purchase!", false, 9.0, MARGIN_LEFT, self.y);
        self.layer
            .set_fill_color(Color::Greyscale(Greyscale::new(0.0, None)));
    }
}

fn labelled(label: &str, value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        format!("{}: {}", label, value)
    }
}

fn join_with(parts: &[&str], separator: &str) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(separator)
}

fn join_non_empty(parts: &[&str]) -> String {
    join_with(parts, " | ")
}

/// Draws the invoice and returns the bare PDF bytes, without the data block.
fn render_document(input: &RenderInput<'_>) -> AppResult<Vec<u8>> {
    let (doc, page1, layer1) = PdfDocument::new(
        format!("Invoice {}", input.invoice_number),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::Render(e.to_string()))?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::Render(e.to_string()))?;

    let pages = {
        let mut canvas = Canvas {
            doc: &doc,
            layer: doc.get_page(page1).get_layer(layer1),
            font,
            font_bold,
            profile: input.profile,
            y: TABLE_TOP,
            pages: 1,
        };
        canvas.draw_footer();
        canvas.draw_header(input);
        canvas.draw_table_header();

        for (idx, line) in input.ledger.lines().iter().enumerate() {
            canvas.draw_row(
                &(idx + 1).to_string(),
                line.product(),
                &line.quantity().to_string(),
                &format_money(line.unit_price()),
                &format_money(line.sum()),
            );
        }

        let totals = invoice_totals(input.ledger.totals().net, input.discount);
        if totals.discount > 0.0 {
            canvas.draw_row("", "Discount", "", "", &format_money(-totals.discount));
        }
        canvas.draw_summary(totals.net, totals.tax, totals.gross);
        canvas.pages
    };

    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|e| AppError::Render(e.to_string()))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Render(e.to_string()))?;

    tracing::debug!(pages, bytes = bytes.len(), "invoice pdf drawn");
    Ok(bytes)
}

/// Renders the invoice and appends its snapshot after the end of the PDF.
pub fn render(input: &RenderInput<'_>) -> AppResult<RenderedInvoice> {
    let mut bytes = render_document(input)?;

    let totals = invoice_totals(input.ledger.totals().net, input.discount);
    let discount = input
        .discount
        .filter(|d| d.is_effective())
        .map(|d| DiscountDescriptor {
            mode: d.mode,
            value: d.value,
            applied: totals.discount,
        });

    let snapshot = InvoiceSnapshot::capture(
        input.date,
        Some(input.invoice_number.to_string()),
        input.ledger,
        discount,
        input.customer,
    );
    snapshot::embed(&mut bytes, &snapshot)?;

    Ok(RenderedInvoice { bytes, snapshot })
}

/// Reads back the snapshot of a rendered invoice.
pub fn load(document: &[u8]) -> AppResult<InvoiceSnapshot> {
    snapshot::extract(document)
}

pub fn write_invoice_file(path: &Path, bytes: &[u8]) -> AppResult<()> {
    fs::write(path, bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "invoice written");
    Ok(())
}

pub fn read_invoice_file(path: &Path) -> AppResult<Vec<u8>> {
    Ok(fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::DiscountMode;

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }

    fn sample_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        let id = ledger.add_product("Widget", 9.5);
        ledger.set_quantity(id, 2);
        ledger.add_product("Gadget", 4.25);
        ledger
    }

    fn sample_customer() -> Customer {
        Customer {
            id: 7,
            name: "Kunde GmbH".to_string(),
            contact_name: "Max Mustermann".to_string(),
            email: String::new(),
            phone: String::new(),
            address: "Beispielstrasse 45".to_string(),
            zip_code: "54321".to_string(),
            city: "Beispielstadt".to_string(),
            country: String::new(),
            tax_number: String::new(),
            notes: String::new(),
        }
    }

    fn input<'a>(
        ledger: &'a Ledger,
        profile: &'a BusinessProfile,
        customer: Option<&'a Customer>,
        discount: Option<&'a Discount>,
    ) -> RenderInput<'a> {
        RenderInput {
            ledger,
            customer,
            profile,
            logo: None,
            discount,
            date: NaiveDate::from_ymd_opt(2025, 5, 10).expect("date"),
            invoice_number: "RE-1001",
        }
    }

    #[test]
    fn format_money_groups_thousands() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(19.999), "20.00");
        assert_eq!(format_money(1234567.891), "1,234,567.89");
        assert_eq!(format_money(-15.97), "-15.97");
        assert_eq!(format_money(-0.001), "0.00");
    }

    #[test]
    fn truncate_shortens_long_names() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long product name", 10), "a very ...");
    }

    #[test]
    fn rendered_document_is_pdf_with_trailing_snapshot() {
        let ledger = sample_ledger();
        let profile = BusinessProfile::default();
        let rendered = render(&input(&ledger, &profile, None, None)).expect("render");

        assert!(rendered.bytes.starts_with(b"%PDF"));
        let eof = find(&rendered.bytes, b"%%EOF").expect("eof marker");
        let start = find(&rendered.bytes, snapshot::START_MARKER).expect("start marker");
        assert!(eof < start);
        assert!(rendered.bytes.ends_with(snapshot::END_MARKER));
    }

    #[test]
    fn round_trip_recovers_pre_discount_items_in_order() {
        let ledger = sample_ledger();
        let profile = BusinessProfile {
            company_name: "Musterfirma GmbH".to_string(),
            iban: "DE02120300000000202051".to_string(),
            ..BusinessProfile::default()
        };
        let customer = sample_customer();
        let discount = Discount::target_gross(20.0);

        let rendered = render(&input(&ledger, &profile, Some(&customer), Some(&discount)))
            .expect("render");
        let snapshot = load(&rendered.bytes).expect("load");

        assert_eq!(snapshot, rendered.snapshot);
        let items: Vec<(&str, u32, f64)> = snapshot
            .items
            .iter()
            .map(|item| (item.product.as_str(), item.quantity, item.price))
            .collect();
        assert_eq!(items, vec![("Widget", 2, 9.5), ("Gadget", 1, 4.25)]);

        let descriptor = snapshot.discount.expect("discount");
        assert_eq!(descriptor.mode, DiscountMode::TargetGross);
        assert_eq!(descriptor.value, 20.0);
        let expected_applied = 23.25 - 20.0 / 1.19;
        assert!((descriptor.applied - expected_applied).abs() < 1e-9);

        let customer_ref = snapshot.customer.expect("customer");
        assert_eq!(customer_ref.id, 7);
        assert_eq!(customer_ref.name, "Kunde GmbH");
        assert_eq!(snapshot.invoice_number.as_deref(), Some("RE-1001"));
    }

    #[test]
    fn ineffective_discount_is_not_recorded() {
        let ledger = sample_ledger();
        let profile = BusinessProfile::default();
        let discount = Discount::fixed_amount(0.0);
        let rendered =
            render(&input(&ledger, &profile, None, Some(&discount))).expect("render");
        assert!(rendered.snapshot.discount.is_none());
    }

    #[test]
    fn many_lines_spill_onto_further_pages() {
        let mut ledger = Ledger::new();
        for n in 0..120 {
            ledger.add_product(&format!("Item {n}"), 1.0);
        }
        let profile = BusinessProfile::default();
        let rendered = render(&input(&ledger, &profile, None, None)).expect("render");

        let snapshot = load(&rendered.bytes).expect("load");
        assert_eq!(snapshot.items.len(), 120);
        assert_eq!(snapshot.items[119].product, "Item 119");
    }

    #[test]
    fn undecodable_logo_is_skipped() {
        let garbage = b"definitely not an image".to_vec();
        let ledger = sample_ledger();
        let profile = BusinessProfile::default();
        let mut request = input(&ledger, &profile, None, None);
        request.logo = Some(garbage.as_slice());

        let rendered = render(&request).expect("render");
        assert!(load(&rendered.bytes).is_ok());
    }

    fn png_logo() -> Vec<u8> {
        let image = image_crate::RgbImage::from_pixel(8, 4, image_crate::Rgb([200, 30, 30]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image_crate::DynamicImage::ImageRgb8(image)
            .write_to(&mut bytes, image_crate::ImageOutputFormat::Png)
            .expect("encode png");
        bytes.into_inner()
    }

    fn has_image_xobject(bytes: &[u8]) -> bool {
        find(bytes, b"/Subtype /Image").is_some() || find(bytes, b"/Subtype/Image").is_some()
    }

    #[test]
    fn png_logo_is_embedded_as_image() {
        let logo = png_logo();
        let ledger = sample_ledger();
        let profile = BusinessProfile::default();

        let plain = render(&input(&ledger, &profile, None, None)).expect("render");
        assert!(!has_image_xobject(&plain.bytes));

        let mut request = input(&ledger, &profile, None, None);
        request.logo = Some(logo.as_slice());
        let rendered = render(&request).expect("render");

        assert!(has_image_xobject(&rendered.bytes));
        assert_eq!(load(&rendered.bytes).expect("load"), rendered.snapshot);
    }

    #[test]
    fn empty_ledger_still_renders() {
        let ledger = Ledger::new();
        let profile = BusinessProfile::default();
        let rendered = render(&input(&ledger, &profile, None, None)).expect("render");
        assert!(load(&rendered.bytes).expect("load").items.is_empty());
    }

    #[test]
    fn invoice_file_round_trips_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("invoice.pdf");
        let ledger = sample_ledger();
        let profile = BusinessProfile::default();
        let rendered = render(&input(&ledger, &profile, None, None)).expect("render");

        write_invoice_file(&path, &rendered.bytes).expect("write");
        let bytes = read_invoice_file(&path).expect("read");
        assert_eq!(load(&bytes).expect("load"), rendered.snapshot);
    }
}
