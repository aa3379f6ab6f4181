//! Invoice rendering.
//!
//! Produces a plain PDF 1.4 file with the two standard Helvetica faces, so
//! no font data has to be embedded. Text is written in WinAnsi encoding;
//! characters outside Latin-1 are replaced with `?`.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::aggregates::{Order, User};
use crate::domain::value_objects::Money;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const ROW_HEIGHT: f32 = 18.0;
const NAME_MAX_CHARS: usize = 48;

const COL_QTY: f32 = 350.0;
const COL_UNIT_RIGHT: f32 = 470.0;
const COL_SUB_RIGHT: f32 = 545.0;

#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl InvoiceLine {
    pub fn subtotal(&self, currency: &str) -> Money { Money::new(self.unit_price, currency).multiply(self.quantity) }
}

#[derive(Clone, Debug)]
pub struct Invoice {
    pub order_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub date: DateTime<Utc>,
    pub currency: String,
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    pub fn for_order(order: &Order, customer: &User) -> Self {
        Self {
            order_id: order.id(),
            customer_name: customer.name.clone(),
            customer_email: customer.email.clone(),
            date: order.date(),
            currency: order.currency().to_string(),
            lines: order
                .items()
                .iter()
                .map(|i| InvoiceLine { name: i.product_name.clone(), quantity: i.quantity(), unit_price: i.unit_price })
                .collect(),
        }
    }

    pub fn total(&self) -> Money {
        self.lines.iter().fold(Money::zero(&self.currency), |acc, line| {
            acc.add(&line.subtotal(&self.currency)).unwrap_or(acc)
        })
    }

    pub fn filename(&self) -> String { format!("Factura-{}.pdf", self.order_id) }

    pub fn render_pdf(&self) -> Vec<u8> {
        let price = |amount: Decimal| Money::new(amount, &self.currency);
        let mut doc = PdfDocument::default();
        let mut page = PageWriter::new();

        page.centered(PAGE_HEIGHT - 70.0, Font::Bold, 20.0, "Factura - RepuStore");
        let mut y = PAGE_HEIGHT - 110.0;
        let local = self.date.with_timezone(&argentina());
        for line in [
            format!("Orden ID: {}", self.order_id),
            format!("Cliente: {}", self.customer_name),
            format!("Email: {}", self.customer_email),
            format!("Fecha: {}", local.format("%d/%m/%Y %H:%M")),
        ] {
            page.text(MARGIN, y, Font::Regular, 12.0, &line);
            y -= ROW_HEIGHT;
        }

        y -= ROW_HEIGHT / 2.0;
        y = table_header(&mut page, y);

        for line in &self.lines {
            if y < MARGIN + 3.0 * ROW_HEIGHT {
                doc.pages.push(page.finish());
                page = PageWriter::new();
                y = table_header(&mut page, PAGE_HEIGHT - 70.0);
            }
            page.text(MARGIN, y, Font::Regular, 11.0, &truncate(&line.name, NAME_MAX_CHARS));
            page.text(COL_QTY, y, Font::Regular, 11.0, &line.quantity.to_string());
            page.right_aligned(COL_UNIT_RIGHT, y, Font::Regular, 11.0, &price(line.unit_price).format_es_ar());
            page.right_aligned(COL_SUB_RIGHT, y, Font::Regular, 11.0, &line.subtotal(&self.currency).format_es_ar());
            y -= ROW_HEIGHT;
        }

        page.rule(y + ROW_HEIGHT / 2.0);
        y -= ROW_HEIGHT;
        page.right_aligned(COL_SUB_RIGHT, y, Font::Bold, 13.0, &format!("TOTAL: {}", self.total().format_es_ar()));
        y -= 2.0 * ROW_HEIGHT;
        page.centered(y, Font::Regular, 11.0, "\u{a1}Gracias por tu compra!");

        doc.pages.push(page.finish());
        doc.render()
    }
}

fn table_header(page: &mut PageWriter, y: f32) -> f32 {
    page.text(MARGIN, y, Font::Bold, 12.0, "Producto");
    page.text(COL_QTY, y, Font::Bold, 12.0, "Cant.");
    page.right_aligned(COL_UNIT_RIGHT, y, Font::Bold, 12.0, "Precio");
    page.right_aligned(COL_SUB_RIGHT, y, Font::Bold, 12.0, "Subtotal");
    page.rule(y - 5.0);
    y - ROW_HEIGHT - 2.0
}

/// Invoices show Buenos Aires local time (UTC-3, no DST).
fn argentina() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap_or(Utc.fix())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max { return text.to_string(); }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self { Font::Regular => "F1", Font::Bold => "F2" }
    }
}

struct PageWriter {
    content: Vec<u8>,
}

impl PageWriter {
    fn new() -> Self { Self { content: Vec::new() } }

    fn text(&mut self, x: f32, y: f32, font: Font, size: f32, text: &str) {
        self.content.extend_from_slice(format!("BT /{} {} Tf {:.2} {:.2} Td (", font.resource(), size, x, y).as_bytes());
        self.content.extend_from_slice(&encode_text(text));
        self.content.extend_from_slice(b") Tj ET\n");
    }

    fn right_aligned(&mut self, right: f32, y: f32, font: Font, size: f32, text: &str) {
        self.text(right - text_width(text, size), y, font, size, text);
    }

    fn centered(&mut self, y: f32, font: Font, size: f32, text: &str) {
        self.text((PAGE_WIDTH - text_width(text, size)) / 2.0, y, font, size, text);
    }

    fn rule(&mut self, y: f32) {
        self.content.extend_from_slice(format!("{:.2} {:.2} m {:.2} {:.2} l S\n", MARGIN, y, PAGE_WIDTH - MARGIN, y).as_bytes());
    }

    fn finish(self) -> Vec<u8> { self.content }
}

/// Approximate Helvetica advance width, good enough for column alignment.
fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            ' ' | '.' | ',' | ':' | '!' | 'i' | 'j' | 'l' | '\u{a1}' => 278,
            '-' | '(' | ')' | 'r' | 't' | 'f' => 333,
            'm' | 'M' | 'W' => 833,
            c if c.is_ascii_uppercase() => 667,
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// WinAnsi bytes for a PDF literal string, with `\`, `(` and `)` escaped.
fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            c if (c as u32) < 0x20 => out.push(b' '),
            c if (c as u32) < 0x7f => out.push(c as u8),
            c if (0xa0..=0xff).contains(&(c as u32)) => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

#[derive(Default)]
struct PdfDocument {
    pages: Vec<Vec<u8>>,
}

impl PdfDocument {
    fn render(&self) -> Vec<u8> {
        // 1 catalog, 2 page tree, 3-4 fonts, then a page and a content stream per page
        let page_ids: Vec<usize> = (0..self.pages.len()).map(|i| 5 + 2 * i).collect();
        let kids = page_ids.iter().map(|id| format!("{id} 0 R")).collect::<Vec<_>>().join(" ");

        let mut objects: Vec<Vec<u8>> = vec![
            b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
            format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", self.pages.len()).into_bytes(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>".to_vec(),
        ];
        for (page_id, content) in page_ids.iter().zip(&self.pages) {
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                    page_id + 1
                )
                .into_bytes(),
            );
            let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            stream.extend_from_slice(content);
            stream.extend_from_slice(b"\nendstream");
            objects.push(stream);
        }

        let mut out: Vec<u8> = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n", objects.len() + 1).as_bytes(),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn invoice(lines: usize) -> Invoice {
        Invoice {
            order_id: Uuid::nil(),
            customer_name: "José Pérez".into(),
            customer_email: "jose@test.com".into(),
            date: Utc::now(),
            currency: "ARS".into(),
            lines: (0..lines)
                .map(|i| InvoiceLine { name: format!("Filtro (modelo {i})"), quantity: 2, unit_price: dec!(617.25) })
                .collect(),
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn test_pdf_structure() {
        let pdf = invoice(1).render_pdf();
        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(pdf.ends_with(b"%%EOF\n"));
        assert!(contains(&pdf, b"(Factura - RepuStore)"));
        assert!(contains(&pdf, b"(TOTAL: $ 1.234,50)"));
        assert!(contains(&pdf, b"(Filtro \\(modelo 0\\))"));
        assert!(contains(&pdf, b"Cliente: Jos\xe9 P\xe9rez"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pdf = invoice(2).render_pdf();
        let text = String::from_utf8_lossy(&pdf);
        let xref_at: usize = text.rsplit("startxref\n").next().unwrap().lines().next().unwrap().parse().unwrap();
        assert!(pdf[xref_at..].starts_with(b"xref"));
        let tail = std::str::from_utf8(&pdf[xref_at..]).unwrap();
        let entries: Vec<usize> = tail
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .map(|l| l[..10].parse().unwrap())
            .collect();
        assert_eq!(entries.len(), 6);
        for (i, offset) in entries.iter().enumerate() {
            assert!(pdf[*offset..].starts_with(format!("{} 0 obj", i + 1).as_bytes()));
        }
    }

    #[test]
    fn test_long_orders_paginate() {
        let pdf = invoice(80).render_pdf();
        assert!(count(&pdf, b"/Type /Page ") >= 2);
        assert!(contains(&pdf, b"(Filtro \\(modelo 79\\))"));
    }

    #[test]
    fn test_total_and_filename() {
        let inv = invoice(3);
        assert_eq!(inv.total().amount(), dec!(3703.50));
        assert_eq!(inv.filename(), format!("Factura-{}.pdf", Uuid::nil()));
    }

    #[test]
    fn test_encode_text_replaces_unsupported() {
        assert_eq!(encode_text("a\u{1F697}b"), b"a?b".to_vec());
        assert_eq!(encode_text("\\"), b"\\\\".to_vec());
        assert_eq!(truncate("abcdef", 5), "ab...");
    }
}
