use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::Serialize;

use crate::booking::BookingRecord;
use crate::policy::VillaPolicies;

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;

const MARGIN: f32 = 50.0;
const VALUE_COLUMN: f32 = 160.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
            Self::Italic => "F3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb(pub f32, pub f32, pub f32);

const NAVY: Rgb = Rgb(0.13, 0.3, 0.45);
const GOLD: Rgb = Rgb(0.85, 0.65, 0.35);
const TEAL: Rgb = Rgb(0.2, 0.6, 0.5);
const DARK_GRAY: Rgb = Rgb(0.25, 0.25, 0.25);
const MEDIUM_GRAY: Rgb = Rgb(0.5, 0.5, 0.5);
const LIGHT_GRAY: Rgb = Rgb(0.95, 0.95, 0.95);
const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub font: Font,
    pub color: Rgb,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilledRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: Rgb,
}

/// Laid-out single page booking confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationDocument {
    pub reference: String,
    pub rects: Vec<FilledRect>,
    pub runs: Vec<TextRun>,
}

impl ConfirmationDocument {
    pub fn contains_text(&self, needle: &str) -> bool {
        self.runs.iter().any(|run| run.text.contains(needle))
    }
}

struct Layout {
    rects: Vec<FilledRect>,
    runs: Vec<TextRun>,
    y: f32,
}

impl Layout {
    fn text(&mut self, x: f32, y: f32, size: f32, font: Font, color: Rgb, text: impl Into<String>) {
        self.runs.push(TextRun {
            x,
            y,
            size,
            font,
            color,
            text: text.into(),
        });
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.rects.push(FilledRect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    fn heading(&mut self, title: &str) {
        self.y -= 18.0;
        self.rect(MARGIN, self.y - 4.0, PAGE_WIDTH - 2.0 * MARGIN, 16.0, LIGHT_GRAY);
        self.text(MARGIN + 8.0, self.y, 11.0, Font::Bold, NAVY, title);
        self.y -= 16.0;
    }

    fn row(&mut self, label: &str, value: impl Into<String>) {
        self.text(MARGIN + 8.0, self.y, 9.0, Font::Bold, DARK_GRAY, label);
        self.text(VALUE_COLUMN, self.y, 9.0, Font::Regular, DARK_GRAY, value);
        self.y -= 12.0;
    }

    fn line(&mut self, size: f32, font: Font, color: Rgb, text: impl Into<String>) {
        self.text(MARGIN + 8.0, self.y, size, font, color, text);
        self.y -= size + 3.0;
    }
}

/// `Sun, Jun 1, 2025`
pub fn format_short_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format("%a, %b %-d, %Y").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn build_confirmation(
    record: &BookingRecord,
    policies: &VillaPolicies,
    issued: NaiveDate,
) -> ConfirmationDocument {
    let mut page = Layout {
        rects: Vec::new(),
        runs: Vec::new(),
        y: PAGE_HEIGHT,
    };

    page.rect(0.0, PAGE_HEIGHT - 90.0, PAGE_WIDTH, 90.0, NAVY);
    page.rect(0.0, PAGE_HEIGHT - 95.0, PAGE_WIDTH, 5.0, GOLD);
    page.text(MARGIN, PAGE_HEIGHT - 35.0, 24.0, Font::Bold, WHITE, "VILLA SHAA");
    page.text(MARGIN, PAGE_HEIGHT - 60.0, 14.0, Font::Bold, WHITE, "BOOKING CONFIRMATION");
    page.text(
        MARGIN,
        PAGE_HEIGHT - 75.0,
        10.0,
        Font::Italic,
        Rgb(0.9, 0.9, 0.9),
        "Your Exclusive Luxury Villa Experience",
    );
    page.text(360.0, PAGE_HEIGHT - 35.0, 10.0, Font::Bold, GOLD, "LUXURY VILLA - HIKKADUWA");
    page.text(360.0, PAGE_HEIGHT - 55.0, 9.0, Font::Bold, WHITE, "REF:");
    page.text(400.0, PAGE_HEIGHT - 55.0, 9.0, Font::Regular, WHITE, record.booking_ref.as_str());
    page.text(360.0, PAGE_HEIGHT - 70.0, 9.0, Font::Bold, WHITE, "ISSUED:");
    page.text(
        400.0,
        PAGE_HEIGHT - 70.0,
        9.0,
        Font::Regular,
        WHITE,
        format_short_date(Some(issued)),
    );
    page.y = PAGE_HEIGHT - 100.0;

    page.heading("GUEST INFORMATION");
    page.row("Guest Name:", record.guest.name.as_str());
    page.row("Email:", record.guest.email.as_str());
    page.row("Phone:", record.guest.phone.as_str());
    page.row(
        "Guests:",
        format!(
            "{} Adults, {} Children",
            record.guest.adults, record.guest.children
        ),
    );

    page.heading("RESERVATION DETAILS");
    page.row(
        "Check-in:",
        format!(
            "{} ({})",
            format_short_date(Some(record.check_in)),
            policies.check_in_time
        ),
    );
    page.row(
        "Check-out:",
        format!(
            "{} ({})",
            format_short_date(Some(record.check_out)),
            policies.check_out_time
        ),
    );
    page.row("Duration:", format!("{} Nights", record.nights.max(0)));
    page.row("Package:", record.package_name.as_str());

    page.heading("PAYMENT SUMMARY");
    let columns = [MARGIN + 8.0, 300.0, 380.0, 460.0];
    for (x, label) in columns.iter().zip(["DESCRIPTION", "RATE", "NIGHTS", "AMOUNT"]) {
        page.text(*x, page.y, 8.0, Font::Bold, MEDIUM_GRAY, label);
    }
    page.y -= 14.0;
    let cells = [
        record.package_name.clone(),
        format!("${}", record.package_price),
        record.nights.max(0).to_string(),
        format!("${}", record.total_amount),
    ];
    for (x, cell) in columns.iter().zip(cells) {
        page.text(*x, page.y, 9.0, Font::Regular, DARK_GRAY, cell);
    }
    page.y -= 20.0;
    page.rect(MARGIN, page.y - 6.0, PAGE_WIDTH - 2.0 * MARGIN, 20.0, TEAL);
    page.text(MARGIN + 8.0, page.y, 11.0, Font::Bold, WHITE, "TOTAL AMOUNT");
    page.text(
        460.0,
        page.y,
        11.0,
        Font::Bold,
        WHITE,
        format!("${} {}", record.total_amount, record.currency),
    );
    page.y -= 8.0;

    page.heading("VILLA POLICIES");
    for item in &policies.items {
        page.row(item.title.as_str(), item.detail.as_str());
    }
    for note in &policies.house_notes {
        page.line(9.0, Font::Regular, DARK_GRAY, format!("- {note}"));
    }

    page.heading("NEED ASSISTANCE?");
    page.line(9.0, Font::Italic, TEAL, "24/7 Guest Support Available");
    page.row("Phone:", policies.contact.phone.as_str());
    page.row("Email:", policies.contact.email.as_str());
    page.row("Website:", policies.contact.website.as_str());
    page.row("Host:", policies.contact.host.as_str());

    page.heading("LOCATION");
    for line in &policies.location {
        page.line(9.0, Font::Regular, DARK_GRAY, line.as_str());
    }

    page.heading("IMPORTANT INFORMATION");
    let important = [
        "- Deposit of $0 has been received.".to_string(),
        format!(
            "- Balance of ${} is due upon arrival.",
            record.total_amount
        ),
        "- Please present this confirmation upon check-in.".to_string(),
        "- Wi-Fi password will be provided upon arrival.".to_string(),
    ];
    for line in important {
        page.line(9.0, Font::Regular, DARK_GRAY, line);
    }

    page.rect(0.0, 0.0, PAGE_WIDTH, 40.0, NAVY);
    page.text(MARGIN, 24.0, 9.0, Font::Bold, WHITE, "Villa Shaa - Luxury Villa Experience");
    page.text(
        MARGIN,
        12.0,
        8.0,
        Font::Regular,
        WHITE,
        "Hikkaduwa, Southern Province, Sri Lanka",
    );
    page.text(
        340.0,
        12.0,
        8.0,
        Font::Regular,
        WHITE,
        format!(
            "Ref: {} - Generated: {}",
            record.booking_ref,
            issued.format("%-m/%-d/%Y")
        ),
    );

    ConfirmationDocument {
        reference: record.booking_ref.clone(),
        rects: page.rects,
        runs: page.runs,
    }
}

/// Serialises the document as a single-page PDF 1.4 file using the base-14
/// Helvetica fonts.
pub fn render_pdf(document: &ConfirmationDocument) -> Vec<u8> {
    let mut content = String::new();
    for rect in &document.rects {
        let _ = writeln!(
            content,
            "{:.3} {:.3} {:.3} rg {:.2} {:.2} {:.2} {:.2} re f",
            rect.color.0, rect.color.1, rect.color.2, rect.x, rect.y, rect.width, rect.height
        );
    }
    for run in &document.runs {
        let _ = writeln!(
            content,
            "BT /{} {:.1} Tf {:.3} {:.3} {:.3} rg {:.2} {:.2} Td ({}) Tj ET",
            run.font.resource(),
            run.size,
            run.color.0,
            run.color.1,
            run.color.2,
            run.x,
            run.y,
            escape_pdf_text(&run.text)
        );
    }

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH:.0} {PAGE_HEIGHT:.0}] \
             /Resources << /Font << /F1 5 0 R /F2 6 0 R /F3 7 0 R >> >> /Contents 4 0 R >>"
        ),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
        font_object("Helvetica"),
        font_object("Helvetica-Bold"),
        font_object("Helvetica-Oblique"),
    ];

    let mut out = Vec::with_capacity(content.len() + 1024);
    out.extend_from_slice(b"%PDF-1.4\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
    }

    let xref_at = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = writeln!(xref, "{offset:010} 00000 n ");
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    );
    out.extend_from_slice(xref.as_bytes());
    out
}

fn font_object(base: &str) -> String {
    format!("<< /Type /Font /Subtype /Type1 /BaseFont /{base} /Encoding /WinAnsiEncoding >>")
}

/// Base-14 fonts are written with WinAnsiEncoding, so anything outside that
/// code page is replaced.
fn escape_pdf_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '(' | ')' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' '..='~' => escaped.push(ch),
            _ => match win_ansi_byte(ch) {
                Some(byte) => escaped.push_str(&format!("\\{byte:03o}")),
                None => escaped.push('?'),
            },
        }
    }
    escaped
}

fn win_ansi_byte(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{00A0}'..='\u{00FF}' => ch as u32 as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}
