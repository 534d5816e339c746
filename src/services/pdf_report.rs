//! 学习报告 PDF 渲染
//!
//! A4 单栏版式：标题、报告类型、概览四项、各科表现（≥70 绿色，否则红色）、点评。
//! 使用内置 Helvetica 字体，内容超出一页时自动换页。

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rgb,
};

use super::report_service::ReportSnapshot;
use crate::error::{AppError, AppResult};
use crate::models::ReportType;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
/// 1pt = 0.3528mm
const PT_TO_MM: f32 = 0.3528;
const WRAP_COLUMNS: usize = 90;
const PASS_THRESHOLD: i64 = 70;

const BLUE: (u8, u8, u8) = (0x25, 0x63, 0xeb);
const GRAY: (u8, u8, u8) = (0x80, 0x80, 0x80);
const INK: (u8, u8, u8) = (0x11, 0x18, 0x27);
const BLACK: (u8, u8, u8) = (0, 0, 0);
const GREEN: (u8, u8, u8) = (0x16, 0xa3, 0x4a);
const RED: (u8, u8, u8) = (0xdc, 0x26, 0x26);
const SLATE: (u8, u8, u8) = (0x37, 0x41, 0x51);

/// 下载文件名
pub fn report_filename(kind: ReportType) -> String {
    format!("{}-learning-report.pdf", kind.as_str())
}

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

/// 按列宽折行（按单词）
fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > columns {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

/// 逐行写入的游标
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PageWriter {
    fn new(title: &str) -> AppResult<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| AppError::internal(format!("Failed to load PDF font: {}", e)))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| AppError::internal(format!("Failed to load PDF font: {}", e)))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height >= MARGIN {
            return;
        }
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn advance(&mut self, size: f32) {
        self.y -= size * PT_TO_MM * 1.5;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn line(&mut self, text: &str, size: f32, color: (u8, u8, u8), bold: bool) {
        self.ensure_space(size * PT_TO_MM * 1.5);
        self.advance(size);
        self.layer.set_fill_color(rgb(color));
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(MARGIN), Mm(self.y), font);
    }

    fn centered(&mut self, text: &str, size: f32, color: (u8, u8, u8), bold: bool) {
        self.ensure_space(size * PT_TO_MM * 1.5);
        self.advance(size);
        // Helvetica 平均字宽约 0.5em
        let width = text.chars().count() as f32 * size * 0.5 * PT_TO_MM;
        let x = ((PAGE_WIDTH - width) / 2.0).max(MARGIN);
        self.layer.set_fill_color(rgb(color));
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    /// `标签: 值`，值使用单独颜色
    fn labeled(&mut self, label: &str, value: &str, size: f32, value_color: (u8, u8, u8)) {
        self.ensure_space(size * PT_TO_MM * 1.5);
        self.advance(size);
        let label = format!("{}: ", label);
        let label_width = label.chars().count() as f32 * size * 0.5 * PT_TO_MM;
        self.layer.set_fill_color(rgb(INK));
        self.layer
            .use_text(label, size, Mm(MARGIN), Mm(self.y), &self.regular);
        self.layer.set_fill_color(rgb(value_color));
        self.layer.use_text(
            value,
            size,
            Mm(MARGIN + label_width),
            Mm(self.y),
            &self.bold,
        );
    }

    fn finish(self) -> AppResult<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| AppError::internal(format!("Failed to render PDF: {}", e)))
    }
}

/// 渲染报告快照
pub fn render_report_pdf(report: &ReportSnapshot, kind: ReportType) -> AppResult<Vec<u8>> {
    let mut pdf = PageWriter::new("Learning Performance Report")?;

    pdf.centered("Learning Performance Report", 26.0, BLUE, true);
    pdf.gap(2.0);
    pdf.centered(
        &format!("Report Type: {}", kind.as_str().to_uppercase()),
        12.0,
        GRAY,
        false,
    );
    pdf.gap(10.0);

    pdf.line("Overview", 18.0, BLACK, true);
    pdf.gap(2.0);
    let overview = [
        ("Study Hours", format!("{} hrs", report.study_hours)),
        ("Topics Covered", report.topics_covered.to_string()),
        ("Quiz Average", format!("{}%", report.quiz_average)),
        ("Improvement", format!("+{}%", report.improvement)),
    ];
    for (label, value) in &overview {
        pdf.labeled(label, value, 12.0, BLUE);
    }
    pdf.gap(8.0);

    pdf.line("Subject Performance", 18.0, BLACK, true);
    pdf.gap(2.0);
    if report.subject_performance.is_empty() {
        pdf.line("No quiz attempts in this period", 12.0, GRAY, false);
    }
    for (subject, score) in &report.subject_performance {
        let color = if *score >= PASS_THRESHOLD { GREEN } else { RED };
        pdf.labeled(subject, &format!("{}%", score), 12.0, color);
    }
    pdf.gap(10.0);

    pdf.line("Insights", 16.0, BLACK, true);
    pdf.gap(1.0);
    for line in wrap_text(&report.insights, WRAP_COLUMNS) {
        pdf.line(&line, 12.0, SLATE, false);
    }

    pdf.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshot(subjects: usize) -> ReportSnapshot {
        let mut perf = BTreeMap::new();
        for i in 0..subjects {
            perf.insert(format!("Subject {}", i), (i as i64 * 13) % 100);
        }
        ReportSnapshot {
            start_date: "2026-10-11T00:00:00.000Z".into(),
            end_date: "2026-10-18T00:00:00.000Z".into(),
            study_hours: 4,
            topics_covered: 3,
            quizzes_taken: 2,
            quiz_average: 72,
            improvement: 14,
            subject_performance: perf,
            recommendations: vec![],
            insights: "Keep going. ".repeat(40),
        }
    }

    #[test]
    fn test_render_produces_pdf_bytes() {
        let bytes = render_report_pdf(&snapshot(2), ReportType::Weekly).expect("render");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_many_subjects_spans_pages() {
        let bytes = render_report_pdf(&snapshot(120), ReportType::Monthly).expect("render");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_filename_and_wrapping() {
        assert_eq!(report_filename(ReportType::Monthly), "monthly-learning-report.pdf");
        let lines = wrap_text("aaa bbb ccc ddd", 7);
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
    }
}
