use crate::error::{ObserverError, Result};
use observer_common::export::pdf_core::{wrap_text, EntrySection, PdfReport};
use observer_common::export::ImageData;
use observer_common::layout::{
    chars_per_line, text_width_mm, A4_HEIGHT_MM, A4_WIDTH_MM, ENTRY_MIN_SPACE_MM, IMAGE_HEIGHT_MM,
    IMAGE_MIN_SPACE_MM, IMAGE_SPACING_MM, IMAGE_WIDTH_MM, LINE_HEIGHT_MM, MARGIN_MM, USABLE_WIDTH_MM,
};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rgb,
};
use std::path::Path;
use tracing::warn;

const TITLE_PT: f32 = 24.0;
const PROJECT_PT: f32 = 16.0;
const SECTION_PT: f32 = 14.0;
const SUMMARY_PT: f32 = 11.0;
const BODY_PT: f32 = 10.0;
const FOOTER_PT: f32 = 8.0;
const IMAGE_DPI: f32 = 300.0;

/// ページ送りしながら上から下へ描画する
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// 現在位置（ページ上端からの距離 mm）
    y: f32,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ObserverError::PdfGeneration(format!("フォント追加エラー: {:?}", e)))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ObserverError::PdfGeneration(format!("フォント追加エラー: {:?}", e)))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: MARGIN_MM,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = MARGIN_MM;
    }

    /// 残りが足りなければ改ページ
    fn ensure_space(&mut self, needed_mm: f32) {
        if self.y + needed_mm > A4_HEIGHT_MM - MARGIN_MM {
            self.new_page();
        }
    }

    fn text_at(&self, text: &str, size_pt: f32, x_mm: f32, y_mm: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        // PDF座標は下端基準
        self.layer
            .use_text(text, size_pt, Mm(x_mm), Mm(A4_HEIGHT_MM - y_mm), font);
    }

    fn centered(&self, text: &str, size_pt: f32, y_mm: f32, bold: bool) {
        let x = ((A4_WIDTH_MM - text_width_mm(text, size_pt)) / 2.0).max(MARGIN_MM);
        self.text_at(text, size_pt, x, y_mm, bold);
    }

    /// ラベル＋折り返し本文
    fn paragraph(&mut self, label: &str, body: &str) {
        self.ensure_space(LINE_HEIGHT_MM * 3.0);
        self.text_at(label, BODY_PT, MARGIN_MM, self.y, true);
        self.y += 6.0;
        for line in wrap_text(body, chars_per_line(USABLE_WIDTH_MM, BODY_PT)) {
            self.ensure_space(LINE_HEIGHT_MM);
            self.text_at(&line, BODY_PT, MARGIN_MM, self.y, false);
            self.y += LINE_HEIGHT_MM;
        }
        self.y += 6.0;
    }

    fn separator(&self) {
        self.layer
            .set_outline_color(Color::Rgb(Rgb::new(0.78, 0.78, 0.78, None)));
        self.layer.set_outline_thickness(0.5);
        let y = Mm(A4_HEIGHT_MM - self.y);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN_MM), y), false),
                (Point::new(Mm(A4_WIDTH_MM - MARGIN_MM), y), false),
            ],
            is_closed: false,
        });
    }

    /// 枠内に縦横比を保って配置する。失敗時は false
    fn image(&self, data: &ImageData, x_mm: f32, top_mm: f32) -> bool {
        let decoded = match printpdf::image_crate::load_from_memory(&data.data) {
            Ok(img) => img,
            Err(e) => {
                warn!(error = %e, "PDFへの写真埋め込みに失敗");
                return false;
            }
        };
        if data.width_px == 0 || data.height_px == 0 {
            return false;
        }
        let natural_w = data.width_px as f32 / IMAGE_DPI * 25.4;
        let natural_h = data.height_px as f32 / IMAGE_DPI * 25.4;
        let scale = (IMAGE_WIDTH_MM / natural_w).min(IMAGE_HEIGHT_MM / natural_h);
        let drawn_h = natural_h * scale;

        Image::from_dynamic_image(&decoded).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x_mm)),
                translate_y: Some(Mm(A4_HEIGHT_MM - top_mm - drawn_h)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        true
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| ObserverError::PdfGeneration(format!("PDF保存エラー: {:?}", e)))
    }
}

/// レポートをPDFバイト列に描画
///
/// `load_image` は写真の参照から縮小済み画像を返す。None の写真は省略する。
pub fn generate_pdf_buffer<F>(report: &PdfReport, load_image: F) -> Result<Vec<u8>>
where
    F: Fn(&str) -> Option<ImageData>,
{
    let mut writer = PageWriter::new(report.title)?;

    // タイトル
    writer.centered(report.title, TITLE_PT, writer.y, true);
    writer.y += 15.0;
    writer.centered(&report.project_name, PROJECT_PT, writer.y, false);
    writer.y += 10.0;
    writer.centered(&format!("Generated on: {}", report.generated_on), 12.0, writer.y, false);
    writer.y += 20.0;

    // サマリー
    writer.text_at("Summary", SECTION_PT, MARGIN_MM, writer.y, true);
    writer.y += 10.0;
    for line in [
        format!("Total Entries: {}", report.sections.len()),
        format!("Completed: {}", report.summary.completed),
        format!("Pending: {}", report.summary.pending),
    ] {
        writer.text_at(&line, SUMMARY_PT, MARGIN_MM, writer.y, false);
        writer.y += 6.0;
    }
    writer.y += 14.0;

    for section in &report.sections {
        draw_section(&mut writer, section, &load_image);
    }

    // 最終ページのフッター
    writer.centered(&report.footer(), FOOTER_PT, A4_HEIGHT_MM - 10.0, false);

    writer.finish()
}

fn draw_section<F>(writer: &mut PageWriter, section: &EntrySection, load_image: &F)
where
    F: Fn(&str) -> Option<ImageData>,
{
    writer.ensure_space(ENTRY_MIN_SPACE_MM);

    writer.text_at(&section.heading, SECTION_PT, MARGIN_MM, writer.y, true);
    writer.y += 10.0;

    let right_x = A4_WIDTH_MM / 2.0 + 10.0;
    writer.text_at("Operation Number:", BODY_PT, MARGIN_MM, writer.y, true);
    writer.text_at(&section.op_number, BODY_PT, MARGIN_MM + 35.0, writer.y, false);
    writer.text_at("Responsibility:", BODY_PT, right_x, writer.y, true);
    writer.text_at(&section.responsibility, BODY_PT, right_x + 30.0, writer.y, false);
    writer.y += 8.0;

    writer.text_at("Status:", BODY_PT, MARGIN_MM, writer.y, true);
    writer.text_at(&section.status, BODY_PT, MARGIN_MM + 15.0, writer.y, false);
    writer.y += 12.0;

    writer.paragraph("Observation:", &section.observation);
    writer.paragraph("Action Plan:", &section.action_plan);
    if !section.remarks.is_empty() {
        writer.paragraph("Remarks:", &section.remarks);
    }

    if section.has_images() {
        writer.ensure_space(IMAGE_MIN_SPACE_MM);
        writer.text_at("Images:", BODY_PT, MARGIN_MM, writer.y, true);
        writer.y += 8.0;

        let mut x = MARGIN_MM;
        let label_y = writer.y;
        let image_top = writer.y + 5.0;
        for (label, reference) in [("Before:", &section.before_photo), ("After:", &section.after_photo)] {
            let Some(reference) = reference else {
                continue;
            };
            writer.text_at(label, BODY_PT, x, label_y, false);
            match load_image(reference.as_str()) {
                Some(data) => {
                    writer.image(&data, x, image_top);
                }
                None => warn!(reference = %reference, "写真を省略"),
            }
            x += IMAGE_WIDTH_MM + IMAGE_SPACING_MM;
        }
        writer.y = image_top + IMAGE_HEIGHT_MM + 10.0;
    }

    writer.separator();
    writer.y += 15.0;
}

/// PDFファイルを書き出す
pub fn generate_pdf<F>(report: &PdfReport, output_path: &Path, load_image: F) -> Result<()>
where
    F: Fn(&str) -> Option<ImageData>,
{
    let bytes = generate_pdf_buffer(report, load_image)?;
    std::fs::write(output_path, bytes)?;
    Ok(())
}
