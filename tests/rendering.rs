use std::path::Path;

use alert_report::builder::{PdfBuilder, RenderedPdf};
use alert_report::charts::{ChartBackend, MITRE_FILE, SEVERITY_FILE, TIME_SERIES_FILE};
use alert_report::config::ChartDimensions;
use alert_report::fonts;
use alert_report::report::{build_document, ChartSet};
use alert_report::{AlertSummary, ReportConfig, ReportGenerator};
use lopdf::content::Content;
use sha2::{Digest, Sha256};

const POINTS_PER_MM: f64 = 72.0 / 25.4;
const A4_HEIGHT_PT: f64 = 297.0 * POINTS_PER_MM;
const MARGIN_PT: f64 = 72.0;
const FOOTER_PT: f64 = 10.0 * POINTS_PER_MM;

const SUMMARY: &str = r#"{
    "group": "database",
    "total_alerts": 42,
    "alerts_by_level": {"5": 30, "9": 12},
    "alerts_by_category": {"mysql": 30, "audit": 12},
    "alerts_by_mitre": {"Credential Access": 12},
    "time_analysis": {
        "first_alert": "2024-06-01T08:00:00Z",
        "last_alert": "2024-06-01T11:00:00Z",
        "alerts_by_hour": {"08": 10, "09": 20, "10": 8, "11": 4}
    },
    "agents_overview": [
        {"name": "db-01", "total_alerts": 42, "highest_level": 9,
         "last_alert": "2024-06-01T11:00:00Z", "categories": ["mysql", "audit"]}
    ]
}"#;

fn render_report(dir: &Path) -> Option<RenderedPdf> {
    if !fonts::default_fonts_available() {
        return None;
    }

    let summary = AlertSummary::from_json_str(SUMMARY).expect("summary parses");
    let backend = ChartBackend::without_text();
    let dims = ChartDimensions::new(300, 200);
    let charts = ChartSet {
        time_series: backend
            .render_time_series(&summary, dims, &dir.join(TIME_SERIES_FILE))
            .expect("time series"),
        severity: backend
            .render_severity(&summary, dims, &dir.join(SEVERITY_FILE))
            .expect("severity"),
        mitre: backend
            .render_mitre(&summary, dims, &dir.join(MITRE_FILE))
            .expect("mitre"),
    };

    let config = ReportConfig::default();
    let (cover, sections) = build_document(&summary, &charts, &config)
        .expect("document builds")
        .into_parts();
    let rendered = PdfBuilder::new()
        .with_paper_size(config.paper_size())
        .with_margins(config.margins())
        .with_title(config.title())
        .with_cover(cover)
        .add_sections(sections)
        .render()
        .expect("render report pdf");
    Some(rendered)
}

/// Zeroes the values of metadata entries that change between runs.
fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    fn zero_after(data: &mut [u8], tag: &[u8], terminator: u8) {
        let mut index = 0;
        while index + tag.len() < data.len() {
            if !data[index..].starts_with(tag) {
                index += 1;
                continue;
            }
            let mut cursor = index + tag.len();
            while cursor < data.len() && data[cursor] != terminator {
                if !matches!(data[cursor], b'<' | b'>' | b' ' | b'\n' | b'\r' | b'\t') {
                    data[cursor] = b'0';
                }
                cursor += 1;
            }
            index = cursor;
        }
    }

    let mut normalized = bytes.to_vec();
    for (tag, terminator) in [
        (&b"/CreationDate("[..], b')'),
        (&b"/ModDate("[..], b')'),
        (&b"/ID["[..], b']'),
        (&b"/Producer("[..], b')'),
        (&b"<xmp:CreateDate>"[..], b'<'),
        (&b"<xmp:ModifyDate>"[..], b'<'),
        (&b"<xmp:MetadataDate>"[..], b'<'),
        (&b"<xmpMM:DocumentID>"[..], b'<'),
        (&b"<xmpMM:InstanceID>"[..], b'<'),
        (&b"<xmpMM:VersionID>"[..], b'<'),
    ] {
        zero_after(&mut normalized, tag, terminator);
    }
    normalized
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(scrub_pdf(bytes)).into()
}

fn skip(test: &str) {
    eprintln!(
        "Skipping {test}: report fonts missing. Set ALERT_REPORT_FONTS_DIR or install DejaVu Sans."
    );
}

#[test]
fn report_renders_every_section() {
    let dir = tempfile::tempdir().expect("tempdir");
    let Some(rendered) = render_report(dir.path()) else {
        skip("report_renders_every_section");
        return;
    };

    assert!(rendered.bytes.starts_with(b"%PDF"));
    assert!(rendered.page_count >= 2);
    assert_eq!(rendered.section_pages.len(), 6);

    let starts: Vec<usize> = rendered
        .section_pages
        .iter()
        .map(|page| page.expect("every section starts on a page"))
        .collect();
    assert!(starts.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(starts.iter().all(|page| *page <= rendered.page_count));
}

#[test]
fn report_rendering_is_deterministic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (Some(first), Some(second)) = (render_report(dir.path()), render_report(dir.path())) else {
        skip("report_rendering_is_deterministic");
        return;
    };

    assert_eq!(first.bytes.len(), second.bytes.len(), "PDF sizes should match");
    assert_eq!(
        normalized_hash(&first.bytes),
        normalized_hash(&second.bytes),
        "PDF renders must be deterministic after metadata normalization"
    );
}

/// Affine transform `[a b c d e f]` as used by the PDF `cm` operator.
#[derive(Clone, Copy, Debug)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// Applies `self` before `current`, as `cm` does.
    fn then(self, current: Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [ca, cb, cc, cd, ce, cf] = current.0;
        Matrix([
            a * ca + b * cc,
            a * cb + b * cd,
            c * ca + d * cc,
            c * cb + d * cd,
            e * ca + f * cc + ce,
            e * cb + f * cd + cf,
        ])
    }

    /// Lowest and highest y of the unit square under this transform.
    fn vertical_extent(self) -> (f64, f64) {
        let [_, b, _, d, _, f] = self.0;
        let ys = [f, b + f, d + f, b + d + f];
        let low = ys.iter().copied().fold(f64::INFINITY, f64::min);
        let high = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (low, high)
    }
}

/// Vertical extent of every XObject drawn on every page, in page order.
fn placed_images(bytes: &[u8]) -> Vec<(u32, f64, f64)> {
    let document = lopdf::Document::load_mem(bytes).expect("PDF parses");
    let mut placed = Vec::new();
    for (page, id) in document.get_pages() {
        let content = document.get_page_content(id).expect("page content");
        let operations = Content::decode(&content).expect("content decodes").operations;

        let mut current = Matrix::IDENTITY;
        let mut saved = Vec::new();
        for operation in operations {
            match operation.operator.as_str() {
                "q" => saved.push(current),
                "Q" => current = saved.pop().unwrap_or(Matrix::IDENTITY),
                "cm" => {
                    let values: Vec<f64> = operation
                        .operands
                        .iter()
                        .map(|operand| f64::from(operand.as_float().expect("numeric operand")))
                        .collect();
                    let matrix: [f64; 6] = values.try_into().expect("six operands");
                    current = Matrix(matrix).then(current);
                }
                "Do" => {
                    let (low, high) = current.vertical_extent();
                    placed.push((page, low, high));
                }
                _ => {}
            }
        }
    }
    placed
}

#[test]
fn charts_stay_inside_the_content_area() {
    if !fonts::default_fonts_available() {
        skip("charts_stay_inside_the_content_area");
        return;
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let summary = AlertSummary::from_json_str(SUMMARY).expect("summary parses");
    let output = dir.path().join("report.pdf");
    ReportGenerator::new(ReportConfig::default())
        .generate(&summary, &output)
        .expect("report generates");

    let bytes = std::fs::read(&output).expect("read report");
    let images = placed_images(&bytes);
    assert_eq!(images.len(), 3, "every chart is placed once: {images:?}");

    let lowest = MARGIN_PT + FOOTER_PT - 0.5;
    let highest = A4_HEIGHT_PT - MARGIN_PT + 0.5;
    for (page, bottom, top) in images {
        assert!(
            bottom >= lowest,
            "image on page {page} reaches down to {bottom:.1}pt, below the footer at {lowest:.1}pt"
        );
        assert!(
            top <= highest,
            "image on page {page} starts at {top:.1}pt, above the top margin at {highest:.1}pt"
        );
    }
}
