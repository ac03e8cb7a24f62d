//! Report assembly: charts, document structure and the final PDF file.
//!
//! [`build_document`] is pure and turns a summary plus the chart outputs into a
//! [`ReportDocument`]. [`ReportGenerator`] runs the whole pipeline against the file system.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::elements::Paragraph;
use genpdf::style::Style;
use genpdf::{Alignment, Element};
use log::info;

use crate::builder::{PdfBuildError, PdfBuilder, RenderedPdf};
use crate::charts::palette::SeverityBand;
use crate::charts::{self, ChartBackend, ChartError, ChartOutput};
use crate::config::{self, ReportConfig};
use crate::model::{Block, Cover, ImageBlock, ReportDocument, Section, TableBlock};
use crate::richtext::Span;
use crate::summary::{AgentOverview, AlertSummary, SummaryError};

/// Sub-directory of the output directory that receives the chart images.
pub const CHARTS_DIR: &str = "charts";

const FOOTER_HEIGHT_MM: f64 = 10.0;
const FOOTER_FONT_SIZE: u8 = 9;

/// Errors raised while producing a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Summary(#[from] SummaryError),
    #[error("Failed to render chart")]
    Chart(#[from] ChartError),
    #[error("Failed to build PDF")]
    Pdf(#[from] PdfBuildError),
    /// The chart directory could not be created.
    #[error("Failed to create directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        source: io::Error,
    },
    /// The rendered PDF could not be written.
    #[error("Failed to write report {}", path.display())]
    Write {
        path: PathBuf,
        source: io::Error,
    },
    /// Percentages cannot be computed for a summary without alerts.
    #[error("Summary reports zero total alerts; percentages are undefined")]
    ZeroTotal,
}

/// Outputs of the three chart renderers for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartSet {
    pub time_series: ChartOutput,
    pub severity: ChartOutput,
    pub mitre: ChartOutput,
}

/// One row of the top-categories table.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryShare {
    pub category: String,
    pub count: u64,
    /// Share of the summary's total alerts, in percent.
    pub percentage: f64,
}

/// Returns the `limit` largest categories with their share of `total_alerts`.
///
/// Categories with equal counts keep the order in which the summary lists them.
pub fn top_categories(
    summary: &AlertSummary,
    limit: usize,
) -> Result<Vec<CategoryShare>, ReportError> {
    summary
        .alerts_by_category
        .top(limit)
        .into_iter()
        .map(|(category, count)| {
            Ok(CategoryShare {
                category: category.to_string(),
                count,
                percentage: percentage(count, summary.total_alerts)?,
            })
        })
        .collect()
}

fn percentage(count: u64, total: u64) -> Result<f64, ReportError> {
    if total == 0 {
        return Err(ReportError::ZeroTotal);
    }
    Ok(100.0 * count as f64 / total as f64)
}

/// Formats a percentage with one decimal and a trailing `%`.
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Builds the report content for `summary`.
///
/// The MITRE ATT&CK section is included exactly when `charts.mitre` was written.
pub fn build_document(
    summary: &AlertSummary,
    charts: &ChartSet,
    config: &ReportConfig,
) -> Result<ReportDocument, ReportError> {
    let cover = Cover::new(config.title())
        .with_subtitle(format!("Group: {}", summary.group))
        .with_block(Block::spacer(config::points(20.0)));

    let mut document = ReportDocument::new(cover)
        .with_section(
            section("Executive Summary", "executive-summary")
                .with_block(labelled("Total Alerts", summary.total_alerts))
                .with_block(Block::spacer(config::points(12.0))),
        )
        .with_section(time_section(summary, charts, config))
        .with_section(severity_section(summary, charts, config)?);

    if let Some(path) = charts.mitre.path() {
        document = document.with_section(
            section("MITRE ATT&CK Analysis", "mitre-attack").with_blocks([
                image(path, config.mitre_box()),
                Block::spacer(config::points(20.0)),
            ]),
        );
    }

    Ok(document
        .with_section(categories_section(summary, config)?)
        .with_section(agents_section(&summary.agents_overview)))
}

fn section(title: &str, identifier: &str) -> Section {
    Section::new(title).with_identifier(identifier.to_string())
}

/// Paragraph with a bold `label:` followed by the plain value.
fn labelled(label: &str, value: impl ToString) -> Block {
    Block::paragraph(vec![
        Span::new(format!("{}: ", label)).bold(),
        Span::new(value.to_string()),
    ])
}

fn image(path: &Path, size: config::BoxSize) -> Block {
    Block::Image(ImageBlock::new(path, size))
}

fn time_section(summary: &AlertSummary, charts: &ChartSet, config: &ReportConfig) -> Section {
    let time = &summary.time_analysis;
    let mut section = section("Time Analysis", "time-analysis").with_blocks([
        labelled("First Alert", &time.first_alert),
        labelled("Last Alert", &time.last_alert),
        Block::spacer(config::points(12.0)),
    ]);
    if let Some(path) = charts.time_series.path() {
        section = section.with_block(image(path, config.time_series_box()));
    }
    section.with_block(Block::spacer(config::points(20.0)))
}

fn severity_section(
    summary: &AlertSummary,
    charts: &ChartSet,
    config: &ReportConfig,
) -> Result<Section, ReportError> {
    let mut section = section("Alert Severity Distribution", "severity");
    if let Some(path) = charts.severity.path() {
        section = section.with_block(image(path, config.severity_box()));
    }

    let mut table =
        TableBlock::new(vec![1, 1, 1, 1]).with_header(["Level", "Count", "Percentage", "Band"]);
    for (level, count) in summary.alerts_by_level.ascending() {
        let share = percentage(count, summary.total_alerts)?;
        table = table.with_row([
            level.to_string(),
            count.to_string(),
            format_percentage(share),
            SeverityBand::from_level(level).label().to_string(),
        ]);
    }

    Ok(section.with_blocks([
        Block::spacer(config::points(12.0)),
        Block::Table(table),
        Block::spacer(config::points(20.0)),
    ]))
}

fn categories_section(
    summary: &AlertSummary,
    config: &ReportConfig,
) -> Result<Section, ReportError> {
    let mut table =
        TableBlock::new(vec![2, 1, 1]).with_header(["Category", "Count", "Percentage"]);
    for share in top_categories(summary, config.top_categories())? {
        table = table.with_row([
            share.category,
            share.count.to_string(),
            format_percentage(share.percentage),
        ]);
    }
    Ok(section("Top Alert Categories", "top-categories")
        .with_blocks([Block::Table(table), Block::spacer(config::points(20.0))]))
}

fn agents_section(agents: &[AgentOverview]) -> Section {
    let mut section = section("Agent Analysis", "agents");
    for agent in agents {
        let details = TableBlock::new(vec![1, 2])
            .with_row(["Total Alerts".to_string(), agent.total_alerts.to_string()])
            .with_row(["Highest Level".to_string(), agent.highest_level.to_string()])
            .with_row(["Last Alert".to_string(), agent.last_alert.clone()]);

        section = section.with_blocks([
            Block::heading(format!("Agent: {}", agent.name)),
            Block::Table(details),
            Block::spacer(config::points(12.0)),
        ]);
        if !agent.categories.is_empty() {
            section = section.with_blocks([
                Block::paragraph(vec![Span::new("Categories:").bold()]),
                Block::bullets(agent.categories.iter().cloned()),
            ]);
        }
        section = section.with_block(Block::spacer(config::points(20.0)));
    }
    section
}

/// Files and layout facts produced by a successful run.
#[derive(Clone, Debug)]
pub struct ReportOutcome {
    pub pdf_path: PathBuf,
    /// Size of the written PDF in bytes.
    pub bytes: usize,
    pub page_count: usize,
    pub charts: ChartSet,
}

/// Runs the report pipeline with a fixed configuration.
pub struct ReportGenerator {
    config: ReportConfig,
    backend: &'static ChartBackend,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(ReportConfig::default())
    }
}

impl ReportGenerator {
    /// Creates a generator using the process-wide chart backend.
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            backend: charts::init(),
        }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Renders the charts next to `output_path`, lays out the report and writes the PDF.
    ///
    /// Charts go to a `charts` directory beside the PDF and are left there. When any step fails
    /// no PDF is written, but charts rendered before the failure stay on disk.
    pub fn generate(
        &self,
        summary: &AlertSummary,
        output_path: impl AsRef<Path>,
    ) -> Result<ReportOutcome, ReportError> {
        let output_path = output_path.as_ref();
        let charts_dir = charts_dir_for(output_path);
        fs::create_dir_all(&charts_dir).map_err(|source| ReportError::CreateDir {
            path: charts_dir.clone(),
            source,
        })?;

        let charts = self.render_charts(summary, &charts_dir)?;
        let document = build_document(summary, &charts, &self.config)?;
        let rendered = self.render_pdf(&summary.group, document)?;

        fs::write(output_path, &rendered.bytes).map_err(|source| ReportError::Write {
            path: output_path.to_path_buf(),
            source,
        })?;
        info!(
            "Generated {} ({} bytes, {} pages)",
            output_path.display(),
            rendered.bytes.len(),
            rendered.page_count
        );

        Ok(ReportOutcome {
            pdf_path: output_path.to_path_buf(),
            bytes: rendered.bytes.len(),
            page_count: rendered.page_count,
            charts,
        })
    }

    fn render_charts(&self, summary: &AlertSummary, dir: &Path) -> Result<ChartSet, ReportError> {
        let time_series = self.backend.render_time_series(
            summary,
            self.config.time_series_pixels(),
            &dir.join(charts::TIME_SERIES_FILE),
        )?;
        let severity = self.backend.render_severity(
            summary,
            self.config.severity_pixels(),
            &dir.join(charts::SEVERITY_FILE),
        )?;
        let mitre = self.backend.render_mitre(
            summary,
            self.config.mitre_pixels(),
            &dir.join(charts::MITRE_FILE),
        )?;
        Ok(ChartSet {
            time_series,
            severity,
            mitre,
        })
    }

    fn render_pdf(
        &self,
        group: &str,
        document: ReportDocument,
    ) -> Result<RenderedPdf, ReportError> {
        let (cover, sections) = document.into_parts();
        let mut builder = PdfBuilder::new()
            .with_paper_size(self.config.paper_size())
            .with_margins(self.config.margins())
            .with_title(self.config.title())
            .with_cover(cover)
            .add_sections(sections);

        if self.config.footer() {
            let group = group.to_string();
            builder = builder.with_footer(FOOTER_HEIGHT_MM, move |page| {
                Paragraph::new(format!("{} \u{2022} Page {}", group, page))
                    .aligned(Alignment::Right)
                    .styled(Style::new().with_font_size(FOOTER_FONT_SIZE))
            });
        }

        #[cfg(feature = "bookmarks")]
        let rendered = builder.render_with_bookmarks()?;
        #[cfg(not(feature = "bookmarks"))]
        let rendered = builder.render()?;

        Ok(rendered)
    }
}

/// Directory receiving the charts for a report written to `output_path`.
pub fn charts_dir_for(output_path: &Path) -> PathBuf {
    match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(CHARTS_DIR),
        _ => PathBuf::from(CHARTS_DIR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{CountTable, LevelCounts, TimeAnalysis};

    fn agent(name: &str, categories: &[&str]) -> AgentOverview {
        AgentOverview {
            name: name.to_string(),
            total_alerts: 10,
            highest_level: 7,
            last_alert: "2024-05-01T12:00:00Z".to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn summary() -> AlertSummary {
        AlertSummary {
            group: "web-servers".to_string(),
            total_alerts: 155,
            alerts_by_level: LevelCounts::new().with_level(10, 55).with_level(3, 100),
            alerts_by_category: CountTable::new()
                .with_entry("five", 5)
                .with_entry("fifty", 50)
                .with_entry("twenty", 20)
                .with_entry("forty", 40)
                .with_entry("ten", 10)
                .with_entry("thirty", 30),
            alerts_by_mitre: CountTable::new(),
            time_analysis: TimeAnalysis {
                first_alert: "2024-05-01T00:00:00Z".to_string(),
                last_alert: "2024-05-01T23:59:00Z".to_string(),
                alerts_by_hour: CountTable::new().with_entry("00", 155),
            },
            agents_overview: vec![agent("web-02", &[]), agent("web-01", &["sshd", "web"])],
        }
    }

    fn charts(mitre: ChartOutput) -> ChartSet {
        ChartSet {
            time_series: ChartOutput::Written(PathBuf::from("charts/time_series.png")),
            severity: ChartOutput::Written(PathBuf::from("charts/severity.png")),
            mitre,
        }
    }

    fn default_document() -> ReportDocument {
        build_document(
            &summary(),
            &charts(ChartOutput::Skipped),
            &ReportConfig::default(),
        )
        .expect("document builds")
    }

    fn titles(document: &ReportDocument) -> Vec<&str> {
        document.sections().iter().map(Section::title).collect()
    }

    fn table(section: &Section) -> &TableBlock {
        section
            .blocks()
            .iter()
            .find_map(|block| match block {
                Block::Table(table) => Some(table),
                _ => None,
            })
            .expect("section has a table")
    }

    #[test]
    fn top_categories_drop_the_smallest() {
        let shares = top_categories(&summary(), 5).expect("non-zero total");
        let counts: Vec<_> = shares.iter().map(|share| share.count).collect();
        assert_eq!(counts, vec![50, 40, 30, 20, 10]);

        let sum: f64 = shares.iter().map(|share| share.percentage).sum();
        assert!(sum <= 100.0);
        assert!((shares[0].percentage - 100.0 * 50.0 / 155.0).abs() < 1e-9);
    }

    #[test]
    fn percentages_use_one_decimal() {
        assert_eq!(format_percentage(100.0 * 50.0 / 155.0), "32.3%");
        assert_eq!(format_percentage(100.0), "100.0%");
    }

    #[test]
    fn zero_total_is_rejected() {
        let mut input = summary();
        input.total_alerts = 0;
        assert!(matches!(top_categories(&input, 5), Err(ReportError::ZeroTotal)));
        assert!(matches!(
            build_document(&input, &charts(ChartOutput::Skipped), &ReportConfig::default()),
            Err(ReportError::ZeroTotal)
        ));
    }

    #[test]
    fn sections_follow_report_order_without_mitre() {
        let document = default_document();
        assert_eq!(
            titles(&document),
            vec![
                "Executive Summary",
                "Time Analysis",
                "Alert Severity Distribution",
                "Top Alert Categories",
                "Agent Analysis",
            ]
        );
        assert_eq!(document.cover().subtitle(), Some("Group: web-servers"));
    }

    #[test]
    fn summary_values_follow_bold_labels() {
        let document = default_document();
        let blocks = document.section("Executive Summary").expect("summary").blocks();
        let Some(Block::Paragraph(paragraph)) = blocks.first() else {
            panic!("executive summary starts with a paragraph");
        };
        assert_eq!(paragraph.text(), "Total Alerts: 155");
        assert_eq!(
            paragraph.spans(),
            &[Span::new("Total Alerts: ").bold(), Span::new("155")]
        );

        let time = document.section("Time Analysis").expect("time").blocks();
        assert!(matches!(
            time.get(1),
            Some(Block::Paragraph(paragraph)) if paragraph.text() == "Last Alert: 2024-05-01T23:59:00Z"
        ));
    }

    #[test]
    fn written_mitre_chart_adds_section() {
        let mitre = ChartOutput::Written(PathBuf::from("charts/mitre.png"));
        let document = build_document(&summary(), &charts(mitre), &ReportConfig::default())
            .expect("document builds");
        let section = document.section("MITRE ATT&CK Analysis").expect("mitre section");
        assert!(matches!(
            section.blocks().first(),
            Some(Block::Image(image)) if image.path() == Path::new("charts/mitre.png")
        ));
        assert_eq!(titles(&document)[3], "MITRE ATT&CK Analysis");
    }

    #[test]
    fn categories_table_lists_top_five() {
        let document = default_document();
        let table = table(document.section("Top Alert Categories").expect("categories"));
        assert_eq!(table.column_weights(), &[2, 1, 1]);
        assert_eq!(table.rows().len(), 5);
        assert_eq!(table.rows()[0], vec!["fifty", "50", "32.3%"]);
        assert_eq!(table.rows()[4][0], "ten");
    }

    #[test]
    fn severity_table_is_sorted_by_level() {
        let document = default_document();
        let table = table(
            document
                .section("Alert Severity Distribution")
                .expect("severity"),
        );
        assert_eq!(table.rows()[0], vec!["3", "100", "64.5%", "low"]);
        assert_eq!(table.rows()[1], vec!["10", "55", "35.5%", "high"]);
    }

    #[test]
    fn agents_keep_input_order_and_skip_empty_categories() {
        let document = default_document();
        let blocks = document.section("Agent Analysis").expect("agents").blocks();

        let headings: Vec<_> = blocks
            .iter()
            .filter_map(|block| match block {
                Block::Heading(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(headings, vec!["Agent: web-02", "Agent: web-01"]);

        let lists: Vec<_> = blocks
            .iter()
            .filter_map(|block| match block {
                Block::BulletList(items) => Some(items.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(lists, vec![vec!["sshd".to_string(), "web".to_string()]]);
    }

    #[test]
    fn charts_live_beside_the_pdf() {
        assert_eq!(
            charts_dir_for(Path::new("out/report.pdf")),
            PathBuf::from("out/charts")
        );
        assert_eq!(charts_dir_for(Path::new("report.pdf")), PathBuf::from("charts"));
    }
}
