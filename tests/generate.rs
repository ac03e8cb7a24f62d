use std::fs;
use std::path::Path;

use alert_report::charts::{ChartOutput, MITRE_FILE, SEVERITY_FILE, TIME_SERIES_FILE};
use alert_report::fonts;
use alert_report::{load_summary, AlertSummary, ReportConfig, ReportError, ReportGenerator};

fn summary_json(total_alerts: u64, mitre: &str) -> String {
    format!(
        r#"{{
            "group": "web-servers",
            "total_alerts": {total_alerts},
            "alerts_by_level": {{"3": 60, "7": 30, "12": 10}},
            "alerts_by_category": {{"syslog": 40, "sshd": 25, "web": 20, "pam": 10, "ossec": 4, "rootcheck": 1}},
            "alerts_by_mitre": {mitre},
            "time_analysis": {{
                "first_alert": "2024-05-01T00:12:00Z",
                "last_alert": "2024-05-01T05:40:00Z",
                "alerts_by_hour": {{"00": 12, "01": 30, "02": 8, "03": 20, "04": 25, "05": 5}}
            }},
            "agents_overview": [
                {{"name": "web-01", "total_alerts": 70, "highest_level": 12,
                  "last_alert": "2024-05-01T05:40:00Z", "categories": ["syslog", "web"]}},
                {{"name": "web-02", "total_alerts": 30, "highest_level": 7,
                  "last_alert": "2024-05-01T03:10:00Z", "categories": []}}
            ]
        }}"#
    )
}

fn write_summary(dir: &Path, json: &str) -> AlertSummary {
    let path = dir.join("summary.json");
    fs::write(&path, json).expect("write summary");
    load_summary(&path).expect("summary loads")
}

fn generator() -> ReportGenerator {
    ReportGenerator::new(ReportConfig::default())
}

#[test]
fn generates_pdf_and_all_charts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let summary = write_summary(
        dir.path(),
        &summary_json(100, r#"{"Initial Access": 6, "Persistence": 4}"#),
    );
    let output = dir.path().join("report.pdf");

    let result = generator().generate(&summary, &output);

    let charts = dir.path().join("charts");
    for file in [TIME_SERIES_FILE, SEVERITY_FILE, MITRE_FILE] {
        assert!(charts.join(file).is_file(), "{file} should be written");
    }

    if !fonts::default_fonts_available() {
        eprintln!("Skipping PDF checks in generates_pdf_and_all_charts: report fonts missing.");
        return;
    }
    let outcome = result.expect("report generates");
    assert_eq!(outcome.pdf_path, output);
    assert_eq!(outcome.charts.mitre, ChartOutput::Written(charts.join(MITRE_FILE)));
    let bytes = fs::read(&output).expect("pdf written");
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(bytes.len(), outcome.bytes);
}

#[test]
fn empty_mitre_leaves_no_chart_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("report.pdf");
    let mitre = dir.path().join("charts").join(MITRE_FILE);

    let with_mitre = write_summary(dir.path(), &summary_json(100, r#"{"Discovery": 3}"#));
    let _ = generator().generate(&with_mitre, &output);
    assert!(mitre.is_file());

    let without_mitre = write_summary(dir.path(), &summary_json(100, "{}"));
    let result = generator().generate(&without_mitre, &output);
    assert!(!mitre.exists(), "stale MITRE chart should be removed");

    if fonts::default_fonts_available() {
        let outcome = result.expect("report generates");
        assert_eq!(outcome.charts.mitre, ChartOutput::Skipped);
    }
}

#[test]
fn zero_total_fails_without_writing_pdf() {
    let dir = tempfile::tempdir().expect("tempdir");
    let summary = write_summary(dir.path(), &summary_json(0, "{}"));
    let output = dir.path().join("report.pdf");

    let err = generator()
        .generate(&summary, &output)
        .expect_err("zero total must fail");

    assert!(matches!(err, ReportError::ZeroTotal));
    assert!(!output.exists());
    assert!(dir.path().join("charts").join(TIME_SERIES_FILE).is_file());
}

#[test]
fn rerun_overwrites_previous_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let summary = write_summary(dir.path(), &summary_json(100, "{}"));
    let output = dir.path().join("report.pdf");
    let charts = dir.path().join("charts");
    fs::create_dir_all(&charts).expect("charts dir");
    fs::write(charts.join(SEVERITY_FILE), b"stale").expect("seed chart");
    fs::write(&output, b"stale").expect("seed pdf");

    let result = generator().generate(&summary, &output);
    assert_ne!(fs::read(charts.join(SEVERITY_FILE)).expect("chart"), b"stale");

    if !fonts::default_fonts_available() {
        eprintln!("Skipping PDF checks in rerun_overwrites_previous_output: report fonts missing.");
        return;
    }
    result.expect("report generates");
    assert!(fs::read(&output).expect("pdf").starts_with(b"%PDF"));
}

#[test]
fn output_directory_is_created() {
    let dir = tempfile::tempdir().expect("tempdir");
    let summary = write_summary(dir.path(), &summary_json(100, "{}"));
    let output = dir.path().join("nested").join("out").join("report.pdf");

    let _ = generator().generate(&summary, &output);
    assert!(dir
        .path()
        .join("nested/out/charts")
        .join(TIME_SERIES_FILE)
        .is_file());
}
