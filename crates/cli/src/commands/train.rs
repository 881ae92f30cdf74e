//! `usagectl train`

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;
use usage_lib::{TrainingJob, TrainingReport, UsageLabel};

use super::{connect, now, TrainingOverrides};
use crate::output::{
    color_accuracy, format_accuracy, print_heading, print_info, print_json, print_success,
    print_warning, OutputFormat,
};

#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Accuracy")]
    accuracy: String,
    #[tabled(rename = "Macro F1")]
    macro_f1: String,
    #[tabled(rename = "")]
    winner: String,
}

/// Train, select and (unless dry-run) persist a new pipeline
pub async fn run_train(overrides: &TrainingOverrides, dry_run: bool, format: OutputFormat) -> Result<()> {
    let config = overrides.resolve()?;
    let source = connect(&config).await?;

    if matches!(format, OutputFormat::Table) {
        print_info(&format!(
            "Training on the last {} days (test fraction {}, seed {})",
            config.window_days, config.test_fraction, config.seed
        ));
    }

    let report = TrainingJob::new(config).dry_run(dry_run).run(&source, now()).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!();
    print_heading("Label distribution", 40);
    for label in UsageLabel::ALL {
        println!("{:<8} {}", label.as_str(), report.distribution.count(label));
    }
    println!("{:<8} {}", "total", report.station_count);
    println!();

    let rows: Vec<CandidateRow> = report
        .candidates
        .iter()
        .map(|c| {
            let macro_f1 = if c.report.is_empty() {
                0.0
            } else {
                c.report.iter().map(|s| s.f1).sum::<f64>() / c.report.len() as f64
            };
            CandidateRow {
                model: c.family.to_string(),
                accuracy: color_accuracy(c.accuracy),
                macro_f1: format!("{:.3}", macro_f1),
                winner: if c.family == report.winner {
                    "★".yellow().to_string()
                } else {
                    String::new()
                },
            }
        })
        .collect();

    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
    println!(
        "\nTrain/test: {}/{} stations",
        report.train_size, report.test_size
    );

    match (&report.artifact_path, &report.checksum) {
        (Some(path), Some(checksum)) => {
            print_success(&format!(
                "{} selected ({}); artifact written to {} (sha256 {})",
                report.winner,
                format_accuracy(report.accuracy),
                path.display(),
                &checksum[..12.min(checksum.len())]
            ));
        }
        _ => print_warning(&format!(
            "Dry run: {} would be selected ({}); no artifact written",
            report.winner,
            format_accuracy(report.accuracy)
        )),
    }
}
