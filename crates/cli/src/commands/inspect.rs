//! `usagectl inspect`

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tabled::Tabled;
use usage_lib::artifact::{self, LoadedArtifact};
use usage_lib::UsageLabel;

use crate::output::{color_accuracy, format_accuracy, print_heading, print_json, OutputFormat};

#[derive(Tabled)]
struct ScoreRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
    #[tabled(rename = "Support")]
    support: usize,
}

/// Print the metadata of a persisted pipeline
pub fn inspect_artifact(path: &Path, format: OutputFormat) -> Result<()> {
    let loaded = artifact::load(path)
        .with_context(|| format!("Failed to load artifact {}", path.display()))?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": loaded.path,
            "checksum": loaded.checksum,
            "feature_names": loaded.artifact.feature_names,
            "metadata": loaded.artifact.metadata,
        }))?,
        OutputFormat::Table => print_summary(&loaded),
    }
    Ok(())
}

fn print_summary(loaded: &LoadedArtifact) {
    let meta = &loaded.artifact.metadata;

    print_heading("Pipeline artifact", 60);
    println!("Path:        {}", loaded.path.display().to_string().cyan());
    println!("SHA-256:     {}", loaded.checksum);
    println!("Trained at:  {}", meta.trained_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Model:       {}", meta.family.to_string().bold());
    println!("Accuracy:    {}", color_accuracy(meta.accuracy));
    println!("Features:    {}", loaded.artifact.feature_names.join(", "));
    println!(
        "Stations:    {} ({} train / {} test), window {} days, seed {}",
        meta.station_count, meta.train_size, meta.test_size, meta.window_days, meta.seed
    );
    let counts: Vec<String> = UsageLabel::ALL
        .iter()
        .map(|l| format!("{}={}", l, meta.label_counts.get(l).copied().unwrap_or(0)))
        .collect();
    println!("Labels:      {}", counts.join(" "));
    println!();

    let rows: Vec<ScoreRow> = meta
        .candidates
        .iter()
        .flat_map(|c| {
            c.report.iter().map(move |s| ScoreRow {
                model: format!("{} ({})", c.family, format_accuracy(c.accuracy)),
                label: s.label.to_string(),
                precision: format!("{:.3}", s.precision),
                recall: format!("{:.3}", s.recall),
                f1: format!("{:.3}", s.f1),
                support: s.support,
            })
        })
        .collect();

    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
}
