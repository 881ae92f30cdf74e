//! `usagectl stats`

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;
use usage_lib::labels::LabelDistribution;
use usage_lib::{TrainingJob, UsageLabel};

use super::{connect, now, TrainingOverrides};
use crate::output::{color_label, print_heading, print_json, print_warning, OutputFormat};

#[derive(Tabled, Serialize)]
struct StationRow {
    #[tabled(rename = "Station")]
    station_id: i32,
    #[tabled(rename = "kW")]
    power_kw: f64,
    #[tabled(rename = "NIL")]
    neighborhood: String,
    #[tabled(rename = "Sessions")]
    sessions: u32,
    #[tabled(rename = "Per day")]
    avg_daily_sessions: String,
    #[tabled(rename = "Avg min")]
    avg_duration_min: String,
    #[tabled(rename = "Avg kWh")]
    avg_energy_kwh: String,
    #[tabled(rename = "Label")]
    label: String,
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    window_days: u32,
    stations: &'a [StationRow],
    distribution: &'a LabelDistribution,
}

/// Print the labeled per-station table without training
pub async fn show_stats(overrides: &TrainingOverrides, format: OutputFormat) -> Result<()> {
    let config = overrides.resolve()?;
    let window_days = config.window_days;
    let source = connect(&config).await?;
    let table = TrainingJob::new(config).prepare(&source, now()).await?;

    let rows: Vec<StationRow> = table
        .stats
        .iter()
        .zip(&table.examples)
        .map(|(s, e)| StationRow {
            station_id: s.station_id,
            power_kw: s.power_kw,
            neighborhood: s.neighborhood.clone(),
            sessions: s.session_count,
            avg_daily_sessions: format!("{:.4}", s.avg_daily_sessions()),
            avg_duration_min: format!("{:.1}", s.avg_duration_min),
            avg_energy_kwh: format!("{:.2}", s.avg_energy_kwh),
            label: match format {
                OutputFormat::Json => e.label.to_string(),
                OutputFormat::Table => color_label(e.label),
            },
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&StatsOutput {
            window_days,
            stations: &rows,
            distribution: &table.distribution,
        })?,
        OutputFormat::Table => {
            print_heading(&format!("Stations (last {} days)", window_days), 60);
            if rows.is_empty() {
                print_warning("No stations found");
                return Ok(());
            }
            let rendered = tabled::Table::new(&rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", rendered);
            println!();
            for label in UsageLabel::ALL {
                println!(
                    "{:<8} {}",
                    color_label(label),
                    table.distribution.count(label)
                );
            }
            if table.distribution.distinct() < 2 {
                print_warning("Fewer than two usage levels present; training would abort");
            }
        }
    }
    Ok(())
}
