//! `usagectl predict`

use anyhow::Result;
use usage_lib::StationFeatures;

use crate::client::ApiClient;
use crate::output::{color_label, print_json, print_success, OutputFormat};

/// Ask the server to classify one station
pub async fn predict(client: &ApiClient, features: StationFeatures, format: OutputFormat) -> Result<()> {
    let response = client.predict(&features).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => print_success(&format!(
            "Predicted usage level for {} kW station in {}: {}",
            features.power_kw,
            features.neighborhood,
            color_label(response.predicted_usage_level)
        )),
    }
    Ok(())
}
