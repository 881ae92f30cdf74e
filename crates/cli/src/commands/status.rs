//! `usagectl status`

use anyhow::Result;
use colored::Colorize;

use crate::client::ApiClient;
use crate::output::{color_status, print_heading, print_json, print_success, print_warning, OutputFormat};

/// Show server readiness and component health
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, readiness) = client.readiness().await?;
    let (_, health) = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "readiness": readiness,
            "health": health,
        }))?,
        OutputFormat::Table => {
            print_heading("Server status", 50);
            if readiness.ready {
                print_success("Ready");
            } else {
                print_warning(&format!(
                    "Not ready: {}",
                    readiness.reason.as_deref().unwrap_or("unknown reason")
                ));
            }
            println!();
            println!("Health: {}", color_status(health.status));

            let mut names: Vec<&String> = health.components.keys().collect();
            names.sort();
            for name in names {
                let component = &health.components[name];
                println!(
                    "  {:<10} {} {}",
                    name.cyan(),
                    color_status(component.status),
                    component.message.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}
