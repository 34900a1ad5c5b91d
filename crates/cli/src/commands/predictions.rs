//! Trend prediction CLI command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, PredictionList};
use crate::output::{
    color_confidence, color_status, print_heading, print_json, print_rows, print_warning,
    OutputFormat,
};

/// Row for predictions table
#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "Predicted")]
    predicted: String,
    #[tabled(rename = "Slope")]
    slope: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

/// Forecast a service and show the result
pub async fn show_predictions(
    client: &ApiClient,
    service: &str,
    horizon_hours: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let mut path = format!("api/v1/predictions/{}", service);
    if let Some(hours) = horizon_hours {
        path.push_str(&format!("?horizon_hours={}", hours));
    }
    let result: PredictionList = client.get(&path).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_heading("Trend Predictions");
            println!("Service: {}", result.service_name.cyan());
            println!("Horizon: {}h", result.horizon_hours);
            println!();

            if result.predictions.is_empty() {
                print_warning("Not enough history to forecast this service");
                return Ok(());
            }

            let rows: Vec<PredictionRow> = result
                .predictions
                .iter()
                .map(|p| PredictionRow {
                    metric: p.metric.clone(),
                    trend: color_status(&p.classification),
                    predicted: format!("{:.1}", p.predicted_value),
                    slope: format!("{:+.4}", p.trend_slope),
                    confidence: color_confidence(p.confidence),
                })
                .collect();
            print_rows(rows);

            println!();
            for prediction in &result.predictions {
                println!("  {}", prediction.description);
            }
        }
    }

    Ok(())
}
