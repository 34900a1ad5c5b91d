//! Sample recording CLI command

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, SampleRequest, SampleResponse};
use crate::output::{
    color_confidence, color_status, print_json, print_rows, print_success, print_warning,
    OutputFormat,
};

/// Row for anomalies table
#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Record a sample and show any anomalies it triggered
pub async fn record_sample(
    client: &ApiClient,
    request: &SampleRequest,
    format: OutputFormat,
) -> Result<()> {
    let response: SampleResponse = client.post("api/v1/samples", request).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if response.recorded {
                print_success(&format!("Recorded sample for {}", request.service_name));
            } else {
                print_warning("Agent could not persist the sample");
            }

            if response.anomalies.is_empty() {
                println!("No anomalies detected");
                return Ok(());
            }

            let rows: Vec<AnomalyRow> = response
                .anomalies
                .iter()
                .map(|a| AnomalyRow {
                    kind: a.kind.clone(),
                    severity: color_status(&a.severity),
                    confidence: color_confidence(a.confidence),
                    description: a.description.clone(),
                })
                .collect();
            print_rows(rows);
        }
    }

    Ok(())
}
