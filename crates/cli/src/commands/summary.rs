//! Summary CLI command

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, Summary};
use crate::output::{
    color_status, format_score, format_timestamp, print_heading, print_info, print_json,
    print_rows, print_warning, OutputFormat,
};

/// Row for the service health table
#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Avg Availability")]
    availability: String,
    #[tabled(rename = "Avg Performance")]
    performance: String,
}

/// Row for count tables
#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Count")]
    count: u64,
}

/// Show the analytics summary
pub async fn show_summary(
    client: &ApiClient,
    window_hours: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let path = match window_hours {
        Some(hours) => format!("api/v1/summary?window_hours={}", hours),
        None => "api/v1/summary".to_string(),
    };
    let summary: Summary = client.get(&path).await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => print_summary_table(&summary),
    }

    Ok(())
}

fn print_summary_table(summary: &Summary) {
    print_heading(&format!("Health Analytics Summary (last {}h)", summary.window_hours));
    println!("Generated: {}", format_timestamp(&summary.generated_at));
    println!();

    let quality = &summary.data_quality;
    if quality.total_samples == 0 {
        print_warning("No samples recorded yet");
        return;
    }
    print_info(&format!(
        "{} samples across {} services",
        quality.total_samples, quality.distinct_services
    ));
    if let (Some(oldest), Some(newest)) = (&quality.oldest_sample, &quality.newest_sample) {
        println!(
            "Data range: {} .. {}",
            format_timestamp(oldest),
            format_timestamp(newest)
        );
    }
    println!();

    println!("Anomalies");
    print_counts(&summary.anomaly_counts, "No anomalies in this window");

    println!("Predictions");
    print_counts(&summary.prediction_counts, "No predictions in this window");

    println!("Service Health");
    if summary.service_health.is_empty() {
        print_warning("No samples in this window");
    } else {
        print_rows(
            summary
                .service_health
                .iter()
                .map(|s| ServiceRow {
                    service: s.service_name.clone(),
                    availability: format_score(s.avg_availability),
                    performance: format_score(s.avg_performance),
                })
                .collect(),
        );
    }
}

fn print_counts(counts: &std::collections::BTreeMap<String, u64>, empty_message: &str) {
    if counts.is_empty() {
        print_warning(empty_message);
        return;
    }
    print_rows(
        counts
            .iter()
            .map(|(category, count)| CountRow {
                category: color_status(category),
                count: *count,
            })
            .collect(),
    );
}
