use std::path::Path;

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use mastertable_core::outputs::OutputFormat;
use mastertable_core::summary::RunSummary;
use mastertable_core::MasterRow;

pub fn summary_table(summary: &RunSummary, output: &Path, format: OutputFormat) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Item", "Value"]);

    table.add_row(vec!["Run".to_string(), summary.run_id.to_string()]);
    table.add_row(vec![
        "Output".to_string(),
        format!("{} ({})", output.display(), format.as_str()),
    ]);
    for source in &summary.sources {
        table.add_row(vec![
            source.kind.to_string(),
            format!(
                "{} rows, {} usable, blake3 {}",
                source.rows_loaded,
                source.rows_usable,
                short_hash(&source.content_hash)
            ),
        ]);
    }
    table.add_row(vec!["Batches".to_string(), summary.batch_count.to_string()]);
    table.add_row(vec!["Columns".to_string(), summary.column_count.to_string()]);
    let types: Vec<String> = summary
        .column_types
        .iter()
        .map(|(dtype, count)| format!("{dtype}: {count}"))
        .collect();
    table.add_row(vec!["Column types".to_string(), types.join(", ")]);
    table.add_row(vec!["Missing cells".to_string(), summary.missing_cells.to_string()]);
    table.add_row(vec!["Warnings".to_string(), summary.warning_count.to_string()]);
    table
}

/// One line per event window of `row`, with the average of every parameter.
pub fn batch_overview(row: &MasterRow, parameter_labels: &[String]) -> Table {
    let mut header = vec![
        format!("Batch {}", row.batch_id),
        "Start".to_string(),
        "End".to_string(),
        "Valve".to_string(),
        "Pump".to_string(),
    ];
    header.extend(parameter_labels.iter().map(|label| format!("Avg{label}")));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for event in &row.events {
        let mut cells = vec![
            event.event.clone(),
            event.start.clone().unwrap_or_else(|| "-".to_string()),
            event.end.clone().unwrap_or_else(|| "-".to_string()),
            format!(
                "{} ({})",
                event.valve_status_at_start,
                format_value(event.valve_position_at_start)
            ),
            format_value(event.avg_pump_speed),
        ];
        cells.extend(event.parameters.iter().map(|stats| format_value(stats.mean)));
        table.add_row(cells);
    }
    table
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.3}"),
        None => "NaN".to_string(),
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mastertable_core::{run_pipeline, CollectingObserver, PipelineConfig, PipelineInputs};

    fn output() -> mastertable_core::PipelineOutput {
        let inputs = PipelineInputs::from_strings(
            "Time,Parameter1,Parameter2,Parameter3\n\
             2024-03-01 10:02:00,5,1,2\n\
             2024-03-01 10:05:00,7,1,2\n",
            "Batch_ID,E1_start,E1_end\nB1,2024-03-01 10:00:00,2024-03-01 10:10:00\n",
            "Time,valve_position,pump_speed\n2024-03-01 10:00:00,0,1500\n",
        )
        .unwrap();
        let config = PipelineConfig {
            event_names: vec!["E1".into(), "E2".into()],
            ..PipelineConfig::default()
        };
        run_pipeline(&config, &inputs, &CollectingObserver::new()).unwrap()
    }

    #[test]
    fn summary_lists_sources_and_shape() {
        let output = output();
        let rendered = summary_table(&output.summary, Path::new("Master_table.csv"), OutputFormat::Csv)
            .to_string();

        assert!(rendered.contains("Master_table.csv (csv)"));
        assert!(rendered.contains("process_parameters"));
        assert!(rendered.contains("Batches"));
        assert!(rendered.contains(&short_hash(&output.summary.sources[0].content_hash).to_string()));
    }

    #[test]
    fn overview_shows_each_event_window() {
        let output = output();
        let row = &output.master.rows()[0];
        let rendered = batch_overview(row, output.master.parameter_labels()).to_string();

        assert!(rendered.contains("Batch B1"));
        assert!(rendered.contains("Closed (0.000)"));
        assert!(rendered.contains("6.000"));
        assert!(rendered.contains("Unknown (NaN)"));
    }

    #[test]
    fn short_hash_handles_short_input() {
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
    }
}
