//! Output formatting for session responses.

use comfy_table::{Cell, ContentArrangement, Table};

use opal_sql::SessionResponse;

/// Renders the result set as a table.
pub fn format_response(response: &SessionResponse) -> String {
    let mut table = Table::new();

    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    if !response.column_names.is_empty() {
        table.set_header(response.column_names.iter().map(Cell::new));
    }

    for record in &response.records {
        table.add_row(record.fields().iter().map(Cell::new));
    }

    table.to_string()
}

/// Renders the per-stage timings, one line per stage.
pub fn format_times(response: &SessionResponse) -> String {
    response
        .query_times
        .iter()
        .map(|(stage, elapsed)| {
            format!("{stage}: {:.3}ms", elapsed.as_secs_f64() * 1000.0)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
