use prettytable::{format, row, Cell, Row, Table};
use crate::models::report::Report;
use crate::models::verdict::State;

fn state_style(state: State) -> &'static str {
    match state {
        State::Valid => "Fg",
        State::Missing => "Fy",
        State::Invalid | State::Error => "Fr",
    }
}

pub(crate) fn build_result_table(report: &Report) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(row!["group", "id", "method", "url", "state"]);
    for record in report.records() {
        let state = record.verdict.state();
        table.add_row(Row::new(vec![
            Cell::new(&record.group),
            Cell::new(&record.id),
            Cell::new(&record.method),
            Cell::new(&record.path),
            Cell::new(&state.to_string()).style_spec(state_style(state)),
        ]));
    }
    table
}

pub(crate) fn build_summary_table(report: &Report) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(row!["group", "probes", "summary"]);
    for group in &report.groups {
        let summary = group.summary();
        table.add_row(Row::new(vec![
            Cell::new(&group.name),
            Cell::new(&group.endpoints.len().to_string()),
            Cell::new(&summary.to_string()).style_spec(state_style(summary)),
        ]));
    }
    table
}

/// Prints the per-probe table and the group summaries to stdout.
pub fn show_result_with_table(report: &Report) {
    println!("Probes:");
    build_result_table(report).printstd();
    println!("Groups:");
    build_summary_table(report).printstd();
}
