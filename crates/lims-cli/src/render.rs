//! Terminal tables for command output.

use std::collections::BTreeMap;
use std::path::PathBuf;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use lims_ingest::{AbifSummary, MalformedRow};
use lims_model::{
    Batch, BatchNumber, CaseNumber, Conclusion, LocusReading, PLATE_COLUMNS, PLATE_ROWS,
    PaternityReport, PlateMap, Sample, Well, WellType,
};

/// 8 x 12 grid of a plate, one lab number or control marker per well.
pub fn plate_table(map: &PlateMap) -> Table {
    let mut table = Table::new();
    let mut header = vec![Cell::new("")];
    header.extend((1..=PLATE_COLUMNS).map(|column| header_cell(&column.to_string())));
    table.set_header(header);
    apply_grid_style(&mut table);

    for row in 0..PLATE_ROWS {
        let mut cells = Vec::with_capacity(usize::from(PLATE_COLUMNS) + 1);
        for column in 0..PLATE_COLUMNS {
            let Ok(well) = Well::new(row, column) else {
                continue;
            };
            if column == 0 {
                cells.push(header_cell(&well.row_letter().to_string()));
            }
            cells.push(well_cell(map, &well));
        }
        table.add_row(cells);
    }
    table
}

fn well_cell(map: &PlateMap, well: &Well) -> Cell {
    let Some(assignment) = map.get(well) else {
        return dim_cell("-");
    };
    match assignment.well_type() {
        WellType::Sample => match assignment.sample_ref() {
            Some(sample) => Cell::new(sample.lab_number.as_str()),
            None => dim_cell("-"),
        },
        WellType::PositiveControl => Cell::new("POS").fg(Color::Green),
        WellType::NegativeControl => Cell::new("NEG").fg(Color::Red),
        WellType::AllelicLadder => Cell::new("LAD").fg(Color::Magenta),
        WellType::Empty => dim_cell("-"),
    }
}

/// One line per batch with its counts.
pub fn batch_summary(batch: &Batch) -> String {
    let mut line = format!(
        "{} ({}) by {} on {}: {} samples",
        batch.batch_number,
        batch.kind,
        batch.operator,
        batch.created_date.format("%Y-%m-%d %H:%M"),
        batch.sample_count(),
    );
    if let Some(source) = &batch.source_batch {
        line.push_str(&format!(", from {source}"));
    }
    line
}

/// Marker counts per sample of a parsed export.
pub fn readings_table(groups: &BTreeMap<String, Vec<LocusReading>>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Sample"),
        header_cell("Loci"),
        header_cell("Homozygous"),
        header_cell("Missing calls"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for (sample, readings) in groups {
        let homozygous = readings
            .iter()
            .filter(|r| r.alleles().count() == 1)
            .count();
        let missing = readings
            .iter()
            .filter(|r| r.alleles().next().is_none())
            .count();
        table.add_row(vec![
            Cell::new(sample),
            Cell::new(readings.len()),
            Cell::new(homozygous),
            count_cell(missing, Color::Yellow),
        ]);
    }
    table
}

pub fn skipped_table(skipped: &[MalformedRow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Line"),
        header_cell("Columns"),
        header_cell("Reason"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 1, CellAlignment::Right);
    for row in skipped {
        table.add_row(vec![
            Cell::new(row.line),
            Cell::new(row.columns),
            Cell::new(&row.reason),
        ]);
    }
    table
}

pub fn report_table(report: &PaternityReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Marker"),
        header_cell(&report.child_sample_id),
        header_cell(&report.alleged_parent_sample_id),
        header_cell("Shared"),
        header_cell("PI"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    for result in &report.marker_results {
        let shared = if result.compatible {
            Cell::new(result.shared_alleles.join(", ")).fg(Color::Green)
        } else {
            Cell::new("none")
                .fg(Color::Red)
                .add_attribute(Attribute::Bold)
        };
        table.add_row(vec![
            Cell::new(&result.marker),
            Cell::new(result.child_alleles.join(", ")),
            Cell::new(result.parent_alleles.join(", ")),
            shared,
            Cell::new(format!("{:.2}", result.paternity_index)),
        ]);
    }
    table
}

pub fn conclusion_line(report: &PaternityReport) -> String {
    let verdict = match report.conclusion {
        Conclusion::NotExcluded => "paternity not excluded",
        Conclusion::Excluded => "paternity excluded",
        Conclusion::Inconclusive => "inconclusive",
    };
    format!(
        "CPI {:.4e}, W {:.4} % over {} loci ({} incompatible): {verdict}",
        report.combined_pi,
        report.probability_of_relationship,
        report.compared_loci(),
        report.incompatible_loci(),
    )
}

pub fn abif_table(files: &[(PathBuf, AbifSummary)]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Sample"),
        header_cell("Instrument"),
        header_cell("Dyes"),
        header_cell("Channels"),
        header_cell("Entries"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Right);
    for (path, summary) in files {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        table.add_row(vec![
            Cell::new(name),
            optional_cell(summary.sample_name.as_deref()),
            optional_cell(summary.instrument.as_deref()),
            Cell::new(summary.dye_names.join(", ")),
            Cell::new(summary.channel_count),
            Cell::new(summary.entry_count),
        ]);
    }
    table
}

pub fn samples_table(samples: &[Sample]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Lab number"),
        header_cell("Case"),
        header_cell("Relation"),
        header_cell("Status"),
        header_cell("Batch"),
        header_cell("Priority"),
    ]);
    apply_table_style(&mut table);
    for sample in samples {
        let priority = if sample.is_urgent() {
            Cell::new("urgent")
                .fg(Color::Red)
                .add_attribute(Attribute::Bold)
        } else {
            dim_cell("normal")
        };
        table.add_row(vec![
            Cell::new(sample.lab_number.as_str()),
            optional_cell(sample.case_number.as_ref().map(CaseNumber::as_str)),
            Cell::new(sample.relation.as_str()),
            Cell::new(sample.workflow_status.as_str()).fg(Color::Blue),
            optional_cell(sample.batch_id.as_ref().map(BatchNumber::as_str)),
            priority,
        ]);
    }
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_grid_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Disabled);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
