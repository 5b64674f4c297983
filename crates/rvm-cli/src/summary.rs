use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use crate::commands::{ClearOutcome, FileStatus, InspectReport, OwnerListing};

pub fn print_inspect(report: &InspectReport) {
    println!("File:     {}", report.path.display());
    println!("Saved at: {}", report.saved_at);
    println!("SHA-256:  {}", report.digest);
    if report.entries.is_empty() {
        println!("(no entries)");
        return;
    }
    println!("{}", inspect_table(report));
}

pub fn inspect_table(report: &InspectReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Key", "Type", "Value"]);
    apply_table_style(&mut table);
    for entry in &report.entries {
        table.add_row(vec![
            Cell::new(&entry.key),
            Cell::new(entry.type_name),
            Cell::new(&entry.value),
        ]);
    }
    table
}

pub fn print_list(owners: &[OwnerListing]) {
    if owners.is_empty() {
        println!("No saved state.");
        return;
    }
    println!("{}", list_table(owners));
}

pub fn list_table(owners: &[OwnerListing]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Owner", "View model", "Entries", "Saved at"]);
    apply_table_style(&mut table);
    for owner in owners {
        if owner.files.is_empty() {
            table.add_row(vec![
                Cell::new(&owner.owner),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
            ]);
        }
        for file in &owner.files {
            let row = match &file.status {
                FileStatus::Valid { entries, saved_at } => vec![
                    Cell::new(&owner.owner),
                    Cell::new(&file.view_model),
                    Cell::new(entries),
                    Cell::new(saved_at),
                ],
                FileStatus::Invalid { reason } => vec![
                    Cell::new(&owner.owner),
                    Cell::new(&file.view_model),
                    Cell::new("invalid").fg(Color::Red),
                    Cell::new(reason).fg(Color::Red),
                ],
            };
            table.add_row(row);
        }
    }
    table
}

pub fn print_clear(outcome: &ClearOutcome) {
    println!(
        "Removed {} state file(s) from {}",
        outcome.removed,
        outcome.dir.display()
    );
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}
