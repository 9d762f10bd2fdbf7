use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::batches::{file_outcomes, get_batch, list_batches, purge_all, purge_batch};
use crate::error::{IngestError, Result};
use crate::models::{BatchStatus, FileStatus};

fn status_cell(status: BatchStatus) -> Cell {
    match status {
        BatchStatus::Completed => Cell::new(status.as_str().green()),
        BatchStatus::Failed => Cell::new(status.as_str().red()),
        BatchStatus::Running => Cell::new(status.as_str().yellow()),
    }
}

pub fn list(limit: usize) -> Result<()> {
    let conn = super::open_db()?;
    let batches = list_batches(&conn, limit)?;
    if batches.is_empty() {
        println!("No batches yet. Run `auxiliar ingest <files...>` to load ledgers.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Batch", "Created", "User", "Status", "Files", "Records"]);
    for b in &batches {
        table.add_row(vec![
            Cell::new(&b.batch_id),
            Cell::new(b.created_at.as_deref().unwrap_or("")),
            Cell::new(&b.user),
            status_cell(b.status),
            Cell::new(b.files.len()),
            Cell::new(b.record_count),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn show(batch_id: &str) -> Result<()> {
    let conn = super::open_db()?;
    let batch = get_batch(&conn, batch_id)?.ok_or_else(|| IngestError::UnknownBatch(batch_id.to_string()))?;

    println!("Batch:    {}", batch.batch_id);
    println!("Created:  {}", batch.created_at.as_deref().unwrap_or(""));
    println!("User:     {}", batch.user);
    println!("Status:   {}", batch.status);
    println!("Records:  {}", batch.record_count);
    if let Some(message) = &batch.message {
        println!("Message:  {message}");
    }

    let outcomes = file_outcomes(&conn, batch_id)?;
    if !outcomes.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["File", "Status", "Records", "Checksum", "Detail"]);
        for o in &outcomes {
            let status = match o.status {
                FileStatus::Loaded => o.status.as_str().green(),
                FileStatus::Empty => o.status.as_str().yellow(),
                FileStatus::Unreadable => o.status.as_str().red(),
            };
            table.add_row(vec![
                Cell::new(&o.filename),
                Cell::new(status),
                Cell::new(o.record_count),
                Cell::new(o.checksum.get(..12).unwrap_or(&o.checksum)),
                Cell::new(&o.detail),
            ]);
        }
        println!();
        println!("{table}");
    }
    Ok(())
}

pub fn purge(batch_id: Option<&str>, all: bool) -> Result<()> {
    let mut conn = super::open_db()?;
    if all {
        let removed = purge_all(&mut conn)?;
        println!("Deleted all batches ({removed} transactions).");
        return Ok(());
    }
    let batch_id = batch_id.ok_or_else(|| IngestError::Other("Give a batch id or --all".to_string()))?;
    let removed = purge_batch(&mut conn, batch_id)?;
    println!("Deleted batch {batch_id} ({removed} transactions).");
    Ok(())
}
