use std::path::Path;

use colored::Colorize;

use crate::batches::find_loaded_checksum;
use crate::error::{IngestError, Result};
use crate::fmt::{format_bytes, short_id};
use crate::importer::{compute_checksum, process, SourceFile};
use crate::progress::ProgressReporter;
use crate::settings::load_settings;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsb", "ods"];
/// Largest workbook accepted for ingestion.
pub const MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

fn check_size(path: &Path, size: u64) -> Result<()> {
    if size > MAX_FILE_SIZE {
        return Err(IngestError::UnsupportedFile(format!(
            "{} is too large ({}; the limit is {})",
            path.display(),
            format_bytes(size),
            format_bytes(MAX_FILE_SIZE)
        )));
    }
    Ok(())
}

fn load_source(path: &Path) -> Result<SourceFile> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(IngestError::UnsupportedFile(format!(
            "{} (expected one of: {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    check_size(path, std::fs::metadata(path)?.len())?;
    let bytes = std::fs::read(path)?;
    Ok(SourceFile::new(name, bytes))
}

pub fn run(files: &[String], user: Option<String>, workers: Option<usize>, batch_size: Option<usize>) -> Result<()> {
    let settings = load_settings();
    let mut config = settings.ingest_config();
    if let Some(w) = workers {
        config.max_parallel_readers = w.max(1);
    }
    if let Some(b) = batch_size {
        config.persistence_batch_size = b.max(1);
    }
    let user = user.unwrap_or_else(|| settings.default_user().to_string());

    let sources = files
        .iter()
        .map(|f| load_source(Path::new(f)))
        .collect::<Result<Vec<_>>>()?;

    let mut conn = super::open_db()?;
    for source in &sources {
        if let Some(batch) = find_loaded_checksum(&conn, &compute_checksum(&source.bytes))? {
            println!(
                "{}",
                format!("{} was already loaded in batch {}; loading again.", source.name, short_id(&batch)).yellow()
            );
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let summary = runtime.block_on(async {
        let (mut progress, mut rx) = ProgressReporter::channel();
        let printer = tokio::spawn(async move {
            while let Some(p) = rx.recv().await {
                println!("[{:>3}%] {}", p.percent, p.message);
            }
        });
        let result = process(&mut conn, sources, &user, &config, &mut progress).await;
        drop(progress);
        printer.await?;
        result
    })?;

    println!();
    println!(
        "{} {} records from {} file(s) in batch {}",
        "Loaded".green().bold(),
        summary.record_count,
        summary.loaded_files.len(),
        summary.batch_id
    );
    if !summary.failed_files.is_empty() {
        println!("{} {}", "Failed files:".yellow(), summary.failed_files.join(", "));
    }
    if summary.invalid_dates > 0 {
        println!("{} {} row(s) have unparseable dates", "Note:".yellow(), summary.invalid_dates);
    }
    if summary.out_of_range_amounts > 0 {
        println!(
            "{} {} amount(s) were too large to store and were saved as zero",
            "Note:".yellow(),
            summary.out_of_range_amounts
        );
    }
    Ok(())
}
