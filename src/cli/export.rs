use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use super::FilterArgs;
use crate::error::Result;
use crate::reports::export_csv;
use crate::settings::{get_data_dir, shellexpand_path};

fn default_output() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    get_data_dir().join("exports").join(format!("auxiliar-{stamp}.csv"))
}

pub fn run(filters: &FilterArgs, output: Option<String>, limit: Option<usize>) -> Result<()> {
    let conn = super::open_db()?;
    let mut filter = filters.to_filter()?;
    filter.limit = limit;

    let path = output
        .map(|o| PathBuf::from(shellexpand_path(&o)))
        .unwrap_or_else(default_output);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let written = export_csv(&conn, &filter, BufWriter::new(File::create(&path)?))?;
    println!("Exported {written} transactions to {}", path.display());
    Ok(())
}
