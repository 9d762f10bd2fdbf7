use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("User:       {}", settings.default_user());
    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        let batches: i64 = conn.query_row("SELECT count(*) FROM batches", [], |r| r.get(0))?;
        let failed: i64 = conn.query_row(
            "SELECT count(*) FROM batches WHERE status = 'failed'",
            [],
            |r| r.get(0),
        )?;
        let transactions: i64 = conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?;
        let accounts: i64 = conn.query_row(
            "SELECT count(DISTINCT account_code) FROM transactions",
            [],
            |r| r.get(0),
        )?;

        println!();
        println!("Batches:       {batches} ({failed} failed)");
        println!("Transactions:  {transactions}");
        println!("Accounts:      {accounts}");
    } else {
        println!();
        println!("Database not found. Run `auxiliar init` to set up.");
    }

    Ok(())
}
