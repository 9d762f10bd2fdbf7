use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::account::{decode, validate, AccountField, CodeIssue};
use crate::error::Result;

pub fn run(code: &str, json: bool) -> Result<()> {
    let components = decode(code);
    if json {
        println!("{}", serde_json::to_string_pretty(&components)?);
        return Ok(());
    }

    match validate(code) {
        Some(CodeIssue::Empty) => println!("{}", "Code has no letters or digits; every component is zero.".yellow()),
        Some(CodeIssue::TooLong(n)) => println!(
            "{}",
            format!("Code has {n} significant characters; only the first 21 are used.").yellow()
        ),
        None => {}
    }

    let mut table = Table::new();
    table.set_header(vec!["Component", "Offset", "Width", "Value"]);
    let mut offset = 0;
    for field in AccountField::ALL {
        table.add_row(vec![
            Cell::new(field.key()),
            Cell::new(offset),
            Cell::new(field.width()),
            Cell::new(field.get(&components)),
        ]);
        offset += field.width();
    }
    println!("{table}");
    println!("Canonical:  {}", components.canonical());
    Ok(())
}
