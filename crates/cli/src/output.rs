//! Result rendering: pretty JSON, YAML, or plain aligned tables.

use anyhow::Result;
use clap::ValueEnum;
use daiteap_api::{data_rows, scalar_to_string};
use serde_json::Value;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Output { Human, Json, Yaml }

/// Print a command response. Human mode falls back to indented JSON.
pub fn print_value(v: &Value, output: Output) -> Result<()> {
    match output {
        Output::Human | Output::Json => println!("{}", serde_json::to_string_pretty(v)?),
        Output::Yaml => print!("{}", serde_yaml::to_string(v)?),
    }
    Ok(())
}

/// One table column: header text and the key it reads from each row.
pub struct Column {
    pub header: &'static str,
    pub key: &'static str,
}

pub const PROJECT_COLUMNS: &[Column] = &[
    Column { header: "Name", key: "name" },
    Column { header: "Created at", key: "created_at" },
    Column { header: "Contact", key: "contact" },
];

pub const BUCKET_COLUMNS: &[Column] = &[
    Column { header: "Name", key: "name" },
    Column { header: "Cloud", key: "provider" },
    Column { header: "Project", key: "project" },
    Column { header: "Credential", key: "credential" },
    Column { header: "Created At", key: "created_at" },
];

/// Print a listing response as a table (human) or as-is (json/yaml).
pub fn print_listing(v: &Value, columns: &[Column], output: Output) -> Result<()> {
    match output {
        Output::Human => {
            print!("{}", render_table(columns, data_rows(v)));
            Ok(())
        }
        _ => print_value(v, output),
    }
}

pub fn render_table(columns: &[Column], rows: &[Value]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| render_cell(c.key, row.get(c.key).unwrap_or(&Value::Null))).collect())
        .collect();
    let mut widths: Vec<usize> = columns.iter().map(|c| c.header.chars().count()).collect();
    for r in &cells {
        for (w, cell) in widths.iter_mut().zip(r) { *w = (*w).max(cell.chars().count()); }
    }
    let mut out = String::new();
    let headers: Vec<String> = columns.iter().map(|c| c.header.to_string()).collect();
    push_line(&mut out, &headers, &widths);
    for r in &cells { push_line(&mut out, r, &widths); }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells.iter().zip(widths).map(|(c, w)| format!("{:<width$}", c, width = *w)).collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn render_cell(key: &str, v: &Value) -> String {
    let s = scalar_to_string(v);
    if key.starts_with("created") { render_timestamp(&s) } else { s }
}

/// RFC 3339 timestamps become `YYYY-MM-DD HH:MM:SS`; anything else is shown as-is.
pub fn render_timestamp(s: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => s.to_string(),
    }
}
