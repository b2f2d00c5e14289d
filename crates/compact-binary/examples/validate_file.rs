//! Validates a compact binary file and dumps its fields.

use std::fs;

use compact_binary::{fields, validate_range, FieldView, ValidateMode, Value};

fn format_hash(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

fn format_value(value: &Value<'_>) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("{}", b),
        Value::Object(_) => "{".to_string(),
        Value::Array(_) => "[".to_string(),
        Value::Binary(bytes) => format!("BINARY[{}]", bytes.len()),
        Value::String(s) => {
            let preview: String = s.chars().take(80).collect();
            if s.chars().count() > 80 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        Value::Integer(n) => format!("{}", n),
        Value::Float32(f) => format!("{:.6}f", f),
        Value::Float64(f) => format!("{:.6}", f),
        Value::Reference(hash) => format!("REF({})", format_hash(hash)),
        Value::BinaryReference(hash) => format!("BINREF({})", format_hash(hash)),
        Value::Hash(hash) => format!("HASH({})", format_hash(hash)),
        Value::Uuid(id) => format!("UUID({})", id),
        Value::DateTime(ticks) => format!("DATETIME({})", ticks),
        Value::TimeSpan(ticks) => format!("TIMESPAN({})", ticks),
    }
}

fn dump(field: &FieldView<'_>, depth: usize, limit: &mut usize) {
    if *limit == 0 {
        return;
    }
    *limit -= 1;

    let indent = "  ".repeat(depth);
    let label = field.name().map(|n| format!("{}: ", n)).unwrap_or_default();
    let value = match field.value() {
        Ok(value) => value,
        Err(e) => {
            println!("{}{}<{}>", indent, label, e);
            return;
        }
    };
    println!("{}{}{} ({})", indent, label, format_value(&value), field.field_type());

    if let Value::Object(children) | Value::Array(children) = value {
        for child in children {
            match child {
                Ok(child) => dump(&child, depth + 1, limit),
                Err(e) => println!("{}  <{}>", indent, e),
            }
        }
        println!("{}{}", indent, if field.field_type().is_object() { "}" } else { "]" });
    }
}

fn main() {
    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: validate_file <path>");
            std::process::exit(2);
        }
    };

    println!("Reading: {}", path);

    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    };
    println!("File size: {} bytes", data.len());

    println!("\n=== Validation ===");
    for (label, mode) in [
        ("default", ValidateMode::DEFAULT),
        ("names", ValidateMode::NAMES),
        ("format", ValidateMode::FORMAT),
        ("padding", ValidateMode::PADDING),
        ("all", ValidateMode::ALL),
    ] {
        println!("  {:<8} {}", label, validate_range(&data, mode));
    }

    println!("\n=== Fields (first 200) ===");
    let mut limit = 200;
    for field in fields(&data) {
        match field {
            Ok(field) => dump(&field, 0, &mut limit),
            Err(e) => {
                println!("<{}>", e);
                break;
            }
        }
    }
}
