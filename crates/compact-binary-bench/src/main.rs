//! Benchmark for compact binary using synthetic build records.
//!
//! Writes the same record set as compact binary, JSON and zstd-compressed
//! JSON, then times validation and a full read of the compact binary buffer.

use std::time::Instant;

use compact_binary::{fields, validate_range, ValidateError, ValidateMode, Value, Writer};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

const DEFAULT_RECORDS: usize = 50_000;
const VALIDATE_ITERS: u32 = 10;

// =============================================================================
// SYNTHETIC DATA
// =============================================================================

#[derive(Debug, Serialize)]
struct BuildRecord {
    id: Uuid,
    target: String,
    platform: &'static str,
    #[serde(serialize_with = "hex_digest")]
    output: [u8; 32],
    #[serde(serialize_with = "hex_digests")]
    inputs: Vec<[u8; 32]>,
    warnings: i64,
    cache_hit: bool,
    duration_ticks: i64,
    started_ticks: i64,
    cpu_load: f64,
}

fn hex_digest<S: serde::Serializer>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_hex(hash))
}

fn hex_digests<S: serde::Serializer>(hashes: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(hashes.iter().map(to_hex))
}

fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

fn digest(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

const PLATFORMS: [&str; 4] = ["Win64", "Linux", "Mac", "Android"];

fn make_records(count: usize) -> Vec<BuildRecord> {
    (0..count)
        .map(|i| {
            let target = format!("Module{:05}", i);
            let inputs = (0..(i % 7) + 1)
                .map(|j| digest(format!("{}/Source{}.cpp", target, j).as_bytes()))
                .collect();
            BuildRecord {
                id: Uuid::new_v4(),
                platform: PLATFORMS[i % PLATFORMS.len()],
                output: digest(target.as_bytes()),
                inputs,
                warnings: (i % 13) as i64 - 2,
                cache_hit: i % 3 == 0,
                duration_ticks: 10_000 * (i as i64 % 997 + 1),
                started_ticks: 638_000_000_000_000_000 + 10_000_000 * i as i64,
                cpu_load: (i % 100) as f64 / 8.0,
                target,
            }
        })
        .collect()
}

// =============================================================================
// ENCODING
// =============================================================================

fn write_record(writer: &mut Writer, record: &BuildRecord) {
    writer.begin_object();
    writer.name("id").uuid(record.id);
    writer.name("target").string(&record.target);
    writer.name("platform").string(record.platform);
    writer.name("output").hash(&record.output);
    writer.name("inputs").begin_array();
    for input in &record.inputs {
        writer.reference(input);
    }
    writer.end_array();
    writer.name("warnings").int64(record.warnings);
    writer.name("cache_hit").bool(record.cache_hit);
    writer.name("duration").time_span(record.duration_ticks);
    writer.name("started").date_time(record.started_ticks);
    writer.name("cpu_load").float64(record.cpu_load);
    writer.end_object();
}

fn encode_records(records: &[BuildRecord]) -> Vec<u8> {
    let mut writer = Writer::with_capacity(records.len() * 256);
    for record in records {
        write_record(&mut writer, record);
    }
    writer.into_bytes()
}

/// Reads every field of every record, returning the number of leaf values.
fn read_all(data: &[u8]) -> usize {
    fn count(value: Value<'_>) -> usize {
        match value {
            Value::Object(children) | Value::Array(children) => children
                .map(|child| count(child.and_then(|c| c.value()).expect("validated")))
                .sum(),
            _ => 1,
        }
    }
    fields(data)
        .map(|field| count(field.and_then(|f| f.value()).expect("validated")))
        .sum()
}

fn mb_per_sec(bytes: usize, secs: f64) -> f64 {
    (bytes as f64 / 1_000_000.0) / secs
}

fn main() {
    let count = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_RECORDS);

    let records = make_records(count);
    println!("Generated {} build records", records.len());

    // Compact binary
    let encode_start = Instant::now();
    let encoded = encode_records(&records);
    let encode_time = encode_start.elapsed();
    println!("\nCompact binary: {} bytes in {:?}", encoded.len(), encode_time);
    println!(
        "  Throughput: {:.2} MB/s",
        mb_per_sec(encoded.len(), encode_time.as_secs_f64())
    );

    // Validation
    assert_eq!(validate_range(&encoded, ValidateMode::ALL), ValidateError::NONE);
    for (label, mode) in [
        ("default", ValidateMode::DEFAULT),
        ("all", ValidateMode::ALL),
    ] {
        let start = Instant::now();
        for _ in 0..VALIDATE_ITERS {
            assert!(validate_range(&encoded, mode).is_none());
        }
        let time = start.elapsed() / VALIDATE_ITERS;
        println!(
            "\nValidate ({}): {:?} (avg of {} iterations)",
            label, time, VALIDATE_ITERS
        );
        println!(
            "  Throughput: {:.2} MB/s",
            mb_per_sec(encoded.len(), time.as_secs_f64())
        );
    }

    // Read back
    let read_start = Instant::now();
    let leaves = read_all(&encoded);
    let read_time = read_start.elapsed();
    println!("\nRead: {} values in {:?}", leaves, read_time);

    // JSON
    let json_start = Instant::now();
    let json = serde_json::to_vec(&records).expect("Failed to serialize JSON");
    let json_time = json_start.elapsed();
    println!("\nJSON: {} bytes in {:?}", json.len(), json_time);

    // Compressed
    let cb_compressed = zstd::bulk::compress(&encoded, 3).expect("Failed to compress");
    let json_compressed = zstd::bulk::compress(&json, 3).expect("Failed to compress");

    // Summary
    println!("\n=== Summary ===");
    println!("Records: {}", records.len());
    println!(
        "JSON size: {} bytes ({:.1} MB)",
        json.len(),
        json.len() as f64 / 1_000_000.0
    );
    println!(
        "JSON + zstd: {} bytes ({:.1} MB)",
        json_compressed.len(),
        json_compressed.len() as f64 / 1_000_000.0
    );
    println!(
        "Compact binary: {} bytes ({:.1} MB)",
        encoded.len(),
        encoded.len() as f64 / 1_000_000.0
    );
    println!(
        "Compact binary + zstd: {} bytes ({:.1} MB)",
        cb_compressed.len(),
        cb_compressed.len() as f64 / 1_000_000.0
    );
    println!(
        "Size vs JSON: {:.1}% (uncompressed), {:.1}% (compressed vs JSON + zstd)",
        100.0 * encoded.len() as f64 / json.len() as f64,
        100.0 * cb_compressed.len() as f64 / json_compressed.len() as f64
    );
}
