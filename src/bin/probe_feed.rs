//! Probe: result feed endpoint
//!
//! Hits the configured feed URL (or `--url`) and documents:
//! - Response shape (bare array, `results` wrapper, `data` wrapper)
//! - Element count and field names
//! - Latency over multiple requests
//! - What survives normalization

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

use roll_signal::api::normalize_outcomes;
use roll_signal::classifier::classify;
use roll_signal::config::{AppConfig, CONFIG_PATH};

#[derive(Parser)]
#[command(name = "probe_feed", about = "Inspect the result feed response")]
struct Args {
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Feed URL, overrides feed.url
    #[arg(long)]
    url: Option<String>,

    /// Number of timed requests for the latency check
    #[arg(long, default_value_t = 5)]
    samples: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config)?;
    let url = args.url.unwrap_or(config.feed.url);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.feed.request_timeout_ms))
        .build()?;

    println!("=== Probe: result feed ===");
    println!("URL: {url}");
    println!();

    // 1. Single fetch
    println!("--- 1. Fetch ---");
    let start = Instant::now();
    let resp = client.get(&url).send().await?;
    let latency = start.elapsed();
    let status = resp.status();
    let body: Value = resp.json().await?;
    println!("Status: {status}");
    println!("Latency: {latency:?}");

    let (shape, items) = match &body {
        Value::Array(items) => ("bare array", Some(items)),
        Value::Object(map) => match (map.get("results"), map.get("data")) {
            (Some(Value::Array(items)), _) => ("{results: [...]}", Some(items)),
            (_, Some(Value::Array(items))) => ("{data: [...]}", Some(items)),
            _ => ("object without results/data", None),
        },
        _ => ("unexpected scalar", None),
    };
    println!("Shape: {shape}");
    match items {
        Some(items) => {
            println!("Element count: {}", items.len());
            if let Some(first) = items.first() {
                println!("\nSample element (first):");
                println!("{}", serde_json::to_string_pretty(first)?);
                if let Some(obj) = first.as_object() {
                    println!("\nFields present:");
                    for key in obj.keys() {
                        println!("  - {key}");
                    }
                }
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&body)?),
    }
    println!();

    // 2. Normalization
    println!("--- 2. Normalized ---");
    let records = normalize_outcomes(&body);
    println!("Accepted records: {}", records.len());
    for r in records.iter().take(20) {
        let color = classify(u32::from(r.roll));
        let agrees = color.code() == r.color_code;
        println!(
            "  {:<24} roll={:>2} code={} {:?}{} at {}",
            r.id,
            r.roll,
            r.color_code,
            color,
            if agrees { "" } else { " (code disagrees)" },
            r.occurred_at.to_rfc3339()
        );
    }
    println!();

    // 3. Latency
    println!("--- 3. Latency over {} requests ---", args.samples);
    let mut latencies = Vec::new();
    for _ in 0..args.samples {
        let start = Instant::now();
        let ok = client
            .get(&url)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        let elapsed = start.elapsed();
        println!("  {:?} ({})", elapsed, if ok { "ok" } else { "failed" });
        latencies.push(elapsed);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    if !latencies.is_empty() {
        let total: Duration = latencies.iter().sum();
        println!("Average: {:?}", total / latencies.len() as u32);
    }

    Ok(())
}
