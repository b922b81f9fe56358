//! Build a filter from a small dataset, persist it, and score a batch against it.
use std::fs;

use molbloom::{BloomFilter, BloomFilterConfig, ScoringFunction};
use tracing_subscriber::EnvFilter;

/// Accepts strings made of a few SMILES characters. A real run would call into
/// a chemistry toolkit here.
fn canonicalize(smiles: &str) -> Option<String> {
    let smiles = smiles.trim();

    if !smiles.is_empty() && smiles.chars().all(|c| "CNOcno()=#123".contains(c)) {
        Some(smiles.to_owned())
    } else {
        None
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("molbloom=info".parse()?))
        .init();

    let dir = std::env::temp_dir().join("molbloom-demo");
    fs::create_dir_all(&dir)?;
    let dataset = dir.join("sample.smi");
    fs::write(&dataset, "CCO\nCCN\nCCC\nc1ccccc1\n")?;

    let config = BloomFilterConfig::new("training set")
        .dataset_path(&dataset)
        .filter_path(dir.join("sample.bloom"))
        .worker_count(2);
    let bf = BloomFilter::new(config, canonicalize)?;

    let batch = vec![
        "CCO".to_owned(),
        "XYZ123invalid".to_owned(),
        "CCCC".to_owned(),
    ];
    for record in bf.score(&batch) {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
