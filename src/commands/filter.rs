use anyhow::{Context, Result};

use rankmatch::analysis::select_domains;
use rankmatch::config::Config;
use rankmatch::input::{DataSource, InputLoader};

/// Print the in-scope domains without calling the ranking API
pub async fn filter(config: Config, domains: String) -> Result<()> {
    let loader =
        InputLoader::new(config.request_timeout()).context("Failed to create HTTP client")?;
    let source = DataSource::parse(&domains);
    let loaded = loader.load_domains(&source).await;

    if let Some(error) = &loaded.error {
        eprintln!("Warning: {error}");
    }

    let selected = select_domains(&config, &loaded.records);

    println!("Domain Filter");
    println!("=============");
    println!("Source: {source}");
    println!("Inclusion terms: {}", config.matching.inclusion_terms.join(", "));
    println!("Loaded: {}", loaded.records.len());
    println!("In scope: {}\n", selected.len());

    for record in &selected {
        println!("{}", record.domain);
    }

    Ok(())
}
