use super::ui;
use crate::core::{LocalRateStore, RateKey};
use crate::providers::{KvRateStore, StoredRate};
use anyhow::{Context, Result};
use comfy_table::Cell;

pub fn display_as_table(rates: &[(RateKey, StoredRate)]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("From"),
        ui::header_cell("To"),
        ui::header_cell("Rate"),
        ui::header_cell("Updated (UTC)"),
    ]);

    for (key, stored) in rates {
        table.add_row(vec![
            Cell::new(&key.from),
            Cell::new(&key.to),
            ui::rate_cell(Some(stored.rate)),
            Cell::new(stored.updated_at.format("%Y-%m-%d %H:%M")),
        ]);
    }

    table.to_string()
}

pub async fn run(store: &KvRateStore) -> Result<()> {
    if !store.is_ready() {
        println!("Local rate store is not available.");
        return Ok(());
    }
    let rates = store.list().await.context("Failed to read stored rates")?;
    if rates.is_empty() {
        println!("No stored rates.");
        return Ok(());
    }
    println!("{}", display_as_table(&rates));
    Ok(())
}

pub async fn run_clear(store: &KvRateStore) -> Result<()> {
    if !store.is_ready() {
        println!("Local rate store is not available.");
        return Ok(());
    }
    store.clear().await.context("Failed to clear stored rates")?;
    println!(
        "{}",
        ui::style_text("Cleared stored rates.", ui::StyleType::Subtle)
    );
    Ok(())
}
