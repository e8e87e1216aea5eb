use super::ui;
use crate::core::Resolution;
use crate::resolver::ExchangeRateService;
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;

pub struct RateRow {
    pub code: String,
    pub resolution: Option<Resolution>,
}

pub fn display_as_table(base: &str, rows: &[RateRow]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Rate (1 {base})")),
        ui::header_cell(&format!("Inverse (per {base})")),
        ui::header_cell("Source"),
    ]);

    for row in rows {
        let rate = row.resolution.map(|r| r.rate);
        table.add_row(vec![
            Cell::new(&row.code),
            ui::rate_cell(rate),
            ui::rate_cell(rate.map(|r| 1.0 / r)),
            ui::source_cell(row.resolution.map(|r| r.source)),
        ]);
    }

    let mut output = format!(
        "Exchange rates for {}\n\n",
        ui::style_text(base, ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output
}

/// Resolves `base -> code` for every code concurrently, keeping input order.
pub async fn fetch_rows(service: &ExchangeRateService, base: &str, codes: &[String]) -> Vec<RateRow> {
    let pb = ui::new_progress_bar(codes.len() as u64, true);
    pb.set_message("Resolving rates...");

    let rate_futures = codes.iter().map(|code| {
        let pb_clone = pb.clone();
        async move {
            let resolution = service.resolve(base, code).await;
            pb_clone.inc(1);
            RateRow {
                code: code.clone(),
                resolution,
            }
        }
    });

    let rows = join_all(rate_futures).await;
    pb.finish_and_clear();
    rows
}

pub async fn run(service: &ExchangeRateService, base: &str, codes: &[String]) -> Result<()> {
    if codes.is_empty() {
        println!("No currencies to show. Pass codes or add a watchlist to the config.");
        return Ok(());
    }

    let rows = fetch_rows(service, base, codes).await;
    println!("{}", display_as_table(base, &rows));
    Ok(())
}
