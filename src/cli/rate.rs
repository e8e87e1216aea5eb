use super::ui;
use crate::core::{Resolution, Source};
use crate::resolver::ExchangeRateService;
use anyhow::Result;

pub fn format_resolution(from: &str, to: &str, resolution: Option<Resolution>) -> String {
    match resolution {
        Some(resolution) => format!(
            "1 {from} = {} {to} {}",
            ui::style_text(&ui::format_rate(resolution.rate), ui::StyleType::Value),
            ui::style_text(&format!("({})", resolution.source), ui::StyleType::Subtle)
        ),
        None => format!(
            "{from} -> {to}: {}",
            ui::style_text("unavailable", ui::StyleType::Error)
        ),
    }
}

pub fn format_conversion(amount: f64, from: &str, to: &str, converted: Option<f64>) -> String {
    match converted {
        Some(value) => format!(
            "{amount:.2} {from} = {} {to}",
            ui::style_text(&format!("{value:.2}"), ui::StyleType::Value)
        ),
        None => format!(
            "{amount:.2} {from} {}",
            ui::style_text(
                &format!("(no rate to {to}, shown unconverted)"),
                ui::StyleType::Subtle
            )
        ),
    }
}

/// Rate for the `rate` command, bypassing cached values when `refresh` is set.
pub async fn lookup(
    service: &ExchangeRateService,
    from: &str,
    to: &str,
    refresh: bool,
) -> Option<Resolution> {
    if !refresh {
        return service.resolve(from, to).await;
    }
    let source = if from == to {
        Source::Identity
    } else {
        Source::External
    };
    service
        .force_update_rate(from, to)
        .await
        .map(|rate| Resolution { rate, source })
}

/// Converted amount, or `None` when no rate is available.
///
/// `ExchangeRateService::convert` hides a miss by returning the amount, so the
/// rate is looked up here once and applied directly.
pub async fn converted_amount(
    service: &ExchangeRateService,
    amount: f64,
    from: &str,
    to: &str,
) -> Option<f64> {
    if from == to {
        return Some(amount);
    }
    service.get_rate(from, to).await.map(|rate| amount * rate)
}

pub async fn run(service: &ExchangeRateService, from: &str, to: &str, refresh: bool) -> Result<()> {
    let resolution = lookup(service, from, to, refresh).await;
    println!("{}", format_resolution(from, to, resolution));
    Ok(())
}

pub async fn run_convert(
    service: &ExchangeRateService,
    amount: f64,
    from: &str,
    to: &str,
) -> Result<()> {
    let converted = converted_amount(service, amount, from, to).await;
    println!("{}", format_conversion(amount, from, to, converted));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LocalRateStore, RateError, RateSource};
    use crate::providers::KvRateStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        rate: f64,
        call_count: AtomicUsize,
    }

    #[async_trait]
    impl RateSource for FixedSource {
        fn source(&self) -> Source {
            Source::External
        }

        async fn lookup(&self, _from: &str, _to: &str) -> Result<Option<f64>, RateError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(Some(self.rate))
        }
    }

    fn service_with(source: &Arc<FixedSource>) -> ExchangeRateService {
        ExchangeRateService::new(
            Arc::new(KvRateStore::unavailable()) as Arc<dyn LocalRateStore>,
            None,
            Arc::clone(source) as Arc<dyn RateSource>,
        )
        // Nothing stays fresh, every lookup goes to the source
        .with_cache_duration(Duration::zero())
    }

    fn fixed(rate: f64) -> Arc<FixedSource> {
        Arc::new(FixedSource {
            rate,
            call_count: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_refresh_same_currency_is_identity() {
        let source = fixed(0.9);
        let service = service_with(&source);

        let resolution = lookup(&service, "EUR", "EUR", true).await.unwrap();
        assert_eq!(resolution.rate, 1.0);
        assert_eq!(resolution.source, Source::Identity);
        assert_eq!(source.call_count.load(Ordering::SeqCst), 0);

        let resolution = lookup(&service, "USD", "EUR", true).await.unwrap();
        assert_eq!(resolution.source, Source::External);
    }

    #[tokio::test]
    async fn test_conversion_looks_rate_up_once() {
        let source = fixed(75.5);
        let service = service_with(&source);

        let converted = converted_amount(&service, 2.0, "USD", "RUB").await;
        assert_eq!(converted, Some(151.0));
        assert_eq!(source.call_count.load(Ordering::SeqCst), 1);

        assert_eq!(converted_amount(&service, 3.0, "RUB", "RUB").await, Some(3.0));
        assert_eq!(source.call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_format_resolution() {
        console::set_colors_enabled(false);

        let found = Resolution {
            rate: 0.9134,
            source: Source::Backend,
        };
        assert_eq!(
            format_resolution("USD", "EUR", Some(found)),
            "1 USD = 0.913400 EUR (backend)"
        );
        assert_eq!(
            format_resolution("USD", "XYZ", None),
            "USD -> XYZ: unavailable"
        );
    }

    #[test]
    fn test_format_conversion() {
        console::set_colors_enabled(false);

        assert_eq!(
            format_conversion(1_000_000.0, "USD", "RUB", Some(75_500_000.0)),
            "1000000.00 USD = 75500000.00 RUB"
        );
        assert_eq!(
            format_conversion(42.5, "EUR", "XYZ", None),
            "42.50 EUR (no rate to XYZ, shown unconverted)"
        );
    }
}
