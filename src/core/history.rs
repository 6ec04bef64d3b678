//! Synthetic funding projection for the chart panel
//!
//! The contract keeps no funding history, so the chart shows a straight-line
//! projection from zero up to the current total, one bucket per month ending
//! at the current month. It is NOT a record of past on-chain state, and the
//! type says so.

use crate::core::types::FundingHistoryPoint;
use chrono::{Datelike, Months, NaiveDate};

/// Number of monthly buckets in the projection
pub const DEFAULT_HISTORY_BUCKETS: usize = 6;

/// Where a projection's numbers came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionSource {
    /// Linear interpolation of live totals
    Interpolated,
    /// Hardcoded placeholder series, only produced when demo data is enabled
    DemoPlaceholder,
}

/// A synthetic, time-bucketed projection of the funding totals
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticProjection {
    pub points: Vec<FundingHistoryPoint>,
    pub source: ProjectionSource,
}

impl SyntheticProjection {
    /// Interpolate linearly between zero and `total_eth` over `buckets` months
    /// ending at the month of `today`.
    pub fn interpolate(
        total_eth: f64,
        eth_price: f64,
        today: NaiveDate,
        buckets: usize,
    ) -> SyntheticProjection {
        let buckets = buckets.max(1);
        let last = (buckets - 1) as f64;
        let mut points = Vec::with_capacity(buckets);

        for back in (0..buckets).rev() {
            let eth_amount = if buckets == 1 {
                total_eth
            } else {
                total_eth * (last - back as f64) / last
            };
            points.push(FundingHistoryPoint {
                label: month_label(today, back as u32),
                eth_amount,
                usd_amount: eth_amount * eth_price,
            });
        }

        SyntheticProjection {
            points,
            source: ProjectionSource::Interpolated,
        }
    }

    /// Placeholder series shown when the live data could not be read at all
    pub fn demo(eth_price: f64) -> SyntheticProjection {
        let sample = [
            ("Jan", 0.5),
            ("Feb", 1.2),
            ("Mar", 2.8),
            ("Apr", 5.5),
            ("May", 8.9),
            ("Jun", 12.45),
        ];
        let points = sample
            .iter()
            .map(|(label, eth)| FundingHistoryPoint {
                label: label.to_string(),
                eth_amount: *eth,
                usd_amount: eth * eth_price,
            })
            .collect();

        SyntheticProjection {
            points,
            source: ProjectionSource::DemoPlaceholder,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.source == ProjectionSource::DemoPlaceholder
    }
}

/// Short month name (`"Jan"`) for `months_back` months before `today`
fn month_label(today: NaiveDate, months_back: u32) -> String {
    let first_of_month = today.with_day(1).unwrap_or(today);
    first_of_month
        .checked_sub_months(Months::new(months_back))
        .unwrap_or(first_of_month)
        .format("%b")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_interpolation_is_linear_from_zero() {
        let projection = SyntheticProjection::interpolate(10.0, 2000.0, date(2024, 6, 15), 6);
        assert_eq!(projection.source, ProjectionSource::Interpolated);
        assert_eq!(projection.points.len(), 6);

        let eth: Vec<f64> = projection.points.iter().map(|p| p.eth_amount).collect();
        assert_eq!(eth, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(projection.points[5].usd_amount, 20_000.0);
    }

    #[test]
    fn test_labels_end_at_current_month() {
        let projection = SyntheticProjection::interpolate(1.0, 1.0, date(2024, 2, 29), 6);
        let labels: Vec<&str> = projection.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Sep", "Oct", "Nov", "Dec", "Jan", "Feb"]);
    }

    #[test]
    fn test_single_bucket_shows_total() {
        let projection = SyntheticProjection::interpolate(3.0, 2.0, date(2024, 1, 1), 1);
        assert_eq!(projection.points.len(), 1);
        assert_eq!(projection.points[0].eth_amount, 3.0);
        assert_eq!(projection.points[0].usd_amount, 6.0);
    }

    #[test]
    fn test_demo_is_flagged() {
        let projection = SyntheticProjection::demo(100.0);
        assert!(projection.is_placeholder());
        assert_eq!(projection.points.last().unwrap().eth_amount, 12.45);
    }
}
