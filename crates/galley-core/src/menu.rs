//! # Menu Engineering
//!
//! Ranks recipes by popularity and contribution margin.
//!
//! ## Quadrants
//! ```text
//!                    margin ≥ benchmark      margin < benchmark
//!                  ┌─────────────────────┬─────────────────────┐
//!  popular         │        STAR         │      WORKHORSE      │
//!  (≥ 0.7 × mean)  │                     │                     │
//!                  ├─────────────────────┼─────────────────────┤
//!  unpopular       │       PUZZLE        │         DOG         │
//!                  └─────────────────────┴─────────────────────┘
//! ```
//!
//! - popularity = units sold in the period
//! - benchmark margin = Σ(margin × popularity) / Σ(popularity), or the median
//!   margin when configured; with nothing sold the weighted mean falls back to
//!   the plain mean of margins

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::DEFAULT_POPULARITY_FACTOR;

// =============================================================================
// Configuration
// =============================================================================

/// How the profitability benchmark is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MarginBenchmark {
    /// Contribution-weighted mean margin.
    #[default]
    WeightedMean,
    /// Median margin across recipes in scope.
    Median,
}

impl std::str::FromStr for MarginBenchmark {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weighted_mean" | "mean" => Ok(MarginBenchmark::WeightedMean),
            "median" => Ok(MarginBenchmark::Median),
            other => Err(format!(
                "Unknown margin benchmark: '{}'. Valid options: weighted_mean, median",
                other
            )),
        }
    }
}

/// Classifier tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Fraction of mean popularity a recipe must reach to count as popular.
    pub popularity_factor: f64,
    pub margin_benchmark: MarginBenchmark,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        ClassifierSettings {
            popularity_factor: DEFAULT_POPULARITY_FACTOR,
            margin_benchmark: MarginBenchmark::default(),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    Star,
    Workhorse,
    Puzzle,
    Dog,
}

impl Quadrant {
    pub fn from_flags(popular: bool, profitable: bool) -> Self {
        match (popular, profitable) {
            (true, true) => Quadrant::Star,
            (true, false) => Quadrant::Workhorse,
            (false, true) => Quadrant::Puzzle,
            (false, false) => Quadrant::Dog,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::Star => "star",
            Quadrant::Workhorse => "workhorse",
            Quadrant::Puzzle => "puzzle",
            Quadrant::Dog => "dog",
        }
    }
}

/// One recipe as seen by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItemInput {
    pub recipe_id: String,
    pub name: String,
    pub sell_price: Money,
    /// Per-portion ingredient cost, fractional cents.
    pub cost_cents: f64,
    /// Units sold in the period.
    pub popularity: f64,
}

impl MenuItemInput {
    pub fn margin_cents(&self) -> f64 {
        self.sell_price.as_f64() - self.cost_cents
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MenuItemClass {
    pub recipe_id: String,
    pub name: String,
    pub margin_cents: f64,
    pub popularity: f64,
    pub quadrant: Quadrant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MenuEngineeringReport {
    pub mean_popularity: f64,
    pub popularity_threshold: f64,
    pub benchmark_margin_cents: f64,
    pub items: Vec<MenuItemClass>,
}

// =============================================================================
// Classifier
// =============================================================================

/// Classifies every item into a quadrant.
///
/// An empty input produces an empty report with zero benchmarks.
pub fn classify(items: &[MenuItemInput], settings: &ClassifierSettings) -> MenuEngineeringReport {
    if items.is_empty() {
        return MenuEngineeringReport {
            mean_popularity: 0.0,
            popularity_threshold: 0.0,
            benchmark_margin_cents: 0.0,
            items: Vec::new(),
        };
    }

    let count = items.len() as f64;
    let total_popularity: f64 = items.iter().map(|i| i.popularity).sum();
    let mean_popularity = total_popularity / count;
    let popularity_threshold = settings.popularity_factor * mean_popularity;

    let benchmark_margin_cents = match settings.margin_benchmark {
        MarginBenchmark::WeightedMean => weighted_mean_margin(items),
        MarginBenchmark::Median => median_margin(items),
    };

    let items = items
        .iter()
        .map(|item| {
            let margin_cents = item.margin_cents();
            let popular = item.popularity >= popularity_threshold;
            let profitable = margin_cents >= benchmark_margin_cents;
            MenuItemClass {
                recipe_id: item.recipe_id.clone(),
                name: item.name.clone(),
                margin_cents,
                popularity: item.popularity,
                quadrant: Quadrant::from_flags(popular, profitable),
            }
        })
        .collect();

    MenuEngineeringReport {
        mean_popularity,
        popularity_threshold,
        benchmark_margin_cents,
        items,
    }
}

fn weighted_mean_margin(items: &[MenuItemInput]) -> f64 {
    let total_popularity: f64 = items.iter().map(|i| i.popularity).sum();
    if total_popularity <= 0.0 {
        let sum: f64 = items.iter().map(|i| i.margin_cents()).sum();
        return sum / items.len() as f64;
    }
    let weighted: f64 = items.iter().map(|i| i.margin_cents() * i.popularity).sum();
    weighted / total_popularity
}

fn median_margin(items: &[MenuItemInput]) -> f64 {
    let mut margins: Vec<f64> = items.iter().map(|i| i.margin_cents()).collect();
    margins.sort_by(|a, b| a.total_cmp(b));
    let mid = margins.len() / 2;
    if margins.len() % 2 == 0 {
        (margins[mid - 1] + margins[mid]) / 2.0
    } else {
        margins[mid]
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, price: i64, cost: f64, popularity: f64) -> MenuItemInput {
        MenuItemInput {
            recipe_id: id.to_string(),
            name: id.to_uppercase(),
            sell_price: Money::from_cents(price),
            cost_cents: cost,
            popularity,
        }
    }

    fn quadrant_of(report: &MenuEngineeringReport, id: &str) -> Quadrant {
        report
            .items
            .iter()
            .find(|i| i.recipe_id == id)
            .map(|i| i.quadrant)
            .unwrap()
    }

    #[test]
    fn test_four_quadrants() {
        // A: popular, thin margin   B: rare, fat margin
        // C: popular, fat margin    D: rare, thin margin
        let items = vec![
            item("a", 1000, 900.0, 100.0),
            item("b", 2000, 1000.0, 10.0),
            item("c", 2000, 1000.0, 100.0),
            item("d", 1000, 900.0, 10.0),
        ];
        let report = classify(&items, &ClassifierSettings::default());

        assert!((report.mean_popularity - 55.0).abs() < 1e-9);
        assert!((report.popularity_threshold - 38.5).abs() < 1e-9);
        // (100×100 + 1000×10 + 1000×100 + 100×10) / 220 = 550
        assert!((report.benchmark_margin_cents - 550.0).abs() < 1e-9);

        assert_eq!(quadrant_of(&report, "a"), Quadrant::Workhorse);
        assert_eq!(quadrant_of(&report, "b"), Quadrant::Puzzle);
        assert_eq!(quadrant_of(&report, "c"), Quadrant::Star);
        assert_eq!(quadrant_of(&report, "d"), Quadrant::Dog);
    }

    #[test]
    fn test_popularity_threshold_is_inclusive() {
        // mean = 10, threshold = 7: exactly 7 counts as popular
        let items = vec![item("x", 1000, 0.0, 7.0), item("y", 1000, 0.0, 13.0)];
        let report = classify(&items, &ClassifierSettings::default());
        assert_eq!(quadrant_of(&report, "x"), Quadrant::Star);
    }

    #[test]
    fn test_nothing_sold_uses_plain_mean() {
        let items = vec![item("x", 1000, 0.0, 0.0), item("y", 3000, 0.0, 0.0)];
        let report = classify(&items, &ClassifierSettings::default());
        assert!((report.benchmark_margin_cents - 2000.0).abs() < 1e-9);
        // zero popularity ≥ 0.7 × 0: everything is "popular"
        assert_eq!(quadrant_of(&report, "x"), Quadrant::Workhorse);
        assert_eq!(quadrant_of(&report, "y"), Quadrant::Star);
    }

    #[test]
    fn test_median_benchmark() {
        let settings = ClassifierSettings {
            margin_benchmark: MarginBenchmark::Median,
            ..ClassifierSettings::default()
        };
        let items = vec![
            item("a", 1000, 0.0, 1.0),
            item("b", 2000, 0.0, 1.0),
            item("c", 9000, 0.0, 1.0),
        ];
        let report = classify(&items, &settings);
        assert!((report.benchmark_margin_cents - 2000.0).abs() < 1e-9);
        assert_eq!(quadrant_of(&report, "a"), Quadrant::Workhorse);
    }

    #[test]
    fn test_empty_input() {
        let report = classify(&[], &ClassifierSettings::default());
        assert!(report.items.is_empty());
    }

    #[test]
    fn test_benchmark_parsing() {
        assert_eq!("median".parse::<MarginBenchmark>().unwrap(), MarginBenchmark::Median);
        assert_eq!("MEAN".parse::<MarginBenchmark>().unwrap(), MarginBenchmark::WeightedMean);
        assert!("mode".parse::<MarginBenchmark>().is_err());
    }
}
