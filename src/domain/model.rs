use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A WGS84 latitude/longitude pair. Always in range once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }

    /// Parses two captured decimal strings; anything unparsable is no coordinate.
    pub fn parse(latitude: &str, longitude: &str) -> Option<Self> {
        let lat = latitude.trim().parse::<f64>().ok()?;
        let lon = longitude.trim().parse::<f64>().ok()?;
        Self::new(lat, lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Optional plausibility box. Candidates outside it are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl RegionBounds {
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&coordinate.latitude)
            && (self.min_lon..=self.max_lon).contains(&coordinate.longitude)
    }
}

/// One row of the input table as the resolver sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRecord {
    pub index: usize,
    pub url: String,
    pub existing: Option<Coordinate>,
}

impl InputRecord {
    /// A stored latitude without a longitude (or vice versa) counts as nothing stored.
    pub fn new(index: usize, url: &str, latitude: &str, longitude: &str) -> Self {
        let existing = if latitude.trim().is_empty() || longitude.trim().is_empty() {
            None
        } else {
            Coordinate::parse(latitude, longitude)
        };
        Self {
            index,
            url: url.trim().to_string(),
            existing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Coordinates were already present in the table.
    Provided,
    /// The source URL itself carried `@lat,lon`.
    EmbeddedUrl,
    UrlPattern,
    HtmlPattern,
    Geocode,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Provided => "provided",
            Strategy::EmbeddedUrl => "embedded_url",
            Strategy::UrlPattern => "url_pattern",
            Strategy::HtmlPattern => "html_pattern",
            Strategy::Geocode => "geocode",
        };
        f.write_str(name)
    }
}

/// Result of a single stage in the strategy chain.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Resolved(Coordinate),
    NeedsNextStrategy,
    Failed(String),
}

/// Transient record of one strategy run, kept for debug logging.
#[derive(Debug, Clone)]
pub struct ResolutionAttempt {
    pub strategy: Strategy,
    pub raw_response: String,
    pub outcome: StrategyOutcome,
}

impl ResolutionAttempt {
    const EXCERPT_LEN: usize = 160;

    pub fn new(strategy: Strategy, raw_response: &str, outcome: StrategyOutcome) -> Self {
        let raw_response = raw_response.chars().take(Self::EXCERPT_LEN).collect();
        Self {
            strategy,
            raw_response,
            outcome,
        }
    }
}

/// What the final URL fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub final_url: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub index: usize,
    pub coordinate: Option<Coordinate>,
    pub strategy: Option<Strategy>,
    /// Decoded final URL, set only when it carries an embedded coordinate.
    pub expanded_url: Option<String>,
    pub error: Option<String>,
    pub touched_network: bool,
}

impl RecordOutcome {
    pub fn skipped(index: usize, coordinate: Coordinate, strategy: Strategy) -> Self {
        Self {
            index,
            coordinate: Some(coordinate),
            strategy: Some(strategy),
            expanded_url: None,
            error: None,
            touched_network: false,
        }
    }

    pub fn unresolved(index: usize, error: Option<String>, touched_network: bool) -> Self {
        Self {
            index,
            coordinate: None,
            strategy: None,
            expanded_url: None,
            error,
            touched_network,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinate.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRecord {
    pub index: usize,
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub resolved_url_pattern: usize,
    pub resolved_html_pattern: usize,
    pub resolved_geocode: usize,
    pub unresolved: usize,
    pub interrupted: bool,
    pub failures: Vec<FailedRecord>,
}

impl ResolutionReport {
    pub fn new(total: usize) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            total,
            processed: 0,
            skipped: 0,
            resolved_url_pattern: 0,
            resolved_html_pattern: 0,
            resolved_geocode: 0,
            unresolved: 0,
            interrupted: false,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: &RecordOutcome, url: &str) {
        self.processed += 1;
        match outcome.strategy {
            Some(Strategy::Provided) | Some(Strategy::EmbeddedUrl) => self.skipped += 1,
            Some(Strategy::UrlPattern) => self.resolved_url_pattern += 1,
            Some(Strategy::HtmlPattern) => self.resolved_html_pattern += 1,
            Some(Strategy::Geocode) => self.resolved_geocode += 1,
            None => self.unresolved += 1,
        }
        if !outcome.is_resolved() {
            if let Some(error) = &outcome.error {
                self.failures.push(FailedRecord {
                    index: outcome.index,
                    url: url.to_string(),
                    error: error.clone(),
                });
            }
        }
    }

    pub fn resolved(&self) -> usize {
        self.resolved_url_pattern + self.resolved_html_pattern + self.resolved_geocode
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

/// In-memory table: header row plus string cells, updated in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Returns the index of `name`, appending an empty column when absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: String) {
        if let Some(r) = self.rows.get_mut(row) {
            if r.len() <= column {
                r.resize(column + 1, String::new());
            }
            r[column] = value;
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Output of the transform phase.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub table: Table,
    pub report: ResolutionReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(19.4326, -99.1332).is_some());
        assert!(Coordinate::new(91.0, 0.0).is_none());
        assert!(Coordinate::new(0.0, -180.5).is_none());
        assert!(Coordinate::new(f64::NAN, 0.0).is_none());
        assert!(Coordinate::parse("abc", "1.0").is_none());
    }

    #[test]
    fn test_input_record_requires_both_columns() {
        let record = InputRecord::new(0, " https://maps.app.goo.gl/x ", "19.4", "");
        assert_eq!(record.existing, None);
        assert_eq!(record.url, "https://maps.app.goo.gl/x");

        let record = InputRecord::new(1, "u", "19.4", "-99.1");
        assert_eq!(record.existing, Coordinate::new(19.4, -99.1));
    }

    #[test]
    fn test_report_counts_by_strategy() {
        let mut report = ResolutionReport::new(3);
        let coord = Coordinate::new(1.0, 2.0).unwrap();
        report.record(&RecordOutcome::skipped(0, coord, Strategy::EmbeddedUrl), "a");
        report.record(
            &RecordOutcome {
                strategy: Some(Strategy::Geocode),
                ..RecordOutcome::skipped(1, coord, Strategy::Geocode)
            },
            "b",
        );
        report.record(
            &RecordOutcome::unresolved(2, Some("timeout".to_string()), true),
            "c",
        );

        assert_eq!(report.skipped, 1);
        assert_eq!(report.resolved(), 1);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 2);
    }

    #[test]
    fn test_table_ensure_column_pads_rows() {
        let mut table = Table {
            headers: vec!["google_maps_url".to_string()],
            rows: vec![vec!["a".to_string()], vec!["b".to_string()]],
        };
        let lat = table.ensure_column("latitud");
        assert_eq!(lat, 1);
        assert_eq!(table.ensure_column("latitud"), 1);
        assert_eq!(table.cell(1, lat), "");
        table.set_cell(1, lat, "19.4".to_string());
        assert_eq!(table.cell(1, lat), "19.4");
        assert_eq!(table.cell(5, lat), "");
    }

    #[test]
    fn test_region_bounds() {
        let cdmx = RegionBounds {
            min_lat: 19.0,
            max_lat: 19.7,
            min_lon: -99.4,
            max_lon: -98.9,
        };
        assert!(cdmx.contains(&Coordinate::new(19.4326, -99.1332).unwrap()));
        assert!(!cdmx.contains(&Coordinate::new(40.4, -3.7).unwrap()));
    }
}
