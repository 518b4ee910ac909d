//! Logical request identification
//!
//! A request is a kind (current conditions, forecast, city search, or
//! coordinate lookup) plus a subject. The pair maps deterministically to a
//! fingerprint string that keys both the cache and request coalescing.

use std::fmt;

/// What the caller wants from the weather API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Current conditions for a city
    Current,
    /// 5-day / 3-hour forecast for a city
    Forecast,
    /// City search by name prefix
    Search,
    /// Current conditions at a latitude/longitude
    Coordinates,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Current => "current",
            RequestKind::Forecast => "forecast",
            RequestKind::Search => "search",
            RequestKind::Coordinates => "coords",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The thing a request is about
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    /// A city name, e.g. "Paris"
    City(String),
    /// A free-text search query
    Query(String),
    /// A latitude/longitude pair
    Coords { lat: f64, lon: f64 },
}

impl Subject {
    /// Filesystem- and key-safe slug for this subject
    ///
    /// City names and queries are lowercased and any character outside
    /// `[a-z0-9.-]` becomes `_`, so "New York" and "new york" share one
    /// cache entry and the fingerprint is a valid file name.
    fn slug(&self) -> String {
        match self {
            Subject::City(name) | Subject::Query(name) => name
                .trim()
                .to_lowercase()
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect(),
            Subject::Coords { lat, lon } => format!("{}_{}", lat, lon),
        }
    }
}

/// Deterministic cache/rate-limit key for a `(kind, subject)` pair
///
/// Produces `current_<city>`, `forecast_<city>`, `search_<query>` and
/// `coords_<lat>_<lon>`.
pub fn fingerprint(kind: RequestKind, subject: &Subject) -> String {
    format!("{}_{}", kind.as_str(), subject.slug())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_shapes() {
        assert_eq!(
            fingerprint(RequestKind::Current, &Subject::City("Paris".to_string())),
            "current_paris"
        );
        assert_eq!(
            fingerprint(RequestKind::Forecast, &Subject::City("London".to_string())),
            "forecast_london"
        );
        assert_eq!(
            fingerprint(RequestKind::Search, &Subject::Query("par".to_string())),
            "search_par"
        );
        assert_eq!(
            fingerprint(
                RequestKind::Coordinates,
                &Subject::Coords {
                    lat: 48.85,
                    lon: 2.35
                }
            ),
            "coords_48.85_2.35"
        );
    }

    #[test]
    fn test_fingerprint_normalizes_case_and_whitespace() {
        let a = fingerprint(RequestKind::Current, &Subject::City("New York".to_string()));
        let b = fingerprint(
            RequestKind::Current,
            &Subject::City("  new york ".to_string()),
        );
        assert_eq!(a, "current_new_york");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_kinds_never_collide() {
        let subject = Subject::City("Paris".to_string());
        assert_ne!(
            fingerprint(RequestKind::Current, &subject),
            fingerprint(RequestKind::Forecast, &subject)
        );
    }
}
