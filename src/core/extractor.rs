//! Pattern-based coordinate extraction from URLs and HTML. No network access.

use crate::domain::model::Coordinate;
use regex::Regex;
use std::sync::LazyLock;

/// `@lat,lon` as the maps service writes it into a resolved place URL.
static URL_AT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").expect("valid regex"));

/// `"center": {"lat": X, "lng": Y}` block in the search page.
static HTML_CENTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""center":\s*\{\s*"lat":\s*(-?\d+\.\d+),\s*"lng":\s*(-?\d+\.\d+)"#)
        .expect("valid regex")
});

/// First `[[lat,lng` tuple after the page's initialization state marker.
static HTML_APP_STATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"APP_INITIALIZATION_STATE.*?\[\[(-?\d+\.\d+),(-?\d+\.\d+)")
        .expect("valid regex")
});

fn first_match(pattern: &Regex, haystack: &str) -> Option<Coordinate> {
    let caps = pattern.captures(haystack)?;
    Coordinate::parse(caps.get(1)?.as_str(), caps.get(2)?.as_str())
}

/// Pre-flight check: does this URL already carry a resolved place?
pub fn has_embedded_coordinate(url: &str) -> bool {
    URL_AT_PATTERN.is_match(url)
}

/// Highest-confidence strategy: the leftmost `@lat,lon` in the URL.
pub fn try_url_pattern(url: &str) -> Option<Coordinate> {
    first_match(&URL_AT_PATTERN, url)
}

/// Tries the `center` block first, then the initialization state array.
pub fn try_html_patterns(html: &str) -> Option<Coordinate> {
    [&*HTML_CENTER_PATTERN, &*HTML_APP_STATE_PATTERN]
        .into_iter()
        .find_map(|pattern| first_match(pattern, html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_pattern_from_place_url() {
        let url = "https://www.google.com/maps/place/Zocalo/@19.4326,-99.1332,17z";
        let coord = try_url_pattern(url).unwrap();
        assert_eq!(coord.latitude, 19.4326);
        assert_eq!(coord.longitude, -99.1332);
    }

    #[test]
    fn test_url_pattern_preserves_signs() {
        let coord = try_url_pattern("https://maps/place/X/@-33.8688,151.2093,12z").unwrap();
        assert_eq!(coord.latitude, -33.8688);
        assert_eq!(coord.longitude, 151.2093);
    }

    #[test]
    fn test_url_pattern_takes_leftmost_match() {
        let url = "https://maps/place/A/@20.0,-100.0,15z/data=@21.0,-101.0";
        assert_eq!(try_url_pattern(url), Coordinate::new(20.0, -100.0));
    }

    #[test]
    fn test_url_without_coordinates() {
        assert!(try_url_pattern("https://www.google.com/maps/search/?api=1&query=Zocalo").is_none());
        // integers are not the service's encoding
        assert!(try_url_pattern("https://maps/place/X/@19,-99,15z").is_none());
        assert!(!has_embedded_coordinate("https://maps.app.goo.gl/abc"));
        assert!(has_embedded_coordinate("https://maps/place/X/@20.0,-100.0,15z"));
    }

    #[test]
    fn test_url_pattern_out_of_range_is_no_match() {
        assert!(try_url_pattern("https://maps/place/X/@190.5,-99.1,15z").is_none());
    }

    #[test]
    fn test_html_center_pattern() {
        let html = r#"<script>var x = {"center": {"lat": 19.43, "lng": -99.13}, "zoom": 14};</script>"#;
        assert_eq!(try_html_patterns(html), Coordinate::new(19.43, -99.13));
    }

    #[test]
    fn test_html_center_pattern_without_spaces() {
        let html = r#"{"center":{"lat":19.5,"lng":-99.2}}"#;
        assert_eq!(try_html_patterns(html), Coordinate::new(19.5, -99.2));
    }

    #[test]
    fn test_html_app_state_pattern() {
        let html = r#"<script>window.APP_INITIALIZATION_STATE=["es",[[19.41,-99.12],1],[[20.0,-98.0]]];</script>"#;
        assert_eq!(try_html_patterns(html), Coordinate::new(19.41, -99.12));
    }

    #[test]
    fn test_html_app_state_takes_first_tuple_after_marker() {
        let html = concat!(
            r#"var early = [[1.5,2.5]];"#,
            r#"window.APP_INITIALIZATION_STATE=[[[19.41,-99.12],[20.1,-98.1]],[[21.2,-97.2]]];"#,
        );
        assert_eq!(try_html_patterns(html), Coordinate::new(19.41, -99.12));
    }

    #[test]
    fn test_html_prefers_center_over_app_state() {
        let html = concat!(
            r#"APP_INITIALIZATION_STATE=[[19.1,-99.9],0];"#,
            r#"{"center": {"lat": 19.43, "lng": -99.13}}"#,
        );
        assert_eq!(try_html_patterns(html), Coordinate::new(19.43, -99.13));
    }

    #[test]
    fn test_html_takes_first_center_in_document_order() {
        let html = concat!(
            r#"{"center": {"lat": 10.5, "lng": 20.5}}"#,
            r#"{"center": {"lat": 30.5, "lng": 40.5}}"#,
        );
        assert_eq!(try_html_patterns(html), Coordinate::new(10.5, 20.5));
    }

    #[test]
    fn test_html_out_of_range_center_falls_through() {
        let html = concat!(
            r#"{"center": {"lat": 123.5, "lng": 20.5}}"#,
            r#"APP_INITIALIZATION_STATE=[[19.41,-99.12],1]"#,
        );
        assert_eq!(try_html_patterns(html), Coordinate::new(19.41, -99.12));
    }

    #[test]
    fn test_html_without_patterns() {
        assert!(try_html_patterns("<html><body>No results</body></html>").is_none());
        assert!(try_html_patterns("").is_none());
    }
}
