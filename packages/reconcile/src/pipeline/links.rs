//! URL and map-link detection in message text.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::entity::Coordinates;

static RE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>()\[\]]+").expect("url pattern is valid"));

static RE_MAP_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(?:www\.)?(?:maps\.app\.goo\.gl/|maps\.google\.[a-z.]+|google\.[a-z.]+/maps|goo\.gl/maps/)")
        .expect("map link pattern is valid")
});

static RE_AT_COORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").expect("coordinate pattern is valid")
});

static RE_QUERY_COORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&]q=(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)")
        .expect("query coordinate pattern is valid")
});

/// Extract every http(s) URL in `text`, in order, without duplicates.
///
/// Trailing punctuation is not part of the URL.
pub fn extract_links(text: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for m in RE_URL.find_iter(text) {
        let url = m
            .as_str()
            .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '،'));
        if !url.is_empty() && !links.iter().any(|l| l == url) {
            links.push(url.to_string());
        }
    }
    links
}

/// True if the URL points at a map location.
pub fn is_map_link(url: &str) -> bool {
    RE_MAP_LINK.is_match(url.trim())
}

/// The map links among `candidates`, in order.
pub fn map_links<'a>(candidates: &'a [String]) -> impl Iterator<Item = &'a String> + 'a {
    candidates.iter().filter(|url| is_map_link(url))
}

/// Position written into a map URL, as `@lat,lng` or `?q=lat,lng`.
///
/// The `@` form wins when both are present. Short links carry no position
/// and yield `None`; so do out-of-range values.
pub fn extract_coordinates(url: &str) -> Option<Coordinates> {
    let caps = RE_AT_COORDS
        .captures(url)
        .or_else(|| RE_QUERY_COORDS.captures(url))?;
    let latitude = caps[1].parse().ok()?;
    let longitude = caps[2].parse().ok()?;
    Coordinates::new(latitude, longitude)
}

/// Position from the first link in `links` that carries one.
pub fn first_coordinates(links: &[String]) -> Option<Coordinates> {
    links.iter().find_map(|link| extract_coordinates(link))
}
