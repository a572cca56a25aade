//! Cache key builders for geocoding and map rendering results
//!
//! Keys are built from normalized request parameters so that equivalent
//! requests share an entry. Coordinates are fixed to 6 decimal places
//! (roughly 0.1 m), which keeps `45.0` and `45.000000` on the same key.

/// Key for a rendered map centred on a coordinate
pub fn map_key(latitude: f64, longitude: f64, zoom: u8) -> String {
    format!("map_{}_{}", coordinates(latitude, longitude), zoom)
}

/// Key for an interactive map centred on a coordinate
pub fn interactive_map_key(latitude: f64, longitude: f64, zoom: u8) -> String {
    format!("interactive_map_{}_{}", coordinates(latitude, longitude), zoom)
}

/// Key for a forward geocoding query
pub fn geocode_key(query: &str, limit: u32) -> String {
    format!("geocode_{}_{}", normalize_query(query), limit)
}

/// Key for a reverse geocoding lookup
pub fn reverse_geocode_key(latitude: f64, longitude: f64) -> String {
    format!("rev_geocode_{}", coordinates(latitude, longitude))
}

/// Key for a static map image
pub fn static_map_key(
    latitude: f64,
    longitude: f64,
    zoom: u8,
    width: u32,
    height: u32,
    style: &str,
) -> String {
    format!(
        "static_map_{}_{}_{}_{}_{}",
        coordinates(latitude, longitude),
        zoom,
        width,
        height,
        style.trim().to_lowercase()
    )
}

fn coordinates(latitude: f64, longitude: f64) -> String {
    format!("{:.6}_{:.6}", normalize_zero(latitude), normalize_zero(longitude))
}

// -0.0 formats as "-0.000000"
fn normalize_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

/// Trim, lower-case and collapse internal whitespace
fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
