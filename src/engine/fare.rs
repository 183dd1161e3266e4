use crate::config::Config;
use crate::geo::haversine_m;
use crate::models::driver::GeoPoint;

/// Whole currency units. Never below the configured floor, never zero.
pub fn compute_fare(config: &Config, pickup: &GeoPoint, dropoff: &GeoPoint) -> u32 {
    let distance_km = haversine_m(pickup, dropoff) / 1_000.0;
    let metered = config.base_fare as f64 + config.fare_per_km as f64 * distance_km;

    (metered.round() as u32).max(config.min_fare).max(1)
}

/// Gateway amounts are quoted in minor units.
pub fn to_minor_units(fare: u32) -> u64 {
    u64::from(fare) * 100
}
