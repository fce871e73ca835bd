use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use bigdecimal::ToPrimitive;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::shared::models::Restaurant;
use crate::shared::schema::restaurants;
use crate::shared::state::AppState;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Synthesized coordinates stay within this many degrees of the user.
const SYNTH_SPREAD_DEG: f64 = 0.1;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UserLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone)]
pub struct HeatMapFilters {
    pub radius_km: f64,
    pub min_intensity: i32,
    pub cuisine: Option<String>,
    pub price_range: Option<String>,
}

impl Default for HeatMapFilters {
    fn default() -> Self {
        Self {
            radius_km: 5.0,
            min_intensity: 0,
            cuisine: None,
            price_range: None,
        }
    }
}

/// Ranker input, detached from the database row so the scoring stays a pure
/// transform.
#[derive(Debug, Clone)]
pub struct RestaurantSignal {
    pub id: i32,
    pub name: String,
    pub rating: f64,
    pub review_count: i32,
    pub cuisine: String,
    pub price_range: String,
    pub is_popular: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<&Restaurant> for RestaurantSignal {
    fn from(r: &Restaurant) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            rating: r.rating.to_f64().unwrap_or(0.0),
            review_count: r.review_count,
            cuisine: r.cuisine.clone(),
            price_range: r.price_range.clone(),
            is_popular: r.is_popular,
            latitude: r.latitude,
            longitude: r.longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatBucket {
    High,
    Medium,
    Low,
    Minimal,
}

impl HeatBucket {
    pub fn from_intensity(intensity: i32) -> Self {
        if intensity >= 80 {
            HeatBucket::High
        } else if intensity >= 60 {
            HeatBucket::Medium
        } else if intensity >= 40 {
            HeatBucket::Low
        } else {
            HeatBucket::Minimal
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            HeatBucket::High => "#ff4444",
            HeatBucket::Medium => "#ff8800",
            HeatBucket::Low => "#ffcc00",
            HeatBucket::Minimal => "#88cc88",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatMapPoint {
    pub restaurant_id: i32,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub distance_km: f64,
    pub intensity: i32,
    pub bucket: HeatBucket,
    pub color: &'static str,
}

/// Great-circle distance between two coordinate pairs, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Composite recommendation score in [0, 100]. Components are normalized to
/// [0, 1] before the weighted sum.
pub fn recommendation_score(
    rating: f64,
    is_popular: bool,
    distance_km: f64,
    radius_km: f64,
    review_count: i32,
) -> f64 {
    let rating_score = (rating / 5.0).clamp(0.0, 1.0);
    let popularity_score = if is_popular { 1.0 } else { 0.5 };
    let proximity_score = (1.0 - distance_km / radius_km).max(0.0);
    let review_score = (f64::from(review_count) / 100.0).min(1.0);

    (rating_score * 0.30 + popularity_score * 0.25 + proximity_score * 0.25 + review_score * 0.20)
        * 100.0
}

/// Placeholder geocoding for restaurants without stored coordinates: a
/// deterministic offset within ±0.05° of the user, keyed on the restaurant
/// id, so points are stable across reloads.
pub fn synthesize_coordinates(restaurant_id: i32, user: &UserLocation) -> (f64, f64) {
    let lat_unit = unit_from_seed(restaurant_id as u64);
    let lng_unit = unit_from_seed((restaurant_id as u64) ^ 0xa5a5_a5a5_a5a5_a5a5);
    (
        user.latitude + (lat_unit - 0.5) * SYNTH_SPREAD_DEG,
        user.longitude + (lng_unit - 0.5) * SYNTH_SPREAD_DEG,
    )
}

// splitmix64 finalizer, folded down to a unit interval value.
fn unit_from_seed(seed: u64) -> f64 {
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64
}

/// Scores, filters, and sorts restaurants for the heat-map view. Pure
/// transform: nothing here is persisted. Ties keep input order (stable sort).
pub fn build_heat_map(
    restaurants: &[RestaurantSignal],
    user: &UserLocation,
    filters: &HeatMapFilters,
) -> Vec<HeatMapPoint> {
    let mut points: Vec<HeatMapPoint> = restaurants
        .iter()
        .filter_map(|r| {
            let (lat, lng) = match (r.latitude, r.longitude) {
                (Some(lat), Some(lng)) => (lat, lng),
                _ => synthesize_coordinates(r.id, user),
            };
            let distance_km = haversine_km(user.latitude, user.longitude, lat, lng);

            if distance_km > filters.radius_km {
                return None;
            }
            if let Some(cuisine) = &filters.cuisine {
                if &r.cuisine != cuisine {
                    return None;
                }
            }
            if let Some(price_range) = &filters.price_range {
                if &r.price_range != price_range {
                    return None;
                }
            }

            let intensity = recommendation_score(
                r.rating,
                r.is_popular,
                distance_km,
                filters.radius_km,
                r.review_count,
            )
            .round() as i32;

            if intensity < filters.min_intensity {
                return None;
            }

            let bucket = HeatBucket::from_intensity(intensity);
            Some(HeatMapPoint {
                restaurant_id: r.id,
                name: r.name.clone(),
                lat,
                lng,
                distance_km: (distance_km * 10.0).round() / 10.0,
                intensity,
                bucket,
                color: bucket.color(),
            })
        })
        .collect();

    points.sort_by(|a, b| b.intensity.cmp(&a.intensity));
    points
}

pub async fn list_restaurants(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Restaurant>>, AppError> {
    let mut conn = state.conn.get()?;

    let rows: Vec<Restaurant> = restaurants::table
        .filter(restaurants::is_active.eq(true))
        .order(restaurants::name.asc())
        .load(&mut conn)?;

    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct HeatMapQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: Option<f64>,
    pub min_intensity: Option<i32>,
    pub cuisine: Option<String>,
    pub price_range: Option<String>,
}

pub async fn heat_map(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HeatMapQuery>,
) -> Result<Json<Vec<HeatMapPoint>>, AppError> {
    let radius_km = query.radius_km.unwrap_or(5.0);
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AppError::Validation(
            "radius_km must be positive".to_string(),
        ));
    }

    let user = UserLocation {
        latitude: query.lat,
        longitude: query.lng,
    };
    let filters = HeatMapFilters {
        radius_km,
        min_intensity: query.min_intensity.unwrap_or(0),
        cuisine: query.cuisine.filter(|c| c != "all"),
        price_range: query.price_range.filter(|p| p != "all"),
    };

    let mut conn = state.conn.get()?;
    let rows: Vec<Restaurant> = restaurants::table
        .filter(restaurants::is_active.eq(true))
        .load(&mut conn)?;

    let signals: Vec<RestaurantSignal> = rows.iter().map(RestaurantSignal::from).collect();
    Ok(Json(build_heat_map(&signals, &user, &filters)))
}

pub fn configure_restaurant_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/restaurants", get(list_restaurants))
        .route("/restaurants/heatmap", get(heat_map))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCHAREST: UserLocation = UserLocation {
        latitude: 44.4268,
        longitude: 26.1025,
    };

    fn signal(id: i32) -> RestaurantSignal {
        RestaurantSignal {
            id,
            name: format!("Restaurant {id}"),
            rating: 4.0,
            review_count: 50,
            cuisine: "italian".to_string(),
            price_range: "€€".to_string(),
            is_popular: false,
            latitude: Some(BUCHAREST.latitude),
            longitude: Some(BUCHAREST.longitude),
        }
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Bucharest to Cluj-Napoca is roughly 324 km.
        let d = haversine_km(44.4268, 26.1025, 46.7712, 23.6236);
        assert!((d - 324.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn haversine_is_zero_for_identical_points() {
        assert!(haversine_km(44.4268, 26.1025, 44.4268, 26.1025) < 1e-9);
    }

    #[test]
    fn high_scoring_restaurant_lands_in_high_bucket() {
        // Rating 4.8, 150 reviews, popular, 0.5 km away with 5 km radius:
        // 0.30*0.96 + 0.25*1.0 + 0.25*0.90 + 0.20*1.0 = 0.963
        let score = recommendation_score(4.8, true, 0.5, 5.0, 150);
        assert_eq!(score.round() as i32, 96);
        assert_eq!(HeatBucket::from_intensity(96), HeatBucket::High);
        assert_eq!(HeatBucket::High.color(), "#ff4444");
    }

    #[test]
    fn weak_restaurant_lands_in_minimal_bucket() {
        // Rating 3.0, 5 reviews, not popular, 4.9 km away with 5 km radius.
        let score = recommendation_score(3.0, false, 4.9, 5.0, 5);
        assert_eq!(score.round() as i32, 32);
        assert_eq!(HeatBucket::from_intensity(32), HeatBucket::Minimal);
    }

    #[test]
    fn bucket_thresholds_are_inclusive() {
        assert_eq!(HeatBucket::from_intensity(80), HeatBucket::High);
        assert_eq!(HeatBucket::from_intensity(79), HeatBucket::Medium);
        assert_eq!(HeatBucket::from_intensity(60), HeatBucket::Medium);
        assert_eq!(HeatBucket::from_intensity(59), HeatBucket::Low);
        assert_eq!(HeatBucket::from_intensity(40), HeatBucket::Low);
        assert_eq!(HeatBucket::from_intensity(39), HeatBucket::Minimal);
    }

    #[test]
    fn score_is_monotonic_in_rating_reviews_and_popularity() {
        let base = recommendation_score(3.0, false, 2.0, 5.0, 20);
        assert!(recommendation_score(4.0, false, 2.0, 5.0, 20) > base);
        assert!(recommendation_score(3.0, true, 2.0, 5.0, 20) > base);
        assert!(recommendation_score(3.0, false, 2.0, 5.0, 40) > base);
    }

    #[test]
    fn closer_restaurant_scores_at_least_as_high() {
        let near = recommendation_score(4.0, false, 0.5, 5.0, 30);
        let far = recommendation_score(4.0, false, 4.5, 5.0, 30);
        assert!(near >= far);
    }

    #[test]
    fn review_score_saturates_at_one_hundred() {
        let a = recommendation_score(4.0, false, 1.0, 5.0, 100);
        let b = recommendation_score(4.0, false, 1.0, 5.0, 10_000);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn out_of_radius_restaurants_are_excluded() {
        let mut far = signal(1);
        // ~0.2° of latitude is over 20 km.
        far.latitude = Some(BUCHAREST.latitude + 0.2);
        let points = build_heat_map(&[far], &BUCHAREST, &HeatMapFilters::default());
        assert!(points.is_empty());
    }

    #[test]
    fn below_threshold_restaurants_are_excluded() {
        let weak = RestaurantSignal {
            rating: 2.0,
            review_count: 0,
            is_popular: false,
            ..signal(1)
        };
        let filters = HeatMapFilters {
            min_intensity: 70,
            ..HeatMapFilters::default()
        };
        let points = build_heat_map(&[weak], &BUCHAREST, &filters);
        assert!(points.is_empty());
    }

    #[test]
    fn cuisine_and_price_filters_apply() {
        let italian = signal(1);
        let mut sushi = signal(2);
        sushi.cuisine = "japanese".to_string();
        sushi.price_range = "€€€".to_string();

        let filters = HeatMapFilters {
            cuisine: Some("italian".to_string()),
            ..HeatMapFilters::default()
        };
        let points = build_heat_map(&[italian.clone(), sushi.clone()], &BUCHAREST, &filters);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].restaurant_id, 1);

        let filters = HeatMapFilters {
            price_range: Some("€€€".to_string()),
            ..HeatMapFilters::default()
        };
        let points = build_heat_map(&[italian, sushi], &BUCHAREST, &filters);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].restaurant_id, 2);
    }

    #[test]
    fn points_sort_by_intensity_descending() {
        let weak = RestaurantSignal {
            rating: 3.0,
            review_count: 5,
            ..signal(1)
        };
        let strong = RestaurantSignal {
            rating: 4.9,
            review_count: 200,
            is_popular: true,
            ..signal(2)
        };
        let points = build_heat_map(&[weak, strong], &BUCHAREST, &HeatMapFilters::default());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].restaurant_id, 2);
        assert!(points[0].intensity >= points[1].intensity);
    }

    #[test]
    fn synthesized_coordinates_are_deterministic_and_bounded() {
        let (lat1, lng1) = synthesize_coordinates(42, &BUCHAREST);
        let (lat2, lng2) = synthesize_coordinates(42, &BUCHAREST);
        assert_eq!(lat1, lat2);
        assert_eq!(lng1, lng2);
        assert!((lat1 - BUCHAREST.latitude).abs() <= 0.05);
        assert!((lng1 - BUCHAREST.longitude).abs() <= 0.05);

        let (other_lat, other_lng) = synthesize_coordinates(43, &BUCHAREST);
        assert!(other_lat != lat1 || other_lng != lng1);
    }

    #[test]
    fn missing_coordinates_still_produce_a_point() {
        let mut unplaced = signal(9);
        unplaced.latitude = None;
        unplaced.longitude = None;
        // A ±0.05° offset can exceed 5 km, so use a radius that always
        // covers the synthesis spread.
        let filters = HeatMapFilters {
            radius_km: 20.0,
            ..HeatMapFilters::default()
        };
        let points = build_heat_map(&[unplaced], &BUCHAREST, &filters);
        assert_eq!(points.len(), 1);
        assert!(points[0].distance_km <= 20.0);
    }
}
