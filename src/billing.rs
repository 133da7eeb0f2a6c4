//! Live session cost

/// Cost of the energy delivered so far at the current rate.
///
/// Inputs are clamped by their feeds, but a non-finite or negative product
/// still collapses to 0 so downstream balance math stays sane.
pub fn live_cost(session_energy_kwh: f64, price_per_kwh: f64) -> f64 {
    let cost = session_energy_kwh * price_per_kwh;
    if cost.is_finite() && cost > 0.0 { cost } else { 0.0 }
}
