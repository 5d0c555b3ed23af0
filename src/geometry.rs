//! Gate offset geometry.
//!
//! The same formula positions a gate fully open (distance = travel) and
//! advances it by a single motion step (distance = step size).

use crate::types::{OpeningDirection, Vec3};

/// `reference + distance * sign * (cos(heading + 180°), sin(heading + 180°))`,
/// keeping the reference's z.
pub fn offset_position(
    reference: Vec3,
    heading_deg: f32,
    direction: OpeningDirection,
    distance: f32,
) -> Vec3 {
    let heading = f64::from(heading_deg + 180.0).to_radians();
    let scale = f64::from(distance) * f64::from(direction.sign());

    Vec3::new(
        (f64::from(reference.x) + scale * heading.cos()) as f32,
        (f64::from(reference.y) + scale * heading.sin()) as f32,
        reference.z,
    )
}
