// Our Real scalar type:
pub type Real = f64;

/// A small epsilon for geometric comparisons in millimetre space.
pub const EPSILON: Real = 1e-9;

// Pi
/// Archimedes' constant (π)
pub const PI: Real = core::f64::consts::PI;

/// √2
pub const SQRT_2: Real = core::f64::consts::SQRT_2;

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Fixed-point coordinates
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// Signed integer unit for all stored polygon coordinates.
pub type Unit = i64;

/// Fixed-point scale: one stored unit is one micron (mm × 1000).
pub const SCALE: Real = 1000.0;

/// Coordinates handed to the floating-point kernel must stay exactly
/// representable as whole numbers in an f64, i.e. below 2^52.
pub const UNIT_LIMIT: Unit = 1 << 52;

/// Millimetres to fixed-point units, rounded to the nearest unit.
#[inline]
pub fn to_units(mm: Real) -> Unit {
    (mm * SCALE).round() as Unit
}

/// Fixed-point units back to millimetres.
#[inline]
pub fn to_mm(units: Unit) -> Real {
    units as Real / SCALE
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Unit conversion
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
pub const INCH: Real = 25.4;
pub const MM: Real = 1.0;
pub const CM: Real = 10.0;
