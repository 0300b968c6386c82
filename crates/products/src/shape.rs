use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, ValueObject};

/// Physical shape of a product, with the dimensions that shape needs.
///
/// Serialized with a `shape` tag next to the dimension fields, e.g.
/// `{"shape":"Rectangular","width":2.0,"height":3.0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all_fields = "camelCase")]
pub enum Shape {
    Rectangular { width: f64, height: f64 },
    Square { side_length: f64 },
    Circular { radius: f64 },
}

impl ValueObject for Shape {}

/// Shape discriminant without dimensions (used for filtering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Rectangular,
    Square,
    Circular,
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Rectangular { .. } => ShapeKind::Rectangular,
            Shape::Square { .. } => ShapeKind::Square,
            Shape::Circular { .. } => ShapeKind::Circular,
        }
    }

    /// Every dimension must be a finite, strictly positive number.
    pub fn validate(&self) -> DomainResult<()> {
        let dims: Vec<(&str, f64)> = match self {
            Shape::Rectangular { width, height } => vec![("width", *width), ("height", *height)],
            Shape::Square { side_length } => vec![("sideLength", *side_length)],
            Shape::Circular { radius } => vec![("radius", *radius)],
        };

        for (name, value) in dims {
            if !value.is_finite() || value <= 0.0 {
                return Err(DomainError::validation(format!(
                    "{name} must be a positive number"
                )));
            }
        }
        Ok(())
    }
}

impl core::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ShapeKind::Rectangular => write!(f, "Rectangular"),
            ShapeKind::Square => write!(f, "Square"),
            ShapeKind::Circular => write!(f, "Circular"),
        }
    }
}

impl core::str::FromStr for ShapeKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Rectangular" => Ok(ShapeKind::Rectangular),
            "Square" => Ok(ShapeKind::Square),
            "Circular" => Ok(ShapeKind::Circular),
            other => Err(DomainError::validation(format!(
                "invalid product type: {other}"
            ))),
        }
    }
}
