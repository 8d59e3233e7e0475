//! Hardware color gamuts and gamut correction of chromaticity points.

use log::error;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::Xy;

/// Triangular chromaticity boundary a light model can render.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
pub enum Gamut {
    A,
    B,
    C,
    /// Covers the whole chromaticity simplex
    #[default]
    #[strum(serialize = "default")]
    Default,
}

const GAMUT_A_MODELS: &[&str] = &[
    "LLC001", "LLC005", "LLC006", "LLC007", "LLC010", "LLC011", "LLC012", "LLC013", "LLC014",
    "LST001",
];

const GAMUT_B_MODELS: &[&str] = &["LCT001", "LCT002", "LCT003", "LCT007", "LLM001"];

const GAMUT_C_MODELS: &[&str] = &[
    "LCT010", "LCT011", "LCT012", "LCT014", "LCT015", "LCT016", "LLC020", "LST002", "LCA001",
    "LCA002", "LCA003", "LCG002", "LCB001",
];

/// The three corners of a gamut, counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub red: Xy,
    pub green: Xy,
    pub blue: Xy,
}

/// One edge of a [`Triangle`], in the order edges are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    BlueRed,
    RedGreen,
    GreenBlue,
}

impl Gamut {
    /// Look up the gamut of a hardware model id.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::Gamut;
    ///
    /// assert_eq!(Gamut::for_model("LCT001"), Gamut::B);
    /// assert_eq!(Gamut::for_model("LCT015"), Gamut::C);
    /// assert_eq!(Gamut::for_model("unknown"), Gamut::Default);
    /// ```
    pub fn for_model(model_id: &str) -> Self {
        if GAMUT_A_MODELS.contains(&model_id) {
            Gamut::A
        } else if GAMUT_B_MODELS.contains(&model_id) {
            Gamut::B
        } else if GAMUT_C_MODELS.contains(&model_id) {
            Gamut::C
        } else {
            Gamut::Default
        }
    }

    /// Prefer the gamut type the bridge reports, fall back to the model table.
    pub fn detect(reported: Option<&str>, model_id: Option<&str>) -> Self {
        match reported {
            Some("A") => Gamut::A,
            Some("B") => Gamut::B,
            Some("C") => Gamut::C,
            _ => model_id.map(Self::for_model).unwrap_or_default(),
        }
    }

    pub fn triangle(&self) -> Triangle {
        match self {
            Gamut::A => Triangle {
                red: Xy::new(0.704, 0.296),
                green: Xy::new(0.2151, 0.7106),
                blue: Xy::new(0.138, 0.08),
            },
            Gamut::B => Triangle {
                red: Xy::new(0.675, 0.322),
                green: Xy::new(0.409, 0.518),
                blue: Xy::new(0.167, 0.04),
            },
            Gamut::C => Triangle {
                red: Xy::new(0.692, 0.308),
                green: Xy::new(0.17, 0.7),
                blue: Xy::new(0.153, 0.048),
            },
            Gamut::Default => Triangle {
                red: Xy::new(1.0, 0.0),
                green: Xy::new(0.0, 1.0),
                blue: Xy::new(0.0, 0.0),
            },
        }
    }

    pub fn contains(&self, point: Xy) -> bool {
        self.triangle().violated_edge(point).is_none()
    }

    /// Move a point outside the gamut onto the nearest point of the first
    /// violated edge. Points inside are returned unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_mirror::{Gamut, Xy};
    ///
    /// let inside = Xy::new(0.4, 0.4);
    /// assert_eq!(Gamut::B.correct(inside), inside);
    ///
    /// let corrected = Gamut::B.correct(Xy::new(0.1, 0.9));
    /// assert_ne!(corrected, Xy::new(0.1, 0.9));
    /// ```
    pub fn correct(&self, point: Xy) -> Xy {
        let triangle = self.triangle();
        let Some(edge) = triangle.violated_edge(point) else {
            return point;
        };

        let (start, end) = triangle.endpoints(edge);
        let corrected = closest_point_on_segment(start, end, point);
        if corrected.is_finite() {
            corrected
        } else {
            error!(
                "no gamut correction possible for ({}, {}) in gamut {}",
                point.x, point.y, self
            );
            point
        }
    }
}

impl Triangle {
    fn endpoints(&self, edge: Edge) -> (Xy, Xy) {
        match edge {
            Edge::BlueRed => (self.blue, self.red),
            Edge::RedGreen => (self.red, self.green),
            Edge::GreenBlue => (self.green, self.blue),
        }
    }

    /// The first edge, in check order, whose outer side holds the point.
    fn violated_edge(&self, point: Xy) -> Option<Edge> {
        [Edge::BlueRed, Edge::RedGreen, Edge::GreenBlue]
            .into_iter()
            .find(|edge| {
                let (start, end) = self.endpoints(*edge);
                cross(sub(end, start), sub(point, start)) < 0.0
            })
    }
}

fn sub(a: Xy, b: Xy) -> Xy {
    Xy::new(a.x - b.x, a.y - b.y)
}

fn cross(a: Xy, b: Xy) -> f64 {
    a.x * b.y - a.y * b.x
}

fn closest_point_on_segment(start: Xy, end: Xy, point: Xy) -> Xy {
    let segment = sub(end, start);
    let to_point = sub(point, start);
    let length_sq = segment.x * segment.x + segment.y * segment.y;
    let t = ((to_point.x * segment.x + to_point.y * segment.y) / length_sq).clamp(0.0, 1.0);
    Xy::new(start.x + segment.x * t, start.y + segment.y * t)
}
