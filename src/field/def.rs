/// Serializable field definitions
///
/// `FieldDef` is the tree a terrain author writes (or loads); `compile` turns it
/// into the `DistanceField` that workers evaluate. JSON is the text encoding and
/// bincode the binary one.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::combinator::Combinator;
use super::distance_field::DistanceField;
use super::error::{invalid_field, FieldErrorContext, FieldResult};
use super::noise::{LayeredNoise, WarpNoise};
use crate::constants::field::{MAX_OCTAVES, NOISE_FREQUENCY, NOISE_OCTAVES, SMOOTHING_RADIUS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDef {
    Constant {
        value: f64,
    },
    Sphere {
        center: [f64; 3],
        radius: f64,
    },
    Plane {
        normal: [f64; 3],
        offset: f64,
    },
    Noise {
        seed: u32,
        frequency: f64,
        octaves: u32,
        amplitude: f64,
    },
    ModulatedNoise {
        seed: u32,
        frequency: f64,
        octaves: u32,
        amplitude: Box<FieldDef>,
    },
    Scale {
        factor: f64,
        source: Box<FieldDef>,
    },
    Perturb {
        seed: u32,
        frequency: f64,
        octaves: u32,
        strength: f64,
        source: Box<FieldDef>,
    },
    Add {
        a: Box<FieldDef>,
        b: Box<FieldDef>,
    },
    Union {
        a: Box<FieldDef>,
        b: Box<FieldDef>,
    },
    Intersection {
        a: Box<FieldDef>,
        b: Box<FieldDef>,
    },
    Difference {
        a: Box<FieldDef>,
        b: Box<FieldDef>,
    },
    SmoothUnion {
        a: Box<FieldDef>,
        b: Box<FieldDef>,
        #[serde(default)]
        k: Option<f64>,
    },
    SmoothIntersection {
        a: Box<FieldDef>,
        b: Box<FieldDef>,
        #[serde(default)]
        k: Option<f64>,
    },
    SmoothDifference {
        a: Box<FieldDef>,
        b: Box<FieldDef>,
        #[serde(default)]
        k: Option<f64>,
    },
}

/// Options applied while compiling a definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompileOptions {
    /// Smoothing radius for blended combinators that leave `k` unset
    pub default_smoothing: f64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            default_smoothing: SMOOTHING_RADIUS,
        }
    }
}

impl FieldDef {
    pub fn constant(value: f64) -> Self {
        FieldDef::Constant { value }
    }

    pub fn sphere(center: [f64; 3], radius: f64) -> Self {
        FieldDef::Sphere { center, radius }
    }

    pub fn plane(normal: [f64; 3], offset: f64) -> Self {
        FieldDef::Plane { normal, offset }
    }

    pub fn noise(seed: u32, amplitude: f64) -> Self {
        FieldDef::Noise {
            seed,
            frequency: NOISE_FREQUENCY,
            octaves: NOISE_OCTAVES,
            amplitude,
        }
    }

    pub fn union(a: FieldDef, b: FieldDef) -> Self {
        FieldDef::Union {
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    pub fn intersection(a: FieldDef, b: FieldDef) -> Self {
        FieldDef::Intersection {
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    /// Carve `a` out of `b`
    pub fn difference(a: FieldDef, b: FieldDef) -> Self {
        FieldDef::Difference {
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    pub fn add(a: FieldDef, b: FieldDef) -> Self {
        FieldDef::Add {
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    pub fn smooth_union(a: FieldDef, b: FieldDef, k: Option<f64>) -> Self {
        FieldDef::SmoothUnion {
            a: Box::new(a),
            b: Box::new(b),
            k,
        }
    }

    pub fn scale(source: FieldDef, factor: f64) -> Self {
        FieldDef::Scale {
            factor,
            source: Box::new(source),
        }
    }

    pub fn perturb(source: FieldDef, seed: u32, frequency: f64, strength: f64) -> Self {
        FieldDef::Perturb {
            seed,
            frequency,
            octaves: 2,
            strength,
            source: Box::new(source),
        }
    }

    /// Ground plane at `base_height` with noise hills of up to `amplitude`
    pub fn rolling_hills(seed: u32, base_height: f64, amplitude: f64) -> Self {
        FieldDef::add(
            FieldDef::plane([0.0, 1.0, 0.0], -base_height),
            FieldDef::noise(seed, amplitude),
        )
    }

    /// Compile into an evaluable tree, validating every parameter
    pub fn compile(&self, options: &CompileOptions) -> FieldResult<DistanceField> {
        let field = match self {
            FieldDef::Constant { value } => {
                DistanceField::Constant(finite("constant value", *value)?)
            }
            FieldDef::Sphere { center, radius } => {
                let radius = finite("sphere radius", *radius)?;
                if radius < 0.0 {
                    return Err(invalid_field(format!(
                        "sphere radius must be non-negative, got {}",
                        radius
                    )));
                }
                DistanceField::Sphere {
                    center: vec3("sphere center", *center)?,
                    radius,
                }
            }
            FieldDef::Plane { normal, offset } => {
                let normal = vec3("plane normal", *normal)?
                    .try_normalize()
                    .field_context("plane normal must be non-zero")?;
                DistanceField::Plane {
                    normal,
                    offset: finite("plane offset", *offset)?,
                }
            }
            FieldDef::Noise {
                seed,
                frequency,
                octaves,
                amplitude,
            } => DistanceField::Noise {
                noise: layered(*seed, *frequency, *octaves)?,
                amplitude: finite("noise amplitude", *amplitude)?,
            },
            FieldDef::ModulatedNoise {
                seed,
                frequency,
                octaves,
                amplitude,
            } => DistanceField::ModulatedNoise {
                noise: layered(*seed, *frequency, *octaves)?,
                amplitude: Box::new(amplitude.compile(options)?),
            },
            FieldDef::Scale { factor, source } => DistanceField::Scale {
                factor: finite("scale factor", *factor)?,
                source: Box::new(source.compile(options)?),
            },
            FieldDef::Perturb {
                seed,
                frequency,
                octaves,
                strength,
                source,
            } => {
                // Validates the shared parameters once for all three channels
                layered(*seed, *frequency, *octaves)?;
                DistanceField::Perturb {
                    warp: WarpNoise::new(*seed, *frequency, *octaves),
                    strength: finite("perturb strength", *strength)?.abs(),
                    source: Box::new(source.compile(options)?),
                }
            }
            FieldDef::Add { a, b } => combine(Combinator::Add, a, b, options)?,
            FieldDef::Union { a, b } => combine(Combinator::Union, a, b, options)?,
            FieldDef::Intersection { a, b } => combine(Combinator::Intersection, a, b, options)?,
            FieldDef::Difference { a, b } => combine(Combinator::Difference, a, b, options)?,
            FieldDef::SmoothUnion { a, b, k } => {
                let k = smoothing(*k, options)?;
                combine(Combinator::SmoothUnion { k }, a, b, options)?
            }
            FieldDef::SmoothIntersection { a, b, k } => {
                let k = smoothing(*k, options)?;
                combine(Combinator::SmoothIntersection { k }, a, b, options)?
            }
            FieldDef::SmoothDifference { a, b, k } => {
                let k = smoothing(*k, options)?;
                combine(Combinator::SmoothDifference { k }, a, b, options)?
            }
        };
        Ok(field)
    }

    pub fn to_json(&self) -> FieldResult<String> {
        serde_json::to_string_pretty(self).field_context("json")
    }

    pub fn from_json(text: &str) -> FieldResult<Self> {
        serde_json::from_str(text).field_context("json")
    }

    pub fn to_bytes(&self) -> FieldResult<Vec<u8>> {
        bincode::serialize(self).field_context("bincode")
    }

    pub fn from_bytes(bytes: &[u8]) -> FieldResult<Self> {
        bincode::deserialize(bytes).field_context("bincode")
    }
}

fn combine(
    op: Combinator,
    a: &FieldDef,
    b: &FieldDef,
    options: &CompileOptions,
) -> FieldResult<DistanceField> {
    Ok(DistanceField::Combine {
        op,
        a: Box::new(a.compile(options)?),
        b: Box::new(b.compile(options)?),
    })
}

fn smoothing(k: Option<f64>, options: &CompileOptions) -> FieldResult<f64> {
    let k = finite("smoothing radius", k.unwrap_or(options.default_smoothing))?;
    if k < 0.0 {
        return Err(invalid_field(format!(
            "smoothing radius must be non-negative, got {}",
            k
        )));
    }
    Ok(k)
}

fn layered(seed: u32, frequency: f64, octaves: u32) -> FieldResult<LayeredNoise> {
    let frequency = finite("noise frequency", frequency)?;
    if frequency <= 0.0 {
        return Err(invalid_field(format!(
            "noise frequency must be positive, got {}",
            frequency
        )));
    }
    if octaves == 0 || octaves > MAX_OCTAVES {
        return Err(invalid_field(format!(
            "noise octaves must be in 1..={}, got {}",
            MAX_OCTAVES, octaves
        )));
    }
    Ok(LayeredNoise::new(seed, frequency, octaves))
}

fn finite(what: &str, value: f64) -> FieldResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid_field(format!("{} must be finite, got {}", what, value)))
    }
}

fn vec3(what: &str, v: [f64; 3]) -> FieldResult<DVec3> {
    for c in v {
        finite(what, c)?;
    }
    Ok(DVec3::from_array(v))
}
