use glam::DVec3;

use super::SampleLayout;
use crate::error::{capacity_error, TerrainResult};
use crate::field::DistanceField;
use crate::pipeline::cancel::{CancellationToken, Cancelled};
use crate::pool::Poolable;

/// Dense cubic lattice of sampled distances
pub struct SampleBlock {
    extent: usize,
    layout: Option<SampleLayout>,
    samples: Vec<f32>,
    min: f32,
    max: f32,
}

impl SampleBlock {
    /// Block with `extent` samples per axis
    pub fn new(extent: usize) -> Self {
        Self {
            extent,
            layout: None,
            samples: vec![0.0; extent * extent * extent],
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }

    /// Block sized for `layout`, ready to fill
    pub fn for_layout(layout: SampleLayout) -> Self {
        let mut block = Self::new(layout.corners_per_axis());
        block.layout = Some(layout);
        block
    }

    /// Attach the lattice this block will be filled over
    pub fn set_layout(&mut self, layout: SampleLayout) -> TerrainResult<()> {
        let needed = layout.corners_per_axis();
        if needed != self.extent {
            return Err(capacity_error("sample block extent", needed, self.extent));
        }
        self.layout = Some(layout);
        Ok(())
    }

    pub fn layout(&self) -> Option<&SampleLayout> {
        self.layout.as_ref()
    }

    pub fn extent(&self) -> usize {
        self.extent
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.extent * (y + self.extent * z)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.samples[self.index(x, y, z)]
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// True when the filled samples straddle zero
    pub fn has_surface(&self) -> bool {
        self.min <= 0.0 && self.max >= 0.0
    }

    /// Evaluate the field at every lattice point
    pub fn fill_direct(
        &mut self,
        field: &DistanceField,
        token: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let Some(layout) = self.layout else {
            return Ok(());
        };
        self.fill_with(token, |x, y, z| field.evaluate(layout.position(x, y, z)))
    }

    /// Trilinear interpolation of the field values at the chunk's own eight corners.
    ///
    /// `corners` uses bit 0 for x, bit 1 for y, bit 2 for z. Margin samples
    /// extrapolate along the same per-axis slope.
    pub fn fill_interpolated(
        &mut self,
        corners: &[f64; 8],
        token: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let Some(layout) = self.layout else {
            return Ok(());
        };
        let lead = layout.lead as f64;
        let cells = layout.cells as f64;
        let corners = *corners;
        self.fill_with(token, move |x, y, z| {
            let t = (DVec3::new(x as f64, y as f64, z as f64) - DVec3::splat(lead)) / cells;
            trilinear(&corners, t)
        })
    }

    /// Values of `field` at the eight corners of the chunk itself (margins excluded)
    pub fn corner_values(field: &DistanceField, layout: &SampleLayout) -> [f64; 8] {
        let base = layout.chunk_origin();
        let size = layout.cells as f64 * layout.spacing;
        let mut values = [0.0; 8];
        for (i, value) in values.iter_mut().enumerate() {
            let offset = DVec3::new(
                (i & 1) as f64,
                ((i >> 1) & 1) as f64,
                ((i >> 2) & 1) as f64,
            );
            *value = field.evaluate(base + offset * size);
        }
        values
    }

    fn fill_with(
        &mut self,
        token: &CancellationToken,
        sample: impl Fn(usize, usize, usize) -> f64,
    ) -> Result<(), Cancelled> {
        let n = self.extent;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for z in 0..n {
            token.check()?;
            for y in 0..n {
                let row = n * (y + n * z);
                for x in 0..n {
                    let v = sample(x, y, z) as f32;
                    self.samples[row + x] = v;
                    min = min.min(v);
                    max = max.max(v);
                }
            }
        }

        self.min = min;
        self.max = max;
        Ok(())
    }
}

/// Trilinear blend; `t` may leave [0, 1] for linear extrapolation
pub fn trilinear(corners: &[f64; 8], t: DVec3) -> f64 {
    let lerp = |a: f64, b: f64, s: f64| a + (b - a) * s;
    let x00 = lerp(corners[0], corners[1], t.x);
    let x10 = lerp(corners[2], corners[3], t.x);
    let x01 = lerp(corners[4], corners[5], t.x);
    let x11 = lerp(corners[6], corners[7], t.x);
    let y0 = lerp(x00, x10, t.y);
    let y1 = lerp(x01, x11, t.y);
    lerp(y0, y1, t.z)
}

impl Poolable for SampleBlock {
    type Key = usize;

    fn pool_key(&self) -> usize {
        self.extent
    }

    fn reset(&mut self) {
        self.layout = None;
        self.min = f32::INFINITY;
        self.max = f32::NEG_INFINITY;
    }
}

impl std::fmt::Debug for SampleBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBlock")
            .field("extent", &self.extent)
            .field("layout", &self.layout)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}
