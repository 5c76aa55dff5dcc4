use glam::DVec3;
use noise::{NoiseFn, Perlin};

use crate::constants::field::{LACUNARITY, PERSISTENCE};

/// Octave-summed Perlin noise normalized to [-1, 1]
#[derive(Clone)]
pub struct LayeredNoise {
    perlin: Perlin,
    seed: u32,
    frequency: f64,
    octaves: u32,
    norm: f64,
}

impl LayeredNoise {
    pub fn new(seed: u32, frequency: f64, octaves: u32) -> Self {
        let octaves = octaves.max(1);

        // Sum of octave amplitudes, used to bring the total back into [-1, 1]
        let mut norm = 0.0;
        let mut amplitude = 1.0;
        for _ in 0..octaves {
            norm += amplitude;
            amplitude *= PERSISTENCE;
        }

        Self {
            perlin: Perlin::new(seed),
            seed,
            frequency,
            octaves,
            norm,
        }
    }

    /// Sample the noise; the result is clamped so bounds of ±1 always hold
    pub fn sample(&self, p: DVec3) -> f64 {
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;

        for _ in 0..self.octaves {
            sum += amplitude * self.perlin.get([p.x * frequency, p.y * frequency, p.z * frequency]);
            amplitude *= PERSISTENCE;
            frequency *= LACUNARITY;
        }

        (sum / self.norm).clamp(-1.0, 1.0)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn octaves(&self) -> u32 {
        self.octaves
    }
}

impl std::fmt::Debug for LayeredNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredNoise")
            .field("seed", &self.seed)
            .field("frequency", &self.frequency)
            .field("octaves", &self.octaves)
            .finish()
    }
}

/// Three decorrelated noise channels used as a displacement vector
#[derive(Debug, Clone)]
pub struct WarpNoise {
    channels: [LayeredNoise; 3],
}

impl WarpNoise {
    pub fn new(seed: u32, frequency: f64, octaves: u32) -> Self {
        Self {
            channels: [
                LayeredNoise::new(seed, frequency, octaves),
                LayeredNoise::new(seed.wrapping_add(1), frequency, octaves),
                LayeredNoise::new(seed.wrapping_add(2), frequency, octaves),
            ],
        }
    }

    /// Displacement with every component in [-1, 1]
    pub fn displacement(&self, p: DVec3) -> DVec3 {
        DVec3::new(
            self.channels[0].sample(p),
            self.channels[1].sample(p),
            self.channels[2].sample(p),
        )
    }

    pub fn seed(&self) -> u32 {
        self.channels[0].seed()
    }
}
