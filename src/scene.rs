//! Scene descriptors for one generation run.
//!
//! A [`SceneState`] is created once per run and never mutated afterwards; every
//! painted frame is a pure function of the scene and elapsed time.

/// Number of glow particles in a scene.
pub const PARTICLE_COUNT: usize = 24;

/// One glow particle descriptor.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Particle {
    /// Phase seed; distinguishes the particle's oscillation from its neighbors.
    pub seed: u32,
    /// Base glow radius in pixels, before pulse modulation.
    pub base_radius: f64,
}

/// Fixed, ordered particle set for one generation run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneState {
    particles: Vec<Particle>,
}

impl SceneState {
    /// Build the fixed particle set.
    pub fn generate() -> Self {
        let particles = (0..PARTICLE_COUNT)
            .map(|index| Particle {
                seed: index as u32 + 1,
                base_radius: 60.0 + index as f64 * 22.0,
            })
            .collect();
        Self { particles }
    }

    /// Borrow the particle descriptors in order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_fixed_and_ordered() {
        let a = SceneState::generate();
        let b = SceneState::generate();
        assert_eq!(a, b);
        assert_eq!(a.particles().len(), PARTICLE_COUNT);
        assert_eq!(a.particles()[0].seed, 1);
        assert_eq!(a.particles()[0].base_radius, 60.0);
        assert_eq!(a.particles()[23].seed, 24);
        assert_eq!(a.particles()[23].base_radius, 60.0 + 23.0 * 22.0);
    }
}
