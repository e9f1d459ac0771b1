/// Fixed-step accumulator for the animate/bake loop.
/// Poses advance at a constant rate whatever the frame time is.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    dt: f32,
    accumulator: f32,
    /// Backlog cap: more steps than this in one frame are dropped.
    max_steps: u32,
}

impl FixedTimestep {
    pub fn new(dt: f32, max_steps: u32) -> Self {
        Self {
            dt,
            accumulator: 0.0,
            max_steps: max_steps.max(1),
        }
    }

    /// Add frame time. Returns the number of fixed steps to run now.
    pub fn accumulate(&mut self, frame_dt: f32) -> u32 {
        self.accumulator = (self.accumulator + frame_dt.max(0.0)).min(self.dt * self.max_steps as f32);
        let steps = (self.accumulator / self.dt) as u32;
        self.accumulator -= steps as f32 * self.dt;
        steps
    }

    /// Fraction of a step left over, for render interpolation.
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.dt
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn partial_frames_carry_over() {
        let mut ts = FixedTimestep::new(DT, 10);
        assert_eq!(ts.accumulate(0.008), 0);
        assert_eq!(ts.accumulate(0.010), 1);
        assert!((0.0..1.0).contains(&ts.alpha()));
    }

    #[test]
    fn long_frames_are_capped() {
        let mut ts = FixedTimestep::new(DT, 4);
        assert_eq!(ts.accumulate(1.0), 4);
        assert_eq!(ts.accumulate(-1.0), 0);
    }
}
