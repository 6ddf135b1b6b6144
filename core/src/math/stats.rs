/// Exponentially weighted moving average starting from zero.
#[derive(Debug, Clone)]
pub struct ExponentialAverage {
    weight: f64,
    value: f64,
}

impl ExponentialAverage {
    /// `weight` is the share given to each new sample.
    pub fn new(weight: f64) -> Self {
        Self {
            weight: weight.clamp(0.0, 1.0),
            value: 0.0,
        }
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        self.value = self.value * (1.0 - self.weight) + sample * self.weight;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}
