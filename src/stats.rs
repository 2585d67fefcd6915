// Bare k-eff accumulator over active cycles: sample mean and the
// standard error of the mean.

#[derive(Debug, Clone, Default)]
pub struct KeffTally {
    values: Vec<f64>,
}

impl KeffTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, keff: f64) {
        self.values.push(keff);
    }

    pub fn n(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Standard error of the mean; zero with fewer than two cycles.
    pub fn std_error(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance =
            self.values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64;
        (variance / n as f64).sqrt()
    }
}
