// Tabulated accumulated-probability samplers.
//
// A sampler over n choices with energy-dependent partial probabilities
// stores, per energy row, the cumulative sum of the first n-1 partials
// (optionally divided by the row total):
//
//         [c-0] [c-1] [c-2] .... [c-(n-2)]
//   [e-0]  0.1   0.2   0.35 ....  0.98
//   [e-1]  0.2   0.3   0.45 ....  0.98
//   ...
//
// Sampling at row i with a draw u is a binary search for the first column
// whose value exceeds u; if none does, the last choice is returned. The
// interpolated variant compares against `row[i] + f * (row[i+1] - row[i])`
// during the search without ever materializing the interpolated row.
//
// The threshold variant elides the zeros of high-threshold reactions: rows
// below the smallest represented index fall through to a default choice,
// and each stored row only covers the reactions already above threshold.

use crate::ace::CrossSection;
use crate::error::BuildError;

#[derive(Debug, Clone)]
pub struct TableSampler<T> {
    choices: Vec<T>,
    nenergy: usize,
    /// Row-major, (choices.len() - 1) entries per row.
    matrix: Vec<f64>,
}

impl<T> TableSampler<T> {
    /// Build from per-choice probability tables, normalizing each row by
    /// its total. Every table must have the same length.
    pub fn normalized(choices: Vec<T>, tables: &[Vec<f64>]) -> Result<Self, BuildError> {
        Self::build(choices, tables, true)
    }

    /// Build from per-choice tables without normalizing: the caller samples
    /// with a value drawn in [0, row_total).
    pub fn raw(choices: Vec<T>, tables: &[Vec<f64>]) -> Result<Self, BuildError> {
        Self::build(choices, tables, false)
    }

    /// Build from a single set of weights (one energy row).
    pub fn from_weights(choices: Vec<T>, weights: &[f64]) -> Result<Self, BuildError> {
        let tables: Vec<Vec<f64>> = weights.iter().map(|&w| vec![w]).collect();
        Self::build(choices, &tables, true)
    }

    fn build(choices: Vec<T>, tables: &[Vec<f64>], normalize: bool) -> Result<Self, BuildError> {
        if choices.is_empty() || tables.len() != choices.len() {
            return Err(BuildError::Sampler(format!(
                "sampler over {} choices given {} probability tables",
                choices.len(),
                tables.len()
            )));
        }
        let nenergy = tables[0].len();
        if tables.iter().any(|t| t.len() != nenergy) || nenergy == 0 {
            return Err(BuildError::Sampler(
                "sampler probability tables have inconsistent lengths".into(),
            ));
        }

        let nreaction = choices.len();
        let mut matrix = vec![0.0; (nreaction - 1) * nenergy];
        for nerg in 0..nenergy {
            let total: f64 = if normalize {
                tables.iter().map(|t| t[nerg]).sum()
            } else {
                1.0
            };
            let mut partial = 0.0;
            for nrea in 0..nreaction - 1 {
                partial += tables[nrea][nerg];
                matrix[nerg * (nreaction - 1) + nrea] =
                    if normalize { partial / total } else { partial };
            }
        }
        Ok(Self { choices, nenergy, matrix })
    }

    pub fn choices(&self) -> &[T] {
        &self.choices
    }

    pub fn nenergy(&self) -> usize {
        self.nenergy
    }

    fn row(&self, index: usize) -> &[f64] {
        let n = self.choices.len() - 1;
        &self.matrix[index * n..(index + 1) * n]
    }

    /// Sample a choice at energy row `index` with draw `value`.
    pub fn sample(&self, index: usize, value: f64) -> &T {
        if self.choices.len() == 1 {
            return &self.choices[0];
        }
        let row = self.row(index);
        let k = row.partition_point(|&x| x <= value);
        &self.choices[k]
    }

    /// Sample between rows `index` and `index + 1` with interpolation
    /// factor `factor`.
    pub fn sample_factor(&self, index: usize, value: f64, factor: f64) -> &T {
        if self.choices.len() == 1 {
            return &self.choices[0];
        }
        let (index, factor) = if index + 1 < self.nenergy {
            (index, factor)
        } else {
            (self.nenergy - 1, 0.0)
        };
        let lo = self.row(index);
        let hi = if factor > 0.0 { self.row(index + 1) } else { lo };
        let lerp = |k: usize| lo[k] + factor * (hi[k] - lo[k]);

        // First column whose interpolated value exceeds the draw
        let mut first = 0usize;
        let mut count = lo.len();
        while count > 0 {
            let step = count / 2;
            let k = first + step;
            if lerp(k) <= value {
                first = k + 1;
                count -= step + 1;
            } else {
                count = step;
            }
        }
        &self.choices[first]
    }
}

/// Sparse sampler over reactions with energy thresholds. Reactions are
/// sorted by descending threshold; rows store only the cumulative partial
/// sums of reactions already above threshold (raw, not normalized), and
/// indices below the first represented row return the lowest-threshold
/// choice outright.
#[derive(Debug, Clone)]
pub struct ThresholdSampler<T> {
    choices: Vec<T>,
    emin: usize,
    rows: Vec<Vec<f64>>,
}

impl<T> ThresholdSampler<T> {
    pub fn new(entries: Vec<(T, CrossSection)>) -> Result<Self, BuildError> {
        if entries.is_empty() {
            return Err(BuildError::Sampler("threshold sampler over no reactions".into()));
        }
        let nenergy = entries
            .iter()
            .map(|(_, xs)| xs.start() + xs.len())
            .max()
            .unwrap();

        let mut entries = entries;
        // Highest threshold first; the last entry becomes the default
        entries.sort_by(|a, b| b.1.start().cmp(&a.1.start()));

        let nreaction = entries.len();
        let emin = if nreaction > 1 { entries[nreaction - 2].1.start() } else { 0 };

        let mut rows = Vec::with_capacity(nenergy - emin);
        for i in 0..nenergy - emin {
            let nerg = emin + i;
            let avail = entries.iter().filter(|(_, xs)| xs.start() <= nerg).count();
            let mut row = Vec::with_capacity(avail.saturating_sub(1));
            let mut partial = 0.0;
            for j in 0..avail.saturating_sub(1) {
                let rea = j + (nreaction - avail);
                partial += entries[rea].1.at(nerg);
                row.push(partial);
            }
            rows.push(row);
        }

        let choices = entries.into_iter().map(|(c, _)| c).collect();
        Ok(Self { choices, emin, rows })
    }

    pub fn choices(&self) -> &[T] {
        &self.choices
    }

    /// The choice returned for energies below every stored row: the one
    /// with the lowest threshold.
    pub fn default_choice(&self) -> &T {
        &self.choices[self.choices.len() - 1]
    }

    /// Sample at native-grid row `index` with draw `value` in
    /// [0, row_total) and interpolation factor `factor`.
    pub fn sample(&self, index: usize, value: f64, factor: f64) -> &T {
        let nreaction = self.choices.len();
        if nreaction == 1 {
            return &self.choices[0];
        }
        if index < self.emin {
            return self.default_choice();
        }
        let (nrow, factor) = if index - self.emin + 1 < self.rows.len() {
            (index - self.emin, factor)
        } else {
            (self.rows.len() - 1, 0.0)
        };

        let low = &self.rows[nrow];
        if low.is_empty() {
            // Only one reaction above threshold here
            return self.default_choice();
        }
        let high: &[f64] = if factor > 0.0 { &self.rows[nrow + 1] } else { low };
        // Rows are aligned at the tail: the longer (higher-energy) row has
        // extra leading entries for reactions that just crossed threshold.
        let shift = high.len() - low.len();
        let lerp = |k: usize| low[k] + factor * (high[k + shift] - low[k]);

        let base = (nreaction - 1) - low.len();
        if value < lerp(0) {
            return &self.choices[base];
        }
        if value > lerp(low.len() - 1) {
            return &self.choices[nreaction - 1];
        }
        let mut first = 0usize;
        let mut count = low.len();
        while count > 0 {
            let step = count / 2;
            let k = first + step;
            if lerp(k) <= value {
                first = k + 1;
                count -= step + 1;
            } else {
                count = step;
            }
        }
        &self.choices[base + first]
    }
}
