// Structured view of an ACE continuous-energy neutron table.
//
// File parsing is an external concern: whatever reads the binary or ASCII
// library hands the kernel these records (they deserialize from JSON with
// serde, which is also how the test fixtures are written). Energies are in
// eV, cross sections in barns, kT in eV.

use serde::{Deserialize, Serialize};

/// A reaction cross section tabulated on the tail of the isotope's native
/// energy grid, starting at its threshold index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSection {
    start: usize,
    values: Vec<f64>,
}

impl CrossSection {
    pub fn new(start: usize, values: Vec<f64>) -> Self {
        Self { start, values }
    }

    /// First native-grid index with a tabulated value.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at an absolute native-grid index; zero below threshold.
    pub fn at(&self, index: usize) -> f64 {
        if index < self.start {
            return 0.0;
        }
        let local = index - self.start;
        if local < self.values.len() {
            self.values[local]
        } else {
            *self.values.last().unwrap_or(&0.0)
        }
    }

    /// Linear interpolation between absolute indices `index` and
    /// `index + 1`.
    pub fn interpolate(&self, index: usize, factor: f64) -> f64 {
        let lo = self.at(index);
        let hi = self.at(index + 1);
        lo + factor * (hi - lo)
    }

    /// Sum two cross sections defined on the same native grid.
    pub fn add(&self, other: &CrossSection) -> CrossSection {
        let start = self.start.min(other.start);
        let end = (self.start + self.values.len()).max(other.start + other.values.len());
        let values = (start..end).map(|i| self.at(i) + other.at(i)).collect();
        CrossSection { start, values }
    }
}

/// A simple (x, y) table with linear interpolation and endpoint clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tabulated {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Tabulated {
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.x.len();
        if n == 0 {
            return 0.0;
        }
        if n == 1 || x <= self.x[0] {
            return self.y[0];
        }
        if x >= self.x[n - 1] {
            return self.y[n - 1];
        }
        let i = self.x.partition_point(|&v| v <= x) - 1;
        let f = (x - self.x[i]) / (self.x[i + 1] - self.x[i]);
        self.y[i] + f * (self.y[i + 1] - self.y[i])
    }
}

/// Angular distribution of a reaction: one cosine table per tabulated
/// incident energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngularData {
    pub energies: Vec<f64>,
    pub tables: Vec<AngularTable>,
}

impl AngularData {
    pub fn isotropic() -> Self {
        Self { energies: vec![0.0], tables: vec![AngularTable::Isotropic] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "kebab-case")]
pub enum AngularTable {
    Isotropic,
    /// 33 cosine boundaries delimiting 32 equiprobable bins.
    EquiBins { bins: Vec<f64> },
    /// Tabulated pdf/cdf over cosine, histogram (1) or lin-lin (2).
    Tabular {
        interpolation: u8,
        mu: Vec<f64>,
        pdf: Vec<f64>,
        cdf: Vec<f64>,
    },
}

/// One outgoing-energy table of a continuous tabular law (law 4): pdf/cdf
/// over outgoing energy with a leading block of discrete lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularSpectrum {
    pub interpolation: u8,
    #[serde(default)]
    pub n_discrete: usize,
    pub e_out: Vec<f64>,
    pub pdf: Vec<f64>,
    pub cdf: Vec<f64>,
}

/// Law 44 table: a tabular spectrum plus the Kalbach-87 precompound
/// fraction R and slope A on the same outgoing-energy grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KalbachSpectrum {
    #[serde(flatten)]
    pub spectrum: TabularSpectrum,
    pub r: Vec<f64>,
    pub a: Vec<f64>,
}

/// Secondary-energy law data, keyed by the ENDF law number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "law", rename_all = "kebab-case")]
pub enum EnergyLawData {
    /// Law 3: discrete-level scattering, E_out = C (E - threshold) in the
    /// center of mass.
    Level { threshold: f64, mass_ratio: f64 },
    /// Law 4: continuous tabular distribution.
    Tabular { ein: Vec<f64>, tables: Vec<TabularSpectrum> },
    /// Laws 7 and 9: simple Maxwellian / evaporation spectrum with an
    /// incident-energy-dependent temperature and restriction energy U.
    Maxwellian { ein: Vec<f64>, temperature: Vec<f64>, restriction: f64 },
    /// Law 44: Kalbach-87 correlated energy-angle.
    Kalbach { ein: Vec<f64>, tables: Vec<KalbachSpectrum> },
}

/// NU (fission yield) data: polynomial in energy or a tabulated curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "kebab-case")]
pub enum NuData {
    Polynomial { coefficients: Vec<f64> },
    Tabulated { e: Vec<f64>, nu: Vec<f64> },
}

impl NuData {
    /// Average number of neutrons per fission at the given energy.
    pub fn nu_bar(&self, energy: f64) -> f64 {
        match self {
            NuData::Polynomial { coefficients } => {
                let mut nu = 0.0;
                for &c in coefficients.iter().rev() {
                    nu = nu * energy + c;
                }
                nu
            }
            NuData::Tabulated { e, nu } => Tabulated { x: e.clone(), y: nu.clone() }.evaluate(energy),
        }
    }
}

/// One delayed-neutron precursor group from the DLY block: its decay
/// constant, its energy-dependent emission probability, and the delayed
/// spectrum sampled for progeny routed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedGroup {
    pub decay_constant: f64,
    pub probability: Tabulated,
    pub spectrum: EnergyLawData,
}

/// One reaction record (indexed by MT).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionData {
    pub mt: u32,
    /// Q-value in eV.
    #[serde(default)]
    pub q: f64,
    /// TY neutron yield; negative values flag center-of-mass secondary
    /// distributions, per the ACE convention.
    #[serde(default = "default_ty")]
    pub ty: i32,
    pub xs: CrossSection,
    #[serde(default)]
    pub angular: Option<AngularData>,
    #[serde(default)]
    pub energy: Option<EnergyLawData>,
}

fn default_ty() -> i32 {
    1
}

/// Multi-chance fission MT numbers (first through fourth chance).
pub const CHANCE_FISSION_MTS: [u32; 4] = [19, 20, 21, 38];

/// The structured view of one ACE NeutronTable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutronTable {
    pub name: String,
    /// Atomic weight ratio (target mass over neutron mass).
    pub awr: f64,
    /// Table temperature in eV.
    pub kt: f64,
    /// Native energy grid (eV), ascending.
    pub energy: Vec<f64>,
    /// ESZ arrays on the full native grid.
    pub total: Vec<f64>,
    pub absorption: Vec<f64>,
    pub elastic: Vec<f64>,
    /// Angular distribution of elastic scattering.
    pub elastic_angular: AngularData,
    /// Every other reaction carrying neutrons out (inelastic channels and
    /// fission chances), keyed by MT.
    #[serde(default)]
    pub reactions: Vec<ReactionData>,
    #[serde(default)]
    pub nu_total: Option<NuData>,
    #[serde(default)]
    pub nu_prompt: Option<NuData>,
    #[serde(default)]
    pub nu_delayed: Option<NuData>,
    #[serde(default)]
    pub delayed_groups: Vec<DelayedGroup>,
}

impl NeutronTable {
    pub fn reaction(&self, mt: u32) -> Option<&ReactionData> {
        self.reactions.iter().find(|r| r.mt == mt)
    }

    /// Total fission cross section: MT 18 when present, otherwise the sum
    /// of the chance-fission channels.
    pub fn fission_xs(&self) -> Option<CrossSection> {
        if let Some(r) = self.reaction(18) {
            return Some(r.xs.clone());
        }
        let chances: Vec<&ReactionData> = self
            .reactions
            .iter()
            .filter(|r| CHANCE_FISSION_MTS.contains(&r.mt))
            .collect();
        if chances.is_empty() {
            return None;
        }
        let mut sum = chances[0].xs.clone();
        for r in &chances[1..] {
            sum = sum.add(&r.xs);
        }
        Some(sum)
    }

    pub fn has_fission(&self) -> bool {
        self.reaction(18).is_some()
            || self.reactions.iter().any(|r| CHANCE_FISSION_MTS.contains(&r.mt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_section_threshold_indexing() {
        let xs = CrossSection::new(2, vec![1.0, 2.0, 3.0]);
        assert_eq!(xs.at(0), 0.0);
        assert_eq!(xs.at(1), 0.0);
        assert_eq!(xs.at(2), 1.0);
        assert_eq!(xs.at(4), 3.0);
        assert!((xs.interpolate(2, 0.5) - 1.5).abs() < 1e-12);
        // Across the threshold the value ramps from zero
        assert!((xs.interpolate(1, 0.25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_cross_section_sum() {
        let a = CrossSection::new(1, vec![1.0, 1.0, 1.0]);
        let b = CrossSection::new(2, vec![2.0, 2.0]);
        let sum = a.add(&b);
        assert_eq!(sum.start(), 1);
        assert_eq!(sum.at(1), 1.0);
        assert_eq!(sum.at(2), 3.0);
        assert_eq!(sum.at(3), 3.0);
    }

    #[test]
    fn test_nu_polynomial_and_tabulated() {
        let poly = NuData::Polynomial { coefficients: vec![2.0, 1e-7] };
        assert!((poly.nu_bar(1e6) - 2.1).abs() < 1e-12);

        let tab = NuData::Tabulated { e: vec![0.0, 1e6], nu: vec![2.0, 3.0] };
        assert!((tab.nu_bar(5e5) - 2.5).abs() < 1e-12);
        assert!((tab.nu_bar(2e6) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_fission_xs_prefers_mt18_then_sums_chances() {
        let mut table = NeutronTable {
            name: "t".into(),
            awr: 235.0,
            kt: 0.025,
            energy: vec![1.0, 2.0, 3.0],
            total: vec![2.0; 3],
            absorption: vec![1.0; 3],
            elastic: vec![1.0; 3],
            elastic_angular: AngularData::isotropic(),
            reactions: vec![ReactionData {
                mt: 19,
                q: 0.0,
                ty: 0,
                xs: CrossSection::new(0, vec![0.5; 3]),
                angular: None,
                energy: None,
            }],
            nu_total: None,
            nu_prompt: None,
            nu_delayed: None,
            delayed_groups: vec![],
        };
        assert!(table.has_fission());
        assert_eq!(table.fission_xs().unwrap().at(1), 0.5);

        table.reactions.push(ReactionData {
            mt: 18,
            q: 0.0,
            ty: 0,
            xs: CrossSection::new(0, vec![0.7; 3]),
            angular: None,
            energy: None,
        });
        assert_eq!(table.fission_xs().unwrap().at(1), 0.7);
    }

    #[test]
    fn test_table_roundtrips_through_json() {
        let table = NeutronTable {
            name: "fake".into(),
            awr: 1.0,
            kt: 0.025,
            energy: vec![1e-5, 2e7],
            total: vec![2.0, 2.0],
            absorption: vec![1.0, 1.0],
            elastic: vec![1.0, 1.0],
            elastic_angular: AngularData::isotropic(),
            reactions: vec![],
            nu_total: None,
            nu_prompt: Some(NuData::Polynomial { coefficients: vec![2.0] }),
            nu_delayed: None,
            delayed_groups: vec![],
        };
        let json = serde_json::to_string(&table).unwrap();
        let back: NeutronTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
