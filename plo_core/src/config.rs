use serde::{Deserialize, Serialize};

use crate::error::PloError;
use crate::fundamental::Shell;

/// Configuration of the projection pipeline, deserialized from the driver's
/// TOML section and threaded through by reference. No global state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PloConfig {
    /// Number of correlated sites; must equal the lengths of `atoms` and
    /// `shell`
    pub nsite: usize,
    /// One entry per correlated site, carrying a parseable site index
    /// (for example `"V : 2"`)
    pub atoms: Vec<String>,
    /// Shell label claimed for each correlated site
    pub shell: Vec<Shell>,
    /// Flat list of window bounds: one pair, or one pair per group. Each
    /// pair is either two band indices or two energies
    pub window: Vec<WindowValue>,
    /// Smearing scheme of the driver; the tetrahedron DOS diagnostic is
    /// gated on `tetra`
    #[serde(default)]
    pub smear: Smearing,
}

/// One bound of a band window. TOML integers become band indices, TOML
/// floats become energies; the two kinds never mix within a pair.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WindowValue {
    /// One-based band index
    Index(i64),
    /// Energy relative to the Fermi level
    Energy(f64),
}

/// Smearing scheme labels accepted from the driver configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Smearing {
    /// Analytic tetrahedron integration
    #[serde(rename = "tetra")]
    Tetra,
    /// Methfessel-Paxton smearing
    #[serde(rename = "m-p")]
    MethfesselPaxton,
    /// Gaussian smearing
    #[default]
    #[serde(rename = "gauss")]
    Gauss,
}

impl PloConfig {
    /// Check the list lengths against each other before any resolution step
    pub fn validate(&self) -> Result<(), PloError> {
        if self.nsite != self.atoms.len() || self.nsite != self.shell.len() {
            return Err(PloError::ConfigInconsistent(format!(
                "nsite = {} but atoms holds {} and shell holds {} entries",
                self.nsite,
                self.atoms.len(),
                self.shell.len()
            )));
        }
        if self.window.is_empty() || self.window.len() % 2 != 0 {
            return Err(PloError::BadWindow(format!(
                "window must hold pairs of bounds, got {} value(s)",
                self.window.len()
            )));
        }
        Ok(())
    }

    /// Site index of every `atoms` entry, in order
    pub fn site_indices(&self) -> Result<Vec<usize>, PloError> {
        self.atoms.iter().map(|e| parse_site_index(e)).collect()
    }

    /// Generate example
    pub fn example() -> Self {
        Self {
            nsite: 1,
            atoms: vec!["V : 1".to_string()],
            shell: vec![Shell::DT2g],
            window: vec![WindowValue::Energy(-1.4), WindowValue::Energy(2.6)],
            smear: Smearing::Tetra,
        }
    }
}

/// The site index is the last integer token of the entry, so both `"V : 2"`
/// and `"2"` parse.
fn parse_site_index(entry: &str) -> Result<usize, PloError> {
    entry
        .split(|c: char| !c.is_ascii_digit())
        .filter(|token| !token.is_empty())
        .next_back()
        .and_then(|token| token.parse::<usize>().ok())
        .filter(|&site| site >= 1)
        .ok_or_else(|| {
            PloError::ConfigInconsistent(format!("no site index found in atoms entry {entry:?}"))
        })
}
