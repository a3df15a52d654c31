use ndarray::Array2;
use num_complex::Complex64;

use crate::error::PloError;

use super::Shell;

/// Cubic-harmonic orbital labels in the order the plane-wave engine emits
/// projector channels: one s, three p, five d, seven f.
pub const ORBITAL_LABELS: [&str; 16] = [
    "s",
    "py",
    "pz",
    "px",
    "dxy",
    "dyz",
    "dz2",
    "dxz",
    "dx2-y2",
    "fy(3x2-y2)",
    "fxyz",
    "fyz2",
    "fz3",
    "fxz2",
    "fz(x2-y2)",
    "fx(x2-3y2)",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Metadata of one raw projector channel
pub struct OrbitalTrait {
    /// Site index the projector is attached to, counting from 1
    pub site: usize,
    /// Angular momentum quantum number
    pub l: usize,
    /// Magnetic channel within the shell, `0..=2l`
    pub m: usize,
    /// Cubic-harmonic label
    pub label: &'static str,
}

impl OrbitalTrait {
    /// Build a trait from the engine-emitted orbital label.
    ///
    /// With `lm` the position of the label in [`ORBITAL_LABELS`], the
    /// quantum numbers satisfy `lm = l^2 + m`.
    pub fn from_label(site: usize, label: &str) -> Result<Self, PloError> {
        if site == 0 {
            return Err(PloError::ConfigInconsistent(format!(
                "projector site index must count from 1 (label {label})"
            )));
        }
        let lm = ORBITAL_LABELS
            .iter()
            .position(|&known| known == label)
            .ok_or_else(|| PloError::UnknownShell(label.to_string()))?;
        let l = (lm as f64).sqrt() as usize;
        Ok(Self {
            site,
            l,
            m: lm - l * l,
            label: ORBITAL_LABELS[lm],
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A group of raw projector channels sharing one site and one angular
/// momentum, plus the transformation that carves out its sub-basis.
pub struct ProjectorGroup {
    /// Site index, counting from 1
    pub site: usize,
    /// Angular momentum quantum number
    pub l: usize,
    /// Marked true by the group resolver when the configuration claims
    /// this site and shell for the correlated subspace
    pub corr: bool,
    /// Shell label; starts as the full shell of `l`
    pub shell: Shell,
    /// Indices into the raw projector axis, length `2l + 1`
    pub orbitals: Vec<usize>,
    /// Rectangular transformation `ndim x (2l + 1)`
    pub transform: Array2<Complex64>,
}

impl ProjectorGroup {
    /// Build a raw group as the engine adaptor hands it over: not yet
    /// correlated, full shell, identity transformation.
    pub fn from_raw(site: usize, l: usize, orbitals: Vec<usize>) -> Result<Self, PloError> {
        if orbitals.len() != 2 * l + 1 {
            return Err(PloError::ShapeMismatch(format!(
                "group at site {site} with l = {l} must hold {} projector(s), got {}",
                2 * l + 1,
                orbitals.len()
            )));
        }
        let shell = Shell::default_for_l(l)?;
        Ok(Self {
            site,
            l,
            corr: false,
            shell,
            orbitals,
            transform: shell.transform(),
        })
    }

    /// Build the raw group list from the engine's trait table: consecutive
    /// channels sharing `(site, l)` form one group, in table order.
    pub fn from_traits(traits: &[OrbitalTrait]) -> Result<Vec<Self>, PloError> {
        let mut groups: Vec<Self> = Vec::new();
        let mut run: Vec<usize> = Vec::new();
        for (p, t) in traits.iter().enumerate() {
            let continues = run
                .last()
                .map(|&prev| (traits[prev].site, traits[prev].l) == (t.site, t.l))
                .unwrap_or(false);
            if !run.is_empty() && !continues {
                let head = run[0];
                let members = std::mem::take(&mut run);
                groups.push(Self::from_raw(traits[head].site, traits[head].l, members)?);
            }
            run.push(p);
        }
        if let Some(&head) = run.first() {
            groups.push(Self::from_raw(traits[head].site, traits[head].l, run)?);
        }
        Ok(groups)
    }

    /// Rows of the transformation: the dimension of the projected sub-basis
    pub fn ndim(&self) -> usize {
        self.transform.nrows()
    }
}
