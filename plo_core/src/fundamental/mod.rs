/// Shell labels and their sub-basis transformations
mod shell;
/// Number of spin channels
mod spins;

/// Raw projector metadata and groups
mod projector;

use derive_builder::Builder;
use ndarray::{Array1, Array2, Array3, Array4};
use num_complex::Complex64;

pub use projector::{ORBITAL_LABELS, OrbitalTrait, ProjectorGroup};
pub use shell::Shell;
pub use spins::{NumSpins, NumSpinsConvertError};

use crate::error::PloError;

/// Immutable Kohn-Sham inputs handed over by the plane-wave engine adaptor.
///
/// Axis order of the dense arrays:
/// - `enk`, `occupy`: `[band, k-point, spin]`
/// - `chipsi`: `[projector, band, k-point, spin]`
///
/// `weight` holds the k-point integration weights (summing to one), `itet`
/// the analytic-tetrahedron list with the multiplicity in column 0 and four
/// zero-based corner k-indices in columns 1..=4, `volt` the common
/// tetrahedron volume factor.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder()]
pub struct KSData {
    /// Band energies
    pub enk: Array3<f64>,
    /// Projector amplitudes `<chi_{site,l,m}|psi_{nk}>`
    pub chipsi: Array4<Complex64>,
    /// K-point weights in BZ sampling
    pub weight: Array1<f64>,
    /// Fermi level of the calculation
    pub fermi: f64,
    /// Band occupations, needed for the density-matrix diagnostic only
    #[builder(default)]
    pub occupy: Option<Array3<f64>>,
    /// Tetrahedron list, needed for the partial-DOS diagnostic only
    #[builder(default)]
    pub itet: Option<Array2<usize>>,
    /// Tetrahedron volume factor
    #[builder(default = "0.0")]
    pub volt: f64,
}

impl KSData {
    /// Number of raw projector channels
    pub fn nproj(&self) -> usize {
        self.chipsi.dim().0
    }

    /// Number of bands
    pub fn nband(&self) -> usize {
        self.enk.dim().0
    }

    /// Number of k-points
    pub fn nkpt(&self) -> usize {
        self.enk.dim().1
    }

    /// Number of spin channels
    pub fn nspin(&self) -> usize {
        self.enk.dim().2
    }

    /// Spin channel count as the checked enum
    pub fn num_spins(&self) -> Result<NumSpins, PloError> {
        NumSpins::try_from(self.nspin())
            .map_err(|e| PloError::ShapeMismatch(format!("spin axis of enk: {e}")))
    }

    /// Check that every array agrees on `nband`, `nkpt` and `nspin`
    pub fn validate(&self) -> Result<(), PloError> {
        let (nband, nkpt, nspin) = self.enk.dim();
        self.num_spins()?;
        if nband == 0 || nkpt == 0 {
            return Err(PloError::ShapeMismatch(format!(
                "enk has degenerate shape {:?}",
                self.enk.dim()
            )));
        }
        let (_, cband, ckpt, cspin) = self.chipsi.dim();
        if (cband, ckpt, cspin) != (nband, nkpt, nspin) {
            return Err(PloError::ShapeMismatch(format!(
                "chipsi trailing axes {:?} do not match enk {:?}",
                (cband, ckpt, cspin),
                (nband, nkpt, nspin)
            )));
        }
        if self.weight.len() != nkpt {
            return Err(PloError::ShapeMismatch(format!(
                "weight holds {} entries for {nkpt} k-point(s)",
                self.weight.len()
            )));
        }
        if let Some(occupy) = &self.occupy {
            if occupy.dim() != (nband, nkpt, nspin) {
                return Err(PloError::ShapeMismatch(format!(
                    "occupy shape {:?} does not match enk {:?}",
                    occupy.dim(),
                    (nband, nkpt, nspin)
                )));
            }
        }
        if let Some(itet) = &self.itet {
            if itet.ncols() != 5 {
                return Err(PloError::ShapeMismatch(format!(
                    "itet must hold 5 columns, got {}",
                    itet.ncols()
                )));
            }
            for t in 0..itet.nrows() {
                for corner in 1..5 {
                    let k = itet[[t, corner]];
                    if k >= nkpt {
                        return Err(PloError::ShapeMismatch(format!(
                            "tetrahedron corner k-index {k} out of range for {nkpt} k-point(s)"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Min and max band energy over the whole mesh
    pub fn energy_range(&self) -> (f64, f64) {
        let min = self.enk.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.enk.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    }

    /// Shift all band energies so the Fermi level sits at zero.
    ///
    /// Idempotent afterwards: the pair `(enk, fermi = 0)` is a fixed point.
    pub fn calibrate_fermi(&mut self) {
        let fermi = self.fermi;
        self.enk.mapv_inplace(|e| e - fermi);
        self.fermi = 0.0;
    }
}
