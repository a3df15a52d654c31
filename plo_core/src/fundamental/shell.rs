use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::PloError;

/// The closed set of shell labels a projector group may carry.
///
/// The crystal-field split variants `d_t2g`/`d_eg` select a sub-basis of the
/// five d channels; the plain labels keep the full `2l + 1` basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Shell {
    /// l = 0, full basis
    #[serde(rename = "s")]
    S,
    /// l = 1, full basis
    #[serde(rename = "p")]
    P,
    /// l = 2, full basis
    #[serde(rename = "d")]
    D,
    /// l = 3, full basis
    #[serde(rename = "f")]
    F,
    /// l = 2, t2g triplet (dxy, dyz, dxz)
    #[serde(rename = "d_t2g")]
    DT2g,
    /// l = 2, eg doublet (dz2, dx2-y2)
    #[serde(rename = "d_eg")]
    DEg,
}

impl Shell {
    /// Angular momentum quantum number of the underlying raw basis
    pub fn l(&self) -> usize {
        match self {
            Shell::S => 0,
            Shell::P => 1,
            Shell::D | Shell::DT2g | Shell::DEg => 2,
            Shell::F => 3,
        }
    }

    /// Number of orbitals kept after the shell transformation
    pub fn ndim(&self) -> usize {
        match self {
            Shell::S => 1,
            Shell::P => 3,
            Shell::D => 5,
            Shell::F => 7,
            Shell::DT2g => 3,
            Shell::DEg => 2,
        }
    }

    /// The full shell for a given angular momentum
    pub fn default_for_l(l: usize) -> Result<Self, PloError> {
        match l {
            0 => Ok(Shell::S),
            1 => Ok(Shell::P),
            2 => Ok(Shell::D),
            3 => Ok(Shell::F),
            other => Err(PloError::UnknownShell(format!(
                "no shell for angular momentum l = {other}"
            ))),
        }
    }

    /// Materialise the rectangular transformation `T` of this shell,
    /// `ndim x (2l + 1)`.
    ///
    /// Full shells map to the identity. The split d shells are selector
    /// matrices over the raw ordering (dxy, dyz, dz2, dxz, dx2-y2):
    /// t2g keeps channels 1, 2, 4 and eg keeps channels 3, 5 (one-based).
    pub fn transform(&self) -> Array2<Complex64> {
        let one = Complex64::new(1.0, 0.0);
        let ncol = 2 * self.l() + 1;
        let mut t = Array2::zeros((self.ndim(), ncol));
        match self {
            Shell::S | Shell::P | Shell::D | Shell::F => {
                for i in 0..self.ndim() {
                    t[[i, i]] = one;
                }
            }
            Shell::DT2g => {
                t[[0, 0]] = one;
                t[[1, 1]] = one;
                t[[2, 3]] = one;
            }
            Shell::DEg => {
                t[[0, 2]] = one;
                t[[1, 4]] = one;
            }
        }
        t
    }
}

impl FromStr for Shell {
    type Err = PloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(Shell::S),
            "p" => Ok(Shell::P),
            "d" => Ok(Shell::D),
            "f" => Ok(Shell::F),
            "d_t2g" => Ok(Shell::DT2g),
            "d_eg" => Ok(Shell::DEg),
            other => Err(PloError::UnknownShell(other.to_string())),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Shell::S => "s",
            Shell::P => "p",
            Shell::D => "d",
            Shell::F => "f",
            Shell::DT2g => "d_t2g",
            Shell::DEg => "d_eg",
        };
        write!(f, "{label}")
    }
}
