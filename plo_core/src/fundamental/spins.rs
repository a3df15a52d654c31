use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
/// The number of spin channels only has two variants:
pub enum NumSpins {
    /// - One: paramagnetic / non-spin-polarized data
    One,
    /// - Two: collinear spin-polarized data
    Two,
}

impl NumSpins {
    /// Returns spin count, either 1 or 2
    pub fn spin_count(&self) -> usize {
        match self {
            NumSpins::One => 1,
            NumSpins::Two => 2,
        }
    }

    /// Occupation degeneracy factor for density-matrix sums:
    /// 2 when a single channel stands for both spins, 1 otherwise
    pub fn degeneracy(&self) -> f64 {
        match self {
            NumSpins::One => 2.0,
            NumSpins::Two => 1.0,
        }
    }
}

#[derive(Debug, Error)]
#[error("Try to convert to `NumSpins` from value out of 1 and 2.")]
/// Error for implementation of `TryFrom<usize>` for NumSpins
pub struct NumSpinsConvertError;

impl TryFrom<usize> for NumSpins {
    type Error = NumSpinsConvertError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            _ => Err(NumSpinsConvertError),
        }
    }
}
