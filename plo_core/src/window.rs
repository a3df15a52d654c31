use ndarray::{Array3, ArrayView3};

use crate::config::WindowValue;
use crate::error::PloError;

/// The two runtime kinds of a band window, kept apart as a sum type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandWindow {
    /// One-based, inclusive band indices, constant over `(k, s)`
    Indices(i64, i64),
    /// Energy interval relative to the Fermi level, intersected with the
    /// band energies per `(k, s)`
    Energies(f64, f64),
}

/// The resolved window of one projector group.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjWindow {
    /// The window as configured
    pub bwin: BandWindow,
    /// Zero-based inclusive band bounds per slot, `[nkpt, nspin, 2]`
    pub kwin: Array3<usize>,
    /// Smallest lower bound over all slots
    pub bmin: usize,
    /// Largest upper bound over all slots
    pub bmax: usize,
    /// Padded window size, `bmax - bmin + 1`
    pub nbnd: usize,
}

impl ProjWindow {
    /// Usable bands of one `(k, s)` slot
    pub fn nbands_at(&self, ikpt: usize, ispin: usize) -> usize {
        self.kwin[[ikpt, ispin, 1]] - self.kwin[[ikpt, ispin, 0]] + 1
    }
}

/// Resolve one window per group from the flat bound list: a single pair is
/// shared by every group, otherwise each group gets its own pair.
pub fn resolve_windows(
    window: &[WindowValue],
    ngroup: usize,
    enk: &ArrayView3<f64>,
) -> Result<Vec<ProjWindow>, PloError> {
    let pairs = pair_windows(window)?;
    if pairs.len() != 1 && pairs.len() != ngroup {
        return Err(PloError::ConfigInconsistent(format!(
            "{} window pair(s) for {ngroup} group(s); need one shared pair or one per group",
            pairs.len()
        )));
    }
    (0..ngroup)
        .map(|g| {
            let bwin = if pairs.len() == 1 { pairs[0] } else { pairs[g] };
            resolve_one(bwin, enk)
        })
        .collect()
}

/// Group the flat bound list into typed pairs, rejecting mixed-kind and
/// unordered pairs.
fn pair_windows(window: &[WindowValue]) -> Result<Vec<BandWindow>, PloError> {
    if window.is_empty() || window.len() % 2 != 0 {
        return Err(PloError::BadWindow(format!(
            "window must hold pairs of bounds, got {} value(s)",
            window.len()
        )));
    }
    window
        .chunks_exact(2)
        .map(|pair| {
            let bwin = match (pair[0], pair[1]) {
                (WindowValue::Index(lo), WindowValue::Index(hi)) => BandWindow::Indices(lo, hi),
                (WindowValue::Energy(lo), WindowValue::Energy(hi)) => BandWindow::Energies(lo, hi),
                _ => {
                    return Err(PloError::BadWindow(
                        "window pair mixes a band index with an energy".to_string(),
                    ));
                }
            };
            match bwin {
                // an index pair may collapse to a single band, an energy
                // interval may not
                BandWindow::Indices(lo, hi) if hi < lo => Err(PloError::BadWindow(format!(
                    "band index window ({lo}, {hi}) is not ordered"
                ))),
                BandWindow::Energies(lo, hi) if hi <= lo => Err(PloError::BadWindow(format!(
                    "energy window ({lo}, {hi}) is not ordered"
                ))),
                ordered => Ok(ordered),
            }
        })
        .collect()
}

fn resolve_one(bwin: BandWindow, enk: &ArrayView3<f64>) -> Result<ProjWindow, PloError> {
    let (nband, nkpt, nspin) = enk.dim();
    let mut kwin = Array3::zeros((nkpt, nspin, 2));
    match bwin {
        BandWindow::Indices(lo, hi) => {
            if lo < 1 || hi > nband as i64 {
                return Err(PloError::BadWindow(format!(
                    "band index window ({lo}, {hi}) escapes the band range 1..={nband}"
                )));
            }
            for ikpt in 0..nkpt {
                for ispin in 0..nspin {
                    kwin[[ikpt, ispin, 0]] = (lo - 1) as usize;
                    kwin[[ikpt, ispin, 1]] = (hi - 1) as usize;
                }
            }
        }
        BandWindow::Energies(lo, hi) => {
            let emin = enk.iter().copied().fold(f64::INFINITY, f64::min);
            let emax = enk.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if hi < emin || lo > emax {
                return Err(PloError::BadWindow(format!(
                    "energy window ({lo}, {hi}) misses the band energies [{emin}, {emax}]"
                )));
            }
            for ikpt in 0..nkpt {
                for ispin in 0..nspin {
                    let column = enk.slice(ndarray::s![.., ikpt, ispin]);
                    let first = column.iter().position(|&e| e >= lo);
                    let last = column.iter().rposition(|&e| e <= hi);
                    let (Some(first), Some(last)) = (first, last) else {
                        return Err(PloError::BadWindow(format!(
                            "energy window ({lo}, {hi}) selects no band at (k = {ikpt}, s = {ispin})"
                        )));
                    };
                    if last < first {
                        return Err(PloError::BadWindow(format!(
                            "energy window ({lo}, {hi}) selects no band at (k = {ikpt}, s = {ispin})"
                        )));
                    }
                    kwin[[ikpt, ispin, 0]] = first;
                    kwin[[ikpt, ispin, 1]] = last;
                }
            }
        }
    }
    let bmin = kwin
        .slice(ndarray::s![.., .., 0])
        .iter()
        .copied()
        .min()
        .unwrap_or(0);
    let bmax = kwin
        .slice(ndarray::s![.., .., 1])
        .iter()
        .copied()
        .max()
        .unwrap_or(0);
    Ok(ProjWindow {
        bwin,
        kwin,
        bmin,
        bmax,
        nbnd: bmax - bmin + 1,
    })
}
