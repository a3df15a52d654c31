use ndarray::{Array2, Array3, Array4};
use num_complex::Complex64;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::PloError;
use crate::window::{BandWindow, ProjWindow};

/// Spacing of the DOS energy mesh
const MESH_STEP: f64 = 0.01;

/// Partial density of states of one projector group on a uniform energy
/// mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDos {
    /// Mesh energies, ascending
    pub mesh: Vec<f64>,
    /// DOS values, `(ndim, nspin, nmesh)`
    pub dos: Array3<f64>,
}

/// Integrated step-function weight of one tetrahedron: the fraction of its
/// volume with band energy below `eps`, by the Blöchl closed form over the
/// four corner energies.
pub fn blochl_weight(eps: f64, corners: [f64; 4]) -> f64 {
    let [e1, e2, e3, e4] = sorted(corners);
    if eps <= e1 {
        0.0
    } else if eps <= e2 {
        (eps - e1).powi(3) / ((e2 - e1) * (e3 - e1) * (e4 - e1))
    } else if eps <= e3 {
        // each region's denominators are nonzero whenever the region has
        // interior, since the branch conditions force the strict gaps
        let c = (e3 - e1) * (e4 - e1);
        let d = eps - e2;
        ((e2 - e1).powi(2) + 3.0 * (e2 - e1) * d + 3.0 * d * d) / c
            - (e3 + e4 - e1 - e2) * d.powi(3) / (c * (e3 - e2) * (e4 - e2))
    } else if eps <= e4 {
        1.0 - (e4 - eps).powi(3) / ((e4 - e1) * (e4 - e2) * (e4 - e3))
    } else {
        1.0
    }
}

/// Delta-function weight `dw/deps` of one tetrahedron, used for the DOS.
pub fn blochl_delta(eps: f64, corners: [f64; 4]) -> f64 {
    let [e1, e2, e3, e4] = sorted(corners);
    if eps <= e1 {
        0.0
    } else if eps <= e2 {
        3.0 * (eps - e1).powi(2) / ((e2 - e1) * (e3 - e1) * (e4 - e1))
    } else if eps <= e3 {
        let c = (e3 - e1) * (e4 - e1);
        let d = eps - e2;
        (3.0 * (e2 - e1) + 6.0 * d) / c
            - 3.0 * (e3 + e4 - e1 - e2) * d * d / (c * (e3 - e2) * (e4 - e2))
    } else if eps <= e4 {
        3.0 * (e4 - eps).powi(2) / ((e4 - e1) * (e4 - e2) * (e4 - e3))
    } else {
        0.0
    }
}

fn sorted(mut corners: [f64; 4]) -> [f64; 4] {
    corners.sort_by(f64::total_cmp);
    corners
}

/// The DOS mesh of a group: its energy window for energy windows, the
/// floor/ceiling envelope of the window's band energies for index windows.
pub fn dos_mesh(pw: &ProjWindow, enk: &Array3<f64>) -> Vec<f64> {
    let (emin, emax) = match pw.bwin {
        BandWindow::Energies(lo, hi) => (lo, hi),
        BandWindow::Indices(..) => {
            let bands = enk.slice(ndarray::s![pw.bmin..=pw.bmax, .., ..]);
            let lo = bands.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = bands.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (lo.floor(), hi.ceil())
        }
    };
    let nmesh = ((emax - emin) / MESH_STEP).round() as usize + 1;
    (0..nmesh).map(|m| emin + MESH_STEP * m as f64).collect()
}

/// Partial DOS of one group by analytic-tetrahedron integration.
///
/// Each tetrahedron's delta weight at a mesh energy is split equally over
/// its four corner k-points, scaled by its multiplicity times `volt` and
/// normalised by the total tetrahedron weight, then folded with the
/// filtered amplitudes over the group's window.
pub fn partial_dos(
    proj: &Array4<Complex64>,
    pw: &ProjWindow,
    enk: &Array3<f64>,
    itet: &Array2<usize>,
    volt: f64,
) -> Result<PartialDos, PloError> {
    let (ndim, _, nkpt, nspin) = proj.dim();
    let (nband, _, _) = enk.dim();
    let mult_total: usize = (0..itet.nrows()).map(|t| itet[[t, 0]]).sum();
    let sum_tweight = volt * mult_total as f64;
    if !(sum_tweight > 0.0) {
        return Err(PloError::ShapeMismatch(format!(
            "total tetrahedron weight {sum_tweight} must be positive"
        )));
    }
    let mesh = dos_mesh(pw, enk);

    // mesh points are independent of each other, so the parallel map keeps
    // the fixed spin-outer / k-inner reduction order within each point
    let columns: Vec<Array2<f64>> = mesh
        .clone()
        .into_par_iter()
        .map(|eps| {
            let mut column = Array2::zeros((ndim, nspin));
            for ispin in 0..nspin {
                let mut wbk: Array2<f64> = Array2::zeros((nband, nkpt));
                for t in 0..itet.nrows() {
                    let mult = itet[[t, 0]] as f64;
                    let ks = [itet[[t, 1]], itet[[t, 2]], itet[[t, 3]], itet[[t, 4]]];
                    let share = 0.25 * mult * volt / sum_tweight;
                    for b in pw.bmin..=pw.bmax {
                        let corners = [
                            enk[[b, ks[0], ispin]],
                            enk[[b, ks[1], ispin]],
                            enk[[b, ks[2], ispin]],
                            enk[[b, ks[3], ispin]],
                        ];
                        let delta = blochl_delta(eps, corners);
                        if delta != 0.0 {
                            for &k in &ks {
                                wbk[[b, k]] += share * delta;
                            }
                        }
                    }
                }
                for ikpt in 0..nkpt {
                    let ib1 = pw.kwin[[ikpt, ispin, 0]];
                    for j in 0..pw.nbands_at(ikpt, ispin) {
                        let w = wbk[[ib1 + j, ikpt]];
                        if w != 0.0 {
                            for q in 0..ndim {
                                column[[q, ispin]] += w * proj[[q, j, ikpt, ispin]].norm_sqr();
                            }
                        }
                    }
                }
            }
            column
        })
        .collect();

    let mut dos = Array3::zeros((ndim, nspin, mesh.len()));
    for (m, column) in columns.iter().enumerate() {
        for ispin in 0..nspin {
            for q in 0..ndim {
                dos[[q, ispin, m]] = column[[q, ispin]];
            }
        }
    }
    Ok(PartialDos { mesh, dos })
}
