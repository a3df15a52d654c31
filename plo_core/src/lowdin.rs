use nalgebra::{DMatrix, DVector, linalg::SymmetricEigen};
use ndarray::Array4;
use num_complex::Complex64;

use crate::error::PloError;
use crate::window::ProjWindow;

/// Löwdin-normalise `M` in place: `M <- (M M†)^(-1/2) M`.
///
/// The overlap `M M†` is Hermitian; its eigendecomposition must yield
/// strictly positive eigenvalues for the inverse square root to exist.
/// `(ikpt, ispin)` only label the slice for the error message.
pub(crate) fn orthogonalise(
    m: &mut DMatrix<Complex64>,
    ikpt: usize,
    ispin: usize,
) -> Result<(), PloError> {
    let overlap = &*m * m.adjoint();
    let eig = SymmetricEigen::new(overlap);
    if let Some(&value) = eig.eigenvalues.iter().find(|&&v| v <= 0.0) {
        return Err(PloError::NonPositiveOverlap { value, ikpt, ispin });
    }
    let inv_sqrt = DVector::from_iterator(
        eig.eigenvalues.len(),
        eig.eigenvalues
            .iter()
            .map(|&v| Complex64::new(1.0 / v.sqrt(), 0.0)),
    );
    let s = &eig.eigenvectors * DMatrix::from_diagonal(&inv_sqrt) * eig.eigenvectors.adjoint();
    *m = s * &*m;
    Ok(())
}

/// Orthonormalise one group inside its own window: every `(k, s)` slot's
/// usable slice is Löwdin-normalised independently.
pub fn orthonormalise_per_group(
    proj: &mut Array4<Complex64>,
    pw: &ProjWindow,
) -> Result<(), PloError> {
    let (ndim, _, nkpt, nspin) = proj.dim();
    for ispin in 0..nspin {
        for ikpt in 0..nkpt {
            let ib3 = pw.nbands_at(ikpt, ispin);
            if ib3 < ndim {
                return Err(PloError::InsufficientBands {
                    nbnd: ib3,
                    ndim,
                    ikpt,
                    ispin,
                });
            }
            let mut m = DMatrix::zeros(ndim, ib3);
            gather(proj, ikpt, ispin, 0, &mut m);
            orthogonalise(&mut m, ikpt, ispin)?;
            scatter(&m, ikpt, ispin, 0, proj);
        }
    }
    Ok(())
}

/// Orthonormalise all groups jointly inside one shared window: per `(k, s)`
/// slot the groups' slices are stacked into block rows, normalised as one
/// matrix, and scattered back.
pub fn orthonormalise_joint(
    projs: &mut [Array4<Complex64>],
    pw: &ProjWindow,
) -> Result<(), PloError> {
    let Some(first) = projs.first() else {
        return Ok(());
    };
    let (_, _, nkpt, nspin) = first.dim();
    let total: usize = projs.iter().map(|p| p.dim().0).sum();
    for ispin in 0..nspin {
        for ikpt in 0..nkpt {
            let ib3 = pw.nbands_at(ikpt, ispin);
            if ib3 < total {
                return Err(PloError::InsufficientBands {
                    nbnd: ib3,
                    ndim: total,
                    ikpt,
                    ispin,
                });
            }
            let mut m = DMatrix::zeros(total, ib3);
            let mut row = 0;
            for proj in projs.iter() {
                gather(proj, ikpt, ispin, row, &mut m);
                row += proj.dim().0;
            }
            orthogonalise(&mut m, ikpt, ispin)?;
            let mut row = 0;
            for proj in projs.iter_mut() {
                scatter(&m, ikpt, ispin, row, proj);
                row += proj.dim().0;
            }
        }
    }
    Ok(())
}

/// Copy a slot's usable columns into the working matrix at block row `row0`
fn gather(
    proj: &Array4<Complex64>,
    ikpt: usize,
    ispin: usize,
    row0: usize,
    m: &mut DMatrix<Complex64>,
) {
    let ndim = proj.dim().0;
    for q in 0..ndim {
        for j in 0..m.ncols() {
            m[(row0 + q, j)] = proj[[q, j, ikpt, ispin]];
        }
    }
}

/// Write the normalised block rows back into the slot
fn scatter(
    m: &DMatrix<Complex64>,
    ikpt: usize,
    ispin: usize,
    row0: usize,
    proj: &mut Array4<Complex64>,
) {
    let ndim = proj.dim().0;
    for q in 0..ndim {
        for j in 0..m.ncols() {
            proj[[q, j, ikpt, ispin]] = m[(row0 + q, j)];
        }
    }
}
