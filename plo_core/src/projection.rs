use ndarray::Array4;
use num_complex::Complex64;

use crate::error::PloError;
use crate::fundamental::ProjectorGroup;
use crate::window::ProjWindow;

/// Apply a group's transformation to the raw amplitudes, reducing the
/// projector axis to the group's sub-basis:
/// `R[q, b, k, s] = sum_j T[q, j] * chipsi[orbitals[j], b, k, s]`.
pub fn rotate(
    chipsi: &Array4<Complex64>,
    group: &ProjectorGroup,
) -> Result<Array4<Complex64>, PloError> {
    let (nproj, nband, nkpt, nspin) = chipsi.dim();
    let ndim = group.ndim();
    let ncol = group.transform.ncols();
    if ncol != group.orbitals.len() {
        return Err(PloError::ShapeMismatch(format!(
            "transformation of the site-{} group spans {ncol} column(s) for {} projector(s)",
            group.site,
            group.orbitals.len()
        )));
    }
    if let Some(&bad) = group.orbitals.iter().find(|&&p| p >= nproj) {
        return Err(PloError::ShapeMismatch(format!(
            "projector index {bad} out of range for {nproj} raw channel(s)"
        )));
    }
    if nband < ndim {
        return Err(PloError::InsufficientBands {
            nbnd: nband,
            ndim,
            ikpt: 0,
            ispin: 0,
        });
    }
    let mut rotated = Array4::zeros((ndim, nband, nkpt, nspin));
    for ispin in 0..nspin {
        for ikpt in 0..nkpt {
            for iband in 0..nband {
                for q in 0..ndim {
                    let mut acc = Complex64::ZERO;
                    for (j, &p) in group.orbitals.iter().enumerate() {
                        acc += group.transform[[q, j]] * chipsi[[p, iband, ikpt, ispin]];
                    }
                    rotated[[q, iband, ikpt, ispin]] = acc;
                }
            }
        }
    }
    Ok(rotated)
}

/// Copy each `(k, s)` slot of the rotated amplitudes restricted to its band
/// window into a zero-padded, left-aligned window-sized array: column `j`
/// of a slot holds band `kwin[k, s, 0] + j`, columns past the slot's usable
/// count stay zero.
pub fn filter(rotated: &Array4<Complex64>, pw: &ProjWindow) -> Array4<Complex64> {
    let (ndim, _, nkpt, nspin) = rotated.dim();
    let mut filtered = Array4::zeros((ndim, pw.nbnd, nkpt, nspin));
    for ispin in 0..nspin {
        for ikpt in 0..nkpt {
            let ib1 = pw.kwin[[ikpt, ispin, 0]];
            let ib3 = pw.nbands_at(ikpt, ispin);
            for j in 0..ib3 {
                for q in 0..ndim {
                    filtered[[q, j, ikpt, ispin]] = rotated[[q, ib1 + j, ikpt, ispin]];
                }
            }
        }
    }
    filtered
}

#[cfg(test)]
mod test {
    use ndarray::Array4;
    use num_complex::Complex64;

    use crate::config::WindowValue;
    use crate::fundamental::{ProjectorGroup, Shell};
    use crate::window::resolve_windows;

    use super::{filter, rotate};

    fn amplitudes(values: &[f64]) -> Array4<Complex64> {
        let mut chipsi = Array4::zeros((values.len(), 1, 1, 1));
        for (p, &v) in values.iter().enumerate() {
            chipsi[[p, 0, 0, 0]] = Complex64::new(v, 0.0);
        }
        chipsi
    }

    #[test]
    fn identity_transform_is_identity_on_selected_rows() {
        let chipsi = amplitudes(&[9.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let group = ProjectorGroup::from_raw(1, 2, (1..6).collect()).unwrap();
        let rotated = rotate(&chipsi, &group).unwrap();
        assert_eq!(rotated.dim(), (5, 1, 1, 1));
        for q in 0..5 {
            assert_eq!(rotated[[q, 0, 0, 0]], chipsi[[q + 1, 0, 0, 0]]);
        }
    }

    #[test]
    fn t2g_selects_channels_one_two_four() {
        let chipsi = amplitudes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut group = ProjectorGroup::from_raw(1, 2, (0..5).collect()).unwrap();
        group.shell = Shell::DT2g;
        group.transform = group.shell.transform();
        let rotated = rotate(&chipsi, &group).unwrap();
        assert_eq!(rotated.dim().0, 3);
        assert_eq!(rotated[[0, 0, 0, 0]].re, 1.0);
        assert_eq!(rotated[[1, 0, 0, 0]].re, 2.0);
        assert_eq!(rotated[[2, 0, 0, 0]].re, 4.0);
    }

    #[test]
    fn filter_left_aligns_each_slot() {
        // two k-points with different energy windows: (bands 0..=1) and (1..=2)
        let mut enk = ndarray::Array3::zeros((3, 2, 1));
        enk[[0, 0, 0]] = 0.0;
        enk[[1, 0, 0]] = 1.0;
        enk[[2, 0, 0]] = 5.0;
        enk[[0, 1, 0]] = -5.0;
        enk[[1, 1, 0]] = 0.5;
        enk[[2, 1, 0]] = 1.5;
        let pw = &resolve_windows(
            &[WindowValue::Energy(-0.1), WindowValue::Energy(2.0)],
            1,
            &enk.view(),
        )
        .unwrap()[0];
        assert_eq!((pw.bmin, pw.bmax, pw.nbnd), (0, 2, 3));

        let mut rotated = Array4::zeros((1, 3, 2, 1));
        for k in 0..2 {
            for b in 0..3 {
                rotated[[0, b, k, 0]] = Complex64::new((10 * k + b) as f64, 0.0);
            }
        }
        let filtered = filter(&rotated, pw);
        // k = 0 keeps bands 0, 1
        assert_eq!(filtered[[0, 0, 0, 0]].re, 0.0);
        assert_eq!(filtered[[0, 1, 0, 0]].re, 1.0);
        assert_eq!(filtered[[0, 2, 0, 0]].re, 0.0);
        // k = 1 keeps bands 1, 2 left-aligned at column 0
        assert_eq!(filtered[[0, 0, 1, 0]].re, 11.0);
        assert_eq!(filtered[[0, 1, 1, 0]].re, 12.0);
        assert_eq!(filtered[[0, 2, 1, 0]].re, 0.0);
    }

    #[test]
    fn rotation_needs_enough_bands() {
        // a d-shell group over a single band cannot be orthonormalised later
        let chipsi = Array4::from_elem((5, 1, 1, 1), Complex64::new(1.0, 0.0));
        let group = ProjectorGroup::from_raw(1, 2, (0..5).collect()).unwrap();
        assert!(rotate(&chipsi, &group).is_err());
    }
}
