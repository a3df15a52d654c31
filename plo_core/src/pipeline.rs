use ndarray::Array4;
use num_complex::Complex64;

use crate::config::{PloConfig, Smearing};
use crate::diagnostics::{
    Diagnostics, density_matrix, full_hamiltonian, local_hamiltonian, overlap,
};
use crate::error::PloError;
use crate::fundamental::{KSData, ProjectorGroup};
use crate::groups::resolve_groups;
use crate::lowdin::{orthonormalise_joint, orthonormalise_per_group};
use crate::projection::{filter, rotate};
use crate::tetra::partial_dos;
use crate::window::{ProjWindow, resolve_windows};

/// Everything the projection pipeline hands to the downstream engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PloOutput {
    /// Resolved groups with correlation flags, shells and transformations
    pub groups: Vec<ProjectorGroup>,
    /// One window per group, in group order
    pub windows: Vec<ProjWindow>,
    /// Per group: orthonormalised projectors `[ndim, nbnd, nkpt, nspin]`
    pub projectors: Vec<Array4<Complex64>>,
    /// Present when requested via [`run_with_diagnostics`]
    pub diagnostics: Option<Diagnostics>,
}

/// Run the projection pipeline: Fermi calibration, group and window
/// resolution, rotation, filtering, Löwdin orthonormalisation.
///
/// Consumes the Kohn-Sham data; all stages run to completion in order and
/// the first failing check aborts the pipeline.
pub fn run(
    ks: KSData,
    cfg: &PloConfig,
    raw_groups: Vec<ProjectorGroup>,
) -> Result<PloOutput, PloError> {
    run_impl(ks, cfg, raw_groups, false)
}

/// Same pipeline, additionally computing the construction-quality matrices,
/// the k-resolved Hamiltonian (joint mode) and the tetrahedron partial DOS
/// (with `smear = "tetra"` and tetrahedron data present).
pub fn run_with_diagnostics(
    ks: KSData,
    cfg: &PloConfig,
    raw_groups: Vec<ProjectorGroup>,
) -> Result<PloOutput, PloError> {
    run_impl(ks, cfg, raw_groups, true)
}

fn run_impl(
    mut ks: KSData,
    cfg: &PloConfig,
    raw_groups: Vec<ProjectorGroup>,
    with_diagnostics: bool,
) -> Result<PloOutput, PloError> {
    ks.validate()?;
    cfg.validate()?;
    ks.calibrate_fermi();

    let groups = resolve_groups(cfg, raw_groups)?;
    let windows = resolve_windows(&cfg.window, groups.len(), &ks.enk.view())?;

    let mut projectors = Vec::with_capacity(groups.len());
    for (group, pw) in groups.iter().zip(&windows) {
        let rotated = rotate(&ks.chipsi, group)?;
        projectors.push(filter(&rotated, pw));
    }

    // a single shared window pair selects the joint mode
    let joint = cfg.window.len() == 2;
    if joint {
        orthonormalise_joint(&mut projectors, &windows[0])?;
    } else {
        for (proj, pw) in projectors.iter_mut().zip(&windows) {
            orthonormalise_per_group(proj, pw)?;
        }
    }

    let diagnostics = if with_diagnostics {
        Some(compute_diagnostics(&ks, cfg, &windows, &projectors, joint)?)
    } else {
        None
    };
    Ok(PloOutput {
        groups,
        windows,
        projectors,
        diagnostics,
    })
}

fn compute_diagnostics(
    ks: &KSData,
    cfg: &PloConfig,
    windows: &[ProjWindow],
    projectors: &[Array4<Complex64>],
    joint: bool,
) -> Result<Diagnostics, PloError> {
    let sigma = ks.num_spins()?.degeneracy();
    let ovlp = projectors
        .iter()
        .zip(windows)
        .map(|(proj, pw)| overlap(proj, pw, &ks.weight))
        .collect();
    let dm = ks.occupy.as_ref().map(|occupy| {
        projectors
            .iter()
            .zip(windows)
            .map(|(proj, pw)| density_matrix(proj, pw, &ks.weight, occupy, sigma))
            .collect()
    });
    let hloc = projectors
        .iter()
        .zip(windows)
        .map(|(proj, pw)| local_hamiltonian(proj, pw, &ks.weight, &ks.enk))
        .collect();
    let hamk = (joint && !projectors.is_empty())
        .then(|| full_hamiltonian(projectors, &windows[0], &ks.enk));
    let dos = match (&cfg.smear, &ks.itet) {
        (Smearing::Tetra, Some(itet)) => Some(
            projectors
                .iter()
                .zip(windows)
                .map(|(proj, pw)| partial_dos(proj, pw, &ks.enk, itet, ks.volt))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => None,
    };
    Ok(Diagnostics {
        ovlp,
        dm,
        hloc,
        hamk,
        dos,
    })
}

#[cfg(test)]
mod test {
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2, Array3, Array4, arr3};
    use num_complex::Complex64;

    use crate::config::{PloConfig, Smearing, WindowValue};
    use crate::diagnostics::{write_dos, write_hamk};
    use crate::fundamental::{KSDataBuilder, ProjectorGroup, Shell};

    use super::{run, run_with_diagnostics};

    fn trivial_config() -> PloConfig {
        PloConfig {
            nsite: 1,
            atoms: vec!["H : 1".to_string()],
            shell: vec![Shell::S],
            window: vec![WindowValue::Index(1), WindowValue::Index(1)],
            smear: Smearing::Gauss,
        }
    }

    #[test]
    fn trivial_single_band_system() {
        let ks = KSDataBuilder::default()
            .enk(arr3(&[[[0.5]]]))
            .chipsi(Array4::from_elem((1, 1, 1, 1), Complex64::new(1.0, 0.0)))
            .weight(Array1::from_elem(1, 1.0))
            .fermi(0.5)
            .build()
            .unwrap();
        let raw = vec![ProjectorGroup::from_raw(1, 0, vec![0]).unwrap()];
        let out = run_with_diagnostics(ks, &trivial_config(), raw).unwrap();

        assert!(out.groups[0].corr);
        assert_eq!(out.windows[0].nbnd, 1);
        let amp = out.projectors[0][[0, 0, 0, 0]];
        assert_abs_diff_eq!(amp.re, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(amp.im, 0.0, epsilon = 1e-12);

        let diag = out.diagnostics.unwrap();
        assert_abs_diff_eq!(diag.ovlp[0][[0, 0, 0]], 1.0, epsilon = 1e-12);
        // Fermi calibration pulled the only band to zero
        assert_abs_diff_eq!(diag.hloc[0][[0, 0, 0]].re, 0.0, epsilon = 1e-12);
        assert!(diag.hamk.is_some());
        assert!(diag.dm.is_none());
        assert!(diag.dos.is_none());
    }

    /// A two-site t2g system over a shared energy window, with occupations
    /// and one tetrahedron, exercising every diagnostic at once.
    fn spin_polarized_fixture() -> (crate::fundamental::KSData, PloConfig, Vec<ProjectorGroup>) {
        let (nproj, nband, nkpt, nspin) = (10, 8, 4, 2);
        let mut enk = Array3::zeros((nband, nkpt, nspin));
        for ((b, k, s), e) in enk.indexed_iter_mut() {
            *e = -2.0 + b as f64 * 0.7 + (k as f64) * 0.08 + s as f64 * 0.03;
        }
        let mut chipsi = Array4::zeros((nproj, nband, nkpt, nspin));
        for ((p, b, k, s), c) in chipsi.indexed_iter_mut() {
            // distinct per-channel frequencies keep every Löwdin overlap
            // comfortably positive definite
            let amp = 1.0 + 0.05 * p as f64 + 0.02 * b as f64 + 0.03 * k as f64 + 0.01 * s as f64;
            let phase = std::f64::consts::TAU * (p * b) as f64 / nproj as f64
                + 0.3 * (b * k) as f64
                + 0.7 * s as f64;
            *c = Complex64::from_polar(amp, phase);
        }
        let occupy = enk.mapv(|e| if e < 0.6 { 1.0 } else { 0.0 });
        let ks = KSDataBuilder::default()
            .enk(enk)
            .chipsi(chipsi)
            .weight(Array1::from_elem(nkpt, 1.0 / nkpt as f64))
            .fermi(0.6)
            .occupy(Some(occupy))
            .itet(Some(
                Array2::from_shape_vec((2, 5), vec![1, 0, 1, 2, 3, 2, 0, 2, 1, 3]).unwrap(),
            ))
            .volt(1.0 / 3.0)
            .build()
            .unwrap();
        let cfg = PloConfig {
            nsite: 2,
            atoms: vec!["V : 1".to_string(), "V : 2".to_string()],
            shell: vec![Shell::DT2g, Shell::DT2g],
            window: vec![WindowValue::Energy(-3.2), WindowValue::Energy(3.6)],
            smear: Smearing::Tetra,
        };
        let raw = vec![
            ProjectorGroup::from_raw(1, 2, (0..5).collect()).unwrap(),
            ProjectorGroup::from_raw(2, 2, (5..10).collect()).unwrap(),
        ];
        (ks, cfg, raw)
    }

    #[test]
    fn joint_run_produces_all_diagnostics() {
        let (ks, cfg, raw) = spin_polarized_fixture();
        let out = run_with_diagnostics(ks, &cfg, raw).unwrap();
        assert_eq!(out.projectors.len(), 2);
        assert_eq!(out.projectors[0].dim().0, 3);
        let diag = out.diagnostics.unwrap();
        let hamk = diag.hamk.expect("joint mode emits the stacked Hamiltonian");
        assert_eq!(hamk.dim().0, 6);
        assert!(diag.dm.is_some());
        assert_eq!(diag.dos.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn separate_windows_skip_the_stacked_hamiltonian() {
        let (ks, mut cfg, raw) = spin_polarized_fixture();
        cfg.window = vec![
            WindowValue::Index(1),
            WindowValue::Index(6),
            WindowValue::Index(2),
            WindowValue::Index(7),
        ];
        let out = run_with_diagnostics(ks, &cfg, raw).unwrap();
        let diag = out.diagnostics.unwrap();
        assert!(diag.hamk.is_none());
        assert!(diag.dos.is_some());
    }

    #[test]
    fn repeated_runs_emit_identical_bytes() {
        let render = || {
            let (ks, cfg, raw) = spin_polarized_fixture();
            let out = run_with_diagnostics(ks, &cfg, raw).unwrap();
            let diag = out.diagnostics.unwrap();
            let mut bytes = Vec::new();
            write_hamk(&mut bytes, diag.hamk.as_ref().unwrap()).unwrap();
            for pdos in diag.dos.as_ref().unwrap() {
                write_dos(&mut bytes, pdos).unwrap();
            }
            bytes
        };
        let first = render();
        let second = render();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn run_without_diagnostics_is_lean() {
        let (ks, cfg, raw) = spin_polarized_fixture();
        let out = run(ks, &cfg, raw).unwrap();
        assert!(out.diagnostics.is_none());
    }
}
