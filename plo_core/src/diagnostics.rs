use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::{Array1, Array3, Array4};
use num_complex::Complex64;

use crate::error::PloError;
use crate::tetra::PartialDos;
use crate::window::ProjWindow;

/// Opt-in by-products of the projection: construction-quality matrices for
/// inspection plus the k-resolved Hamiltonian and partial DOS handed to the
/// downstream engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    /// Per group: overlap matrix `(ndim, ndim, nspin)`
    pub ovlp: Vec<Array3<f64>>,
    /// Per group: density matrix, present when occupations were supplied
    pub dm: Option<Vec<Array3<f64>>>,
    /// Per group: local Hamiltonian `(ndim, ndim, nspin)`
    pub hloc: Vec<Array3<Complex64>>,
    /// Joint mode only: k-resolved Hamiltonian over the stacked basis,
    /// `(ntotal, ntotal, nkpt, nspin)`
    pub hamk: Option<Array4<Complex64>>,
    /// Per group: tetrahedron partial DOS, present with `smear = "tetra"`
    /// and tetrahedron data
    pub dos: Option<Vec<PartialDos>>,
}

impl Diagnostics {
    /// Write every available artefact into `dir`: `hamk.chk` and one
    /// `dos.chk.<g>` per group (`g` counting from 1).
    pub fn write_all(&self, dir: &Path) -> Result<(), PloError> {
        if let Some(hamk) = &self.hamk {
            let mut out = BufWriter::new(File::create(dir.join("hamk.chk"))?);
            write_hamk(&mut out, hamk)?;
        }
        if let Some(dos) = &self.dos {
            for (g, pdos) in dos.iter().enumerate() {
                let name = format!("dos.chk.{}", g + 1);
                let mut out = BufWriter::new(File::create(dir.join(name))?);
                write_dos(&mut out, pdos)?;
            }
        }
        Ok(())
    }
}

/// K-weight of the diagnostic reductions
fn omega(weight: &Array1<f64>, ikpt: usize) -> f64 {
    weight[ikpt] / weight.len() as f64
}

/// Overlap of one group: `ovlp[s] = sum_k w_k Re(A A†)` over each slot's
/// usable columns.
pub fn overlap(proj: &Array4<Complex64>, pw: &ProjWindow, weight: &Array1<f64>) -> Array3<f64> {
    let (ndim, _, nkpt, nspin) = proj.dim();
    let mut ovlp = Array3::zeros((ndim, ndim, nspin));
    for ispin in 0..nspin {
        for ikpt in 0..nkpt {
            let wk = omega(weight, ikpt);
            let ib3 = pw.nbands_at(ikpt, ispin);
            for p in 0..ndim {
                for q in 0..ndim {
                    let mut acc = Complex64::ZERO;
                    for j in 0..ib3 {
                        acc += proj[[p, j, ikpt, ispin]] * proj[[q, j, ikpt, ispin]].conj();
                    }
                    ovlp[[p, q, ispin]] += wk * acc.re;
                }
            }
        }
    }
    ovlp
}

/// Density matrix of one group:
/// `dm[s] = sum_k w_k sigma Re(A diag(occupy) A†)`, with the occupations
/// taken from each slot's own band range.
pub fn density_matrix(
    proj: &Array4<Complex64>,
    pw: &ProjWindow,
    weight: &Array1<f64>,
    occupy: &Array3<f64>,
    sigma: f64,
) -> Array3<f64> {
    let (ndim, _, nkpt, nspin) = proj.dim();
    let mut dm = Array3::zeros((ndim, ndim, nspin));
    for ispin in 0..nspin {
        for ikpt in 0..nkpt {
            let wk = omega(weight, ikpt) * sigma;
            let ib1 = pw.kwin[[ikpt, ispin, 0]];
            let ib3 = pw.nbands_at(ikpt, ispin);
            for p in 0..ndim {
                for q in 0..ndim {
                    let mut acc = Complex64::ZERO;
                    for j in 0..ib3 {
                        acc += proj[[p, j, ikpt, ispin]]
                            * occupy[[ib1 + j, ikpt, ispin]]
                            * proj[[q, j, ikpt, ispin]].conj();
                    }
                    dm[[p, q, ispin]] += wk * acc.re;
                }
            }
        }
    }
    dm
}

/// Local Hamiltonian of one group:
/// `H[s] = sum_k w_k A diag(enk) A†`, complex, over each slot's band range.
pub fn local_hamiltonian(
    proj: &Array4<Complex64>,
    pw: &ProjWindow,
    weight: &Array1<f64>,
    enk: &Array3<f64>,
) -> Array3<Complex64> {
    let (ndim, _, nkpt, nspin) = proj.dim();
    let mut hloc = Array3::zeros((ndim, ndim, nspin));
    for ispin in 0..nspin {
        for ikpt in 0..nkpt {
            let wk = omega(weight, ikpt);
            let ib1 = pw.kwin[[ikpt, ispin, 0]];
            let ib3 = pw.nbands_at(ikpt, ispin);
            for p in 0..ndim {
                for q in 0..ndim {
                    let mut acc = Complex64::ZERO;
                    for j in 0..ib3 {
                        acc += proj[[p, j, ikpt, ispin]]
                            * enk[[ib1 + j, ikpt, ispin]]
                            * proj[[q, j, ikpt, ispin]].conj();
                    }
                    hloc[[p, q, ispin]] += wk * acc;
                }
            }
        }
    }
    hloc
}

/// K-resolved Hamiltonian over the jointly orthonormalised stack:
/// `H[:, :, k, s] = M diag(enk) M†` per slot, no k sum and no k weight, so
/// the downstream engine receives the bare dispersion.
pub fn full_hamiltonian(
    projs: &[Array4<Complex64>],
    pw: &ProjWindow,
    enk: &Array3<f64>,
) -> Array4<Complex64> {
    let (_, _, nkpt, nspin) = projs[0].dim();
    let total: usize = projs.iter().map(|p| p.dim().0).sum();
    let mut hamk = Array4::zeros((total, total, nkpt, nspin));
    // block-row offset of each group inside the stack
    let offsets: Vec<usize> = projs
        .iter()
        .scan(0, |row, p| {
            let here = *row;
            *row += p.dim().0;
            Some(here)
        })
        .collect();
    for ispin in 0..nspin {
        for ikpt in 0..nkpt {
            let ib1 = pw.kwin[[ikpt, ispin, 0]];
            let ib3 = pw.nbands_at(ikpt, ispin);
            for (ga, &ra) in projs.iter().zip(&offsets) {
                for (gb, &rb) in projs.iter().zip(&offsets) {
                    for p in 0..ga.dim().0 {
                        for q in 0..gb.dim().0 {
                            let mut acc = Complex64::ZERO;
                            for j in 0..ib3 {
                                acc += ga[[p, j, ikpt, ispin]]
                                    * enk[[ib1 + j, ikpt, ispin]]
                                    * gb[[q, j, ikpt, ispin]].conj();
                            }
                            hamk[[ra + p, rb + q, ikpt, ispin]] = acc;
                        }
                    }
                }
            }
        }
    }
    hamk
}

/// Emit the k-resolved Hamiltonian: header lines, then one `Re Im` pair per
/// line with the matrix row as the innermost index.
pub fn write_hamk<W: Write>(out: &mut W, hamk: &Array4<Complex64>) -> Result<(), PloError> {
    let (nproj, _, nkpt, nspin) = hamk.dim();
    writeln!(out, "# nproj: {nproj}")?;
    writeln!(out, "# nkpt : {nkpt}")?;
    writeln!(out, "# nspin: {nspin}")?;
    for ispin in 0..nspin {
        for ikpt in 0..nkpt {
            for q in 0..nproj {
                for p in 0..nproj {
                    let h = hamk[[p, q, ikpt, ispin]];
                    writeln!(out, "{:20.12} {:20.12}", h.re, h.im)?;
                }
            }
        }
    }
    Ok(())
}

/// Emit one group's partial DOS: header lines, then one mesh point per
/// line, spin outer and orbital inner.
pub fn write_dos<W: Write>(out: &mut W, pdos: &PartialDos) -> Result<(), PloError> {
    let (ndim, nspin, nmesh) = pdos.dos.dim();
    writeln!(out, "# nmesh: {nmesh}")?;
    writeln!(out, "# ndim : {ndim}")?;
    writeln!(out, "# nspin: {nspin}")?;
    for (m, &mesh) in pdos.mesh.iter().enumerate() {
        write!(out, "{mesh:16.8}")?;
        for ispin in 0..nspin {
            for q in 0..ndim {
                write!(out, " {:16.8}", pdos.dos[[q, ispin, m]])?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array3, Array4};
    use num_complex::Complex64;

    use crate::config::WindowValue;
    use crate::window::resolve_windows;

    use super::{density_matrix, full_hamiltonian, local_hamiltonian, overlap, write_hamk};

    fn fixture() -> (Array4<Complex64>, crate::window::ProjWindow, Array1<f64>, Array3<f64>) {
        let (ndim, nband, nkpt, nspin) = (2, 4, 3, 1);
        let enk = {
            let mut e = Array3::zeros((nband, nkpt, nspin));
            for ((b, k, _), v) in e.indexed_iter_mut() {
                *v = b as f64 * 0.8 + k as f64 * 0.05 - 1.0;
            }
            e
        };
        let pw = resolve_windows(
            &[WindowValue::Index(1), WindowValue::Index(nband as i64)],
            1,
            &enk.view(),
        )
        .unwrap()
        .remove(0);
        let mut proj = Array4::zeros((ndim, pw.nbnd, nkpt, nspin));
        for ((q, j, k, _), v) in proj.indexed_iter_mut() {
            *v = Complex64::new(
                1.0 / (1.0 + q as f64 + 2.0 * j as f64 + 0.3 * k as f64),
                0.2 * (q as f64 - j as f64),
            );
        }
        let weight = Array1::from_elem(nkpt, 1.0 / nkpt as f64);
        (proj, pw, weight, enk)
    }

    #[test]
    fn overlap_and_density_are_symmetric() {
        let (proj, pw, weight, enk) = fixture();
        let occupy = enk.mapv(|e| if e < 0.0 { 2.0 } else { 0.0 });

        let ovlp = overlap(&proj, &pw, &weight);
        let dm = density_matrix(&proj, &pw, &weight, &occupy, 2.0);
        for p in 0..2 {
            for q in 0..2 {
                assert_abs_diff_eq!(ovlp[[p, q, 0]], ovlp[[q, p, 0]], epsilon = 1e-12);
                assert_abs_diff_eq!(dm[[p, q, 0]], dm[[q, p, 0]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn local_hamiltonian_is_hermitian() {
        let (proj, pw, weight, enk) = fixture();
        let hloc = local_hamiltonian(&proj, &pw, &weight, &enk);
        for p in 0..2 {
            for q in 0..2 {
                let a = hloc[[p, q, 0]];
                let b = hloc[[q, p, 0]].conj();
                assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
                assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn density_trace_matches_weighted_occupation() {
        let (proj, pw, weight, enk) = fixture();
        let occupy = enk.mapv(|e| (1.0 - e).clamp(0.0, 2.0));
        let sigma = 2.0;
        let dm = density_matrix(&proj, &pw, &weight, &occupy, sigma);

        let trace: f64 = (0..2).map(|p| dm[[p, p, 0]]).sum();
        let mut expected = 0.0;
        for ikpt in 0..3 {
            let wk = weight[ikpt] / 3.0;
            let ib1 = pw.kwin[[ikpt, 0, 0]];
            for j in 0..pw.nbands_at(ikpt, 0) {
                let amp: f64 = (0..2).map(|q| proj[[q, j, ikpt, 0]].norm_sqr()).sum();
                expected += sigma * wk * occupy[[ib1 + j, ikpt, 0]] * amp;
            }
        }
        assert_abs_diff_eq!(trace, expected, epsilon = 1e-12);
    }

    #[test]
    fn full_hamiltonian_is_hermitian_per_slot() {
        let (proj, pw, _, enk) = fixture();
        let hamk = full_hamiltonian(std::slice::from_ref(&proj), &pw, &enk);
        assert_eq!(hamk.dim(), (2, 2, 3, 1));
        for ikpt in 0..3 {
            for p in 0..2 {
                for q in 0..2 {
                    let a = hamk[[p, q, ikpt, 0]];
                    let b = hamk[[q, p, ikpt, 0]].conj();
                    assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
                    assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn hamk_output_is_deterministic() {
        let (proj, pw, _, enk) = fixture();
        let hamk = full_hamiltonian(std::slice::from_ref(&proj), &pw, &enk);
        let mut first = Vec::new();
        let mut second = Vec::new();
        write_hamk(&mut first, &hamk).unwrap();
        write_hamk(&mut second, &hamk).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
        let header = String::from_utf8(first).unwrap();
        assert!(header.starts_with("# nproj: 2\n# nkpt : 3\n# nspin: 1\n"));
    }
}
