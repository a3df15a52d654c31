#![warn(missing_docs)]
#![allow(dead_code)]
//! Projection on localized orbitals.
//!
//! Transforms raw projector amplitudes from a plane-wave DFT engine into an
//! orthonormal, site-local basis for the correlated subspace, plus the
//! optional construction-quality diagnostics the downstream engine wants to
//! see: overlap and density matrices, local and k-resolved Hamiltonians and
//! the tetrahedron partial density of states.

/// Kohn-Sham inputs, shells, projector metadata
pub mod fundamental;

/// Pipeline configuration from the driver's TOML section
pub mod config;

/// The fatal error kinds of the pipeline
pub mod error;

/// Merge the configuration into the raw projector groups
pub mod groups;

/// Band and energy windows, resolved per k-point and spin
pub mod window;

/// Rotation into the group sub-bases and window filtering
pub mod projection;

/// Löwdin orthonormalisation
pub mod lowdin;

/// Overlap, density matrix, local and k-resolved Hamiltonians
pub mod diagnostics;

/// Analytic-tetrahedron integration and the partial DOS
pub mod tetra;

/// The pipeline over all of the above
pub mod pipeline;
