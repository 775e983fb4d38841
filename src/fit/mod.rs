//! Constrained kinematic fit of a handful of particles to mass hypotheses.
//!
//! `FitEngine` is the contract between the hypothesis search and a numerical
//! `ConstrainedSolver`: it checks the inputs, runs the solver and turns its raw
//! output into a `FitResult` with refit four-momenta and pulls per particle.

pub mod lagrange;

use std::fmt;

use nalgebra::{DMatrix, Matrix3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FourMomentum, Massf64};

pub use lagrange::LagrangeSolver;

/// What a particle represents in a decay hypothesis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role { Lepton, Neutrino, BJet, Jet1, Jet2 }

/// Three fit parameters describing a particle of known mass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parameterization {
    /// `(pt, eta, phi)`: charged leptons and jets
    PtEtaPhi,
    /// `(pt, theta, phi)`: the neutrino, whose polar angle is not measured
    PtThetaPhi,
}

impl Parameterization {

    pub fn parameters(self, p: &FourMomentum) -> [f64; 3] {
        match self {
            Self::PtEtaPhi   => [p.pt(), p.eta()  , p.phi()],
            Self::PtThetaPhi => [p.pt(), p.theta(), p.phi()],
        }
    }

    pub fn momentum(self, &[pt, angle, phi]: &[f64; 3], mass: Massf64) -> FourMomentum {
        match self {
            Self::PtEtaPhi   => FourMomentum::from_pt_eta_phi_m  (pt, angle, phi, mass),
            Self::PtThetaPhi => FourMomentum::from_pt_theta_phi_m(pt, angle, phi, mass),
        }
    }

    /// Derivatives of `(px, py, pz, E)` with respect to each parameter.
    pub fn jacobian(self, &[pt, angle, phi]: &[f64; 3], mass: Massf64) -> [[f64; 4]; 3] {
        let (sin_phi, cos_phi) = phi.sin_cos();
        let d_phi = [-pt * sin_phi, pt * cos_phi, 0.0, 0.0];
        match self {
            Self::PtEtaPhi => {
                let (sinh, cosh) = (angle.sinh(), angle.cosh());
                let p = pt * cosh;
                let e = (p * p + mass * mass).sqrt();
                [[cos_phi, sin_phi, sinh, pt * cosh * cosh / e],
                 [0.0, 0.0, pt * cosh, pt * pt * sinh * cosh / e],
                 d_phi]
            }
            Self::PtThetaPhi => {
                let (sin, cos) = angle.sin_cos();
                let p = pt / sin;
                let e = (p * p + mass * mass).sqrt();
                [[cos_phi, sin_phi, cos / sin, pt / (sin * sin * e)],
                 [0.0, 0.0, -pt / (sin * sin), -pt * pt * cos / (sin * sin * sin * e)],
                 d_phi]
            }
        }
    }
}

/// Functional form of a mass constraint
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintShape {
    /// `M = alpha M0` with `alpha` measured as `1 +- width/M0`
    #[default]
    Gaussian,
    /// Breit-Wigner cumulative of `M` equals the normal cumulative of a unit Gaussian variable
    BreitWigner,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FitParticle {
    pub role: Role,
    /// Starting (measured) momentum
    pub p: FourMomentum,
    pub mass: Massf64,
    pub parameterization: Parameterization,
    pub covariance: Matrix3<f64>,
    /// Parameters left free and excluded from the chi-square
    pub unmeasured: [bool; 3],
}

impl FitParticle {

    pub fn measured(role: Role, p: FourMomentum, mass: Massf64,
                    parameterization: Parameterization, covariance: Matrix3<f64>) -> Self {
        Self { role, p, mass, parameterization, covariance, unmeasured: [false; 3] }
    }

    pub fn with_unmeasured(mut self, parameter: usize) -> Self {
        self.unmeasured[parameter] = true;
        self
    }

    pub fn parameters(&self) -> [f64; 3] { self.parameterization.parameters(&self.p) }

    fn measured_indices(&self) -> Vec<usize> { (0..3).filter(|&i| !self.unmeasured[i]).collect() }

    /// Covariance restricted to the measured parameters
    pub fn measured_covariance(&self) -> DMatrix<f64> {
        let idx = self.measured_indices();
        DMatrix::from_fn(idx.len(), idx.len(), |r, c| self.covariance[(idx[r], idx[c])])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MassConstraint {
    pub name: &'static str,
    /// Indices into `FitInputs::particles`
    pub particles: Vec<usize>,
    pub mass: Massf64,
    pub width: Massf64,
    pub shape: ConstraintShape,
}

/// Everything needed for one fit. Built fresh for every jet combination.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FitInputs {
    pub particles: Vec<FitParticle>,
    pub constraints: Vec<MassConstraint>,
}

impl fmt::Display for FitInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.particles {
            let [a, b, c] = p.parameters();
            writeln!(f, "  {:?} {:?} ({a:.6}, {b:.6}, {c:.6}) mass {:.4} unmeasured {:?}",
                     p.role, p.parameterization, p.mass, p.unmeasured)?;
            for r in 0..3 {
                let row = p.covariance.row(r);
                writeln!(f, "      [{:>14.6e} {:>14.6e} {:>14.6e}]", row[0], row[1], row[2])?;
            }
        }
        for c in &self.constraints {
            let roles: Vec<_> = c.particles.iter().map(|&i| self.particles[i].role).collect();
            writeln!(f, "  constraint {} {:?} on {roles:?}: {:.3} +- {:.3}", c.name, c.shape, c.mass, c.width)?;
        }
        Ok(())
    }
}

/// Iteration budget and convergence tolerances
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverSettings {
    pub max_iterations: usize,
    pub max_delta_s: f64,
    pub max_f: f64,
}

impl Default for SolverSettings {
    fn default() -> Self { Self { max_iterations: 100, max_delta_s: 5e-5, max_f: 1e-4 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus { Converged, NotConverged, SingularMatrix }

/// Raw solver result, one entry per input particle in `parameters` and `pulls`
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOutput {
    pub status: SolverStatus,
    pub chi_square: f64,
    pub iterations: usize,
    pub parameters: Vec<[f64; 3]>,
    pub pulls: Vec<[f64; 3]>,
}

/// A numerical least-squares solver for mass-constrained fits
pub trait ConstrainedSolver {
    fn solve(&self, inputs: &FitInputs, settings: &SolverSettings) -> SolverOutput;
}

/// Inputs which cannot come from a sane event: abort the job
#[derive(Error, Debug)]
pub enum FitError {
    #[error("covariance of {role:?} is not positive definite; fit inputs:\n{dump}")]
    NonPositiveDefinite { role: Role, dump: String },

    #[error("solver returned negative chi-square {chi_square}; fit inputs:\n{dump}")]
    NegativeChiSquare { chi_square: f64, dump: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus { Converged, NotConverged, NumericFailure }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub status: FitStatus,
    pub chi_square: f64,
    pub ndof: usize,
    pub iterations: usize,
    pub refit: Vec<(Role, FourMomentum)>,
    /// `(pt, eta|theta, phi)` pulls; zero for unmeasured parameters
    pub pulls: Vec<(Role, [f64; 3])>,
}

impl FitResult {
    pub fn converged(&self) -> bool { self.status == FitStatus::Converged }

    pub fn refit(&self, role: Role) -> Option<FourMomentum> {
        self.refit.iter().find(|(r, _)| *r == role).map(|(_, p)| *p)
    }

    pub fn pull(&self, role: Role) -> Option<[f64; 3]> {
        self.pulls.iter().find(|(r, _)| *r == role).map(|(_, p)| *p)
    }

    /// Upper-tail chi-square probability
    pub fn probability(&self) -> f64 { crate::decision::chi2_prob(self.chi_square, self.ndof) }
}

/// Stateless adapter around a `ConstrainedSolver`
#[derive(Clone, Debug)]
pub struct FitEngine<S> {
    solver: S,
    settings: SolverSettings,
}

impl<S: ConstrainedSolver> FitEngine<S> {

    pub fn new(solver: S, settings: SolverSettings) -> Self { Self { solver, settings } }

    pub fn settings(&self) -> &SolverSettings { &self.settings }

    pub fn fit(&self, inputs: &FitInputs) -> Result<FitResult, FitError> {
        check_covariances(inputs)?;

        let out = self.solver.solve(inputs, &self.settings);
        if out.chi_square < 0.0 {
            let dump = inputs.to_string();
            log::error!("Negative chi-square {} from constrained fit:\n{dump}", out.chi_square);
            return Err(FitError::NegativeChiSquare { chi_square: out.chi_square, dump })
        }

        let status = match out.status {
            SolverStatus::Converged      => FitStatus::Converged,
            SolverStatus::NotConverged   => FitStatus::NotConverged,
            SolverStatus::SingularMatrix => FitStatus::NumericFailure,
        };

        let refit = inputs.particles.iter().zip(&out.parameters)
            .map(|(p, params)| (p.role, p.parameterization.momentum(params, p.mass)))
            .collect();

        let pulls = inputs.particles.iter().zip(&out.pulls)
            .map(|(p, &pull)| (p.role, pull))
            .collect();

        Ok(FitResult {
            status,
            chi_square: out.chi_square,
            ndof: inputs.constraints.len(),
            iterations: out.iterations,
            refit,
            pulls,
        })
    }
}

/// Every measured covariance block must be positive definite
fn check_covariances(inputs: &FitInputs) -> Result<(), FitError> {
    for p in &inputs.particles {
        let cov = p.measured_covariance();
        let finite = cov.iter().all(|x| x.is_finite());
        let symmetric = (0..cov.nrows()).all(|r| (0..r).all(|c| {
            let (a, b) = (cov[(r, c)], cov[(c, r)]);
            (a - b).abs() <= 1e-9 * (a.abs() + b.abs()).max(f64::MIN_POSITIVE)
        }));
        if !(finite && symmetric && cov.cholesky().is_some()) {
            let dump = inputs.to_string();
            log::error!("Covariance of {:?} is not positive definite:\n{dump}", p.role);
            return Err(FitError::NonPositiveDefinite { role: p.role, dump })
        }
    }
    Ok(())
}
