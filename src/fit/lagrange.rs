//! Iterative least-squares fit with Lagrange multipliers.
//!
//! Measured parameters `y` (with covariance `V`) and unmeasured parameters `a`
//! are adjusted until every constraint `f(y, a) = 0` is met, minimizing
//! `(y - y0)^T V^-1 (y - y0)`. Each iteration linearizes the constraints
//! around the current point, with `B = df/dy` and `A = df/da`:
//!
//! ```text
//! r      = f + B (y0 - y)
//! W_B    = (B V B^T)^-1
//! da     = -(A^T W_B A)^-1 A^T W_B r
//! lambda = W_B (r + A da)
//! y      = y0 - V B^T lambda
//! S      = lambda^T (B V B^T) lambda
//! ```
//!
//! Every mass constraint carries one extra measured parameter: a scale factor
//! `alpha` (Gaussian shape) or a unit-normal variable `mu` (Breit-Wigner shape)
//! which absorbs the natural width of the resonance.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use nalgebra::{DMatrix, DVector};
use statrs::function::erf::erfc;

use super::{ConstrainedSolver, ConstraintShape, FitInputs, MassConstraint, SolverOutput, SolverSettings, SolverStatus};
use crate::FourMomentum;

#[derive(Clone, Copy, Debug, Default)]
pub struct LagrangeSolver;

/// Where each of a particle's three parameters lives
#[derive(Clone, Copy, Debug)]
enum Slot { Measured(usize), Unmeasured(usize) }

struct Layout {
    slots: Vec<[Slot; 3]>,
    /// Number of measured particle parameters; constraint parameters follow them in `y`
    n_particle: usize,
    n_measured: usize,
    n_unmeasured: usize,
}

impl Layout {
    fn new(inputs: &FitInputs) -> Self {
        let (mut m, mut u) = (0, 0);
        let slots: Vec<[Slot; 3]> = inputs.particles.iter().map(|p| {
            let mut slot = |i: usize| if p.unmeasured[i] { u += 1; Slot::Unmeasured(u - 1) }
                                      else               { m += 1; Slot::Measured  (m - 1) };
            [slot(0), slot(1), slot(2)]
        }).collect();
        Self { slots, n_particle: m, n_measured: m + inputs.constraints.len(), n_unmeasured: u }
    }

    fn parameters(&self, y: &DVector<f64>, a: &DVector<f64>) -> Vec<[f64; 3]> {
        self.slots.iter().map(|slots| (*slots).map(|s| match s {
            Slot::Measured  (i) => y[i],
            Slot::Unmeasured(i) => a[i],
        })).collect()
    }
}

/// Auxiliary constraint parameter: starting value and variance
fn auxiliary(c: &MassConstraint) -> (f64, f64) {
    match c.shape {
        ConstraintShape::Gaussian    => (1.0, (c.width / c.mass).powi(2)),
        ConstraintShape::BreitWigner => (0.0, 1.0),
    }
}

fn normal_cdf(x: f64) -> f64 { 0.5 * erfc(-x * FRAC_1_SQRT_2) }
fn normal_pdf(x: f64) -> f64 { (-0.5 * x * x).exp() / (2.0 * PI).sqrt() }

fn breit_wigner_cdf(m: f64, m0: f64, width: f64) -> f64 { (2.0 * (m - m0) / width).atan() / PI + 0.5 }
fn breit_wigner_pdf(m: f64, m0: f64, width: f64) -> f64 {
    width / (2.0 * PI) / ((m - m0).powi(2) + 0.25 * width * width)
}

/// Constraint values and their derivatives at one point
struct Linearization {
    f: DVector<f64>,
    b: DMatrix<f64>,
    a: DMatrix<f64>,
}

impl Linearization {
    fn new(inputs: &FitInputs, layout: &Layout, y: &DVector<f64>, a: &DVector<f64>) -> Option<Self> {
        let nc = inputs.constraints.len();
        let params = layout.parameters(y, a);
        let mut f  = DVector::<f64>::zeros(nc);
        let mut bm = DMatrix::<f64>::zeros(nc, layout.n_measured);
        let mut am = DMatrix::<f64>::zeros(nc, layout.n_unmeasured);

        for (k, c) in inputs.constraints.iter().enumerate() {
            let total: FourMomentum = c.particles.iter()
                .map(|&i| inputs.particles[i].parameterization.momentum(&params[i], inputs.particles[i].mass))
                .sum();
            let m = total.m();
            if !(m > 0.0 && m.is_finite()) { return None }
            let aux = y[layout.n_particle + k];

            // df/dM and the constraint-parameter column
            let (value, df_dm, df_daux) = match c.shape {
                ConstraintShape::Gaussian    => (m - aux * c.mass, 1.0, -c.mass),
                ConstraintShape::BreitWigner => (breit_wigner_cdf(m, c.mass, c.width) - normal_cdf(aux),
                                                 breit_wigner_pdf(m, c.mass, c.width),
                                                 -normal_pdf(aux)),
            };
            f[k] = value;
            bm[(k, layout.n_particle + k)] = df_daux;

            for &i in &c.particles {
                let particle = &inputs.particles[i];
                let jac = particle.parameterization.jacobian(&params[i], particle.mass);
                for (j, d) in jac.iter().enumerate() {
                    let dm = (total.e * d[3] - total.px * d[0] - total.py * d[1] - total.pz * d[2]) / m;
                    match layout.slots[i][j] {
                        Slot::Measured  (s) => bm[(k, s)] += df_dm * dm,
                        Slot::Unmeasured(s) => am[(k, s)] += df_dm * dm,
                    }
                }
            }
        }
        let finite = f.iter().chain(bm.iter()).chain(am.iter()).all(|x| x.is_finite());
        finite.then_some(Self { f, b: bm, a: am })
    }
}

/// Outcome of one linearized step
struct Step {
    y: DVector<f64>,
    a: DVector<f64>,
    chi_square: f64,
    /// Covariance of the corrections `y - y0`
    correction_covariance: DMatrix<f64>,
}

fn step(lin: &Linearization, v: &DMatrix<f64>, y0: &DVector<f64>, y: &DVector<f64>, a: &DVector<f64>) -> Option<Step> {
    let Linearization { f, b, a: am } = lin;
    let r = f + b * (y0 - y);
    let vbt = v * b.transpose();
    let bvbt = b * &vbt;
    let chol = bvbt.cholesky()?;
    let wb = chol.inverse();

    let (da, projector) = if am.ncols() > 0 {
        let wba = &wb * am;
        let c = am.transpose() * &wba;
        let c_inv = c.cholesky()?.inverse();
        let da = -(&c_inv * wba.transpose() * &r);
        let projector = &wb - &wba * c_inv * wba.transpose();
        (da, projector)
    } else {
        (DVector::zeros(0), wb.clone())
    };

    let lambda = &wb * (&r + am * &da);
    let y = y0 - &vbt * &lambda;
    let a = a + da;
    let chi_square = (chol.l().transpose() * &lambda).norm_squared();
    let correction_covariance = &vbt * projector * vbt.transpose();

    let finite = y.iter().chain(a.iter()).all(|x| x.is_finite()) && chi_square.is_finite();
    finite.then_some(Step { y, a, chi_square, correction_covariance })
}

impl ConstrainedSolver for LagrangeSolver {
    fn solve(&self, inputs: &FitInputs, settings: &SolverSettings) -> SolverOutput {
        let layout = Layout::new(inputs);

        // Starting point and covariance of measured parameters
        let mut y0 = DVector::<f64>::zeros(layout.n_measured);
        let mut a  = DVector::<f64>::zeros(layout.n_unmeasured);
        let mut v  = DMatrix::<f64>::zeros(layout.n_measured, layout.n_measured);
        for (particle, slots) in inputs.particles.iter().zip(&layout.slots) {
            let params = particle.parameters();
            for (i, slot_i) in slots.iter().enumerate() {
                match *slot_i {
                    Slot::Unmeasured(s) => a[s] = params[i],
                    Slot::Measured(s) => {
                        y0[s] = params[i];
                        for (j, slot_j) in slots.iter().enumerate() {
                            if let Slot::Measured(t) = *slot_j { v[(s, t)] = particle.covariance[(i, j)] }
                        }
                    }
                }
            }
        }
        for (k, c) in inputs.constraints.iter().enumerate() {
            let (start, variance) = auxiliary(c);
            let s = layout.n_particle + k;
            y0[s] = start;
            v[(s, s)] = variance;
        }

        let n_particles = inputs.particles.len();
        let failure = |status, iterations, y: &DVector<f64>, a: &DVector<f64>, chi_square| SolverOutput {
            status, chi_square, iterations,
            parameters: layout.parameters(y, a),
            pulls: vec![[0.0; 3]; n_particles],
        };

        let mut y = y0.clone();
        let mut previous_s = 0.0;
        for iteration in 1..=settings.max_iterations {
            let Some(lin) = Linearization::new(inputs, &layout, &y, &a) else {
                return failure(SolverStatus::SingularMatrix, iteration, &y, &a, previous_s)
            };
            let Some(next) = step(&lin, &v, &y0, &y, &a) else {
                return failure(SolverStatus::SingularMatrix, iteration, &y, &a, previous_s)
            };
            let Some(after) = Linearization::new(inputs, &layout, &next.y, &next.a) else {
                return failure(SolverStatus::SingularMatrix, iteration, &next.y, &next.a, next.chi_square)
            };

            let sum_f: f64 = after.f.iter().map(|x| x.abs()).sum();
            let converged = (next.chi_square - previous_s).abs() < settings.max_delta_s && sum_f < settings.max_f;
            previous_s = next.chi_square;
            y = next.y;
            a = next.a;

            if converged {
                let pulls = pulls(&layout, &y, &y0, &v, &next.correction_covariance);
                return SolverOutput {
                    status: SolverStatus::Converged,
                    chi_square: next.chi_square,
                    iterations: iteration,
                    parameters: layout.parameters(&y, &a),
                    pulls,
                }
            }
        }
        failure(SolverStatus::NotConverged, settings.max_iterations, &y, &a, previous_s)
    }
}

/// `(y - y0) / sqrt(var(y - y0))`, zero for parameters the constraints cannot move
fn pulls(layout: &Layout, y: &DVector<f64>, y0: &DVector<f64>, v: &DMatrix<f64>, correction: &DMatrix<f64>) -> Vec<[f64; 3]> {
    let pull = |s: usize| {
        let variance = correction[(s, s)];
        if variance > 1e-10 * v[(s, s)] { (y[s] - y0[s]) / variance.sqrt() }
        else { 0.0 }
    };
    layout.slots.iter().map(|slots| (*slots).map(|s| match s {
        Slot::Measured  (s) => pull(s),
        Slot::Unmeasured(_) => 0.0,
    })).collect()
}
