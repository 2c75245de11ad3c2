//! Predictor-corrector tracing of the logit response correspondence.
//!
//! The tracer follows the curve F(x, lambda) = 0 from the centroid at
//! lambda = 0: a tangent predictor step, then a chord Newton corrector
//! against the QR factorization taken at the predicted point. Step length
//! adapts through a deceleration factor fed by the corrector's distance
//! and contraction rate; a step is rejected outright when either exceeds
//! its bound. Probabilities that decay below the coordinate threshold are
//! switched to logarithmic representation between steps.
//!
//! With observations supplied, a sign change of the likelihood's
//! directional derivative across a step brackets a local maximum. The
//! tracer saves its state, switches the step-length update to a secant
//! iteration on that derivative, and once the step collapses restores the
//! saved state and resumes ordinary tracing.

use anyhow::{bail, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::coords::CoordMap;
use crate::game::PayoffOracle;
use crate::linalg;
use crate::mle::Observations;
use crate::model;

/// Corrector convergence tolerance.
const CORRECTOR_TOL: f64 = 1.0e-4;
/// Maximal distance to the curve tolerated in a corrector step.
const MAX_DIST: f64 = 0.4;
/// Maximal contraction rate in the corrector.
const MAX_CONTRACTION: f64 = 0.6;
/// Perturbation to avoid cancellation when computing the contraction rate.
const CONTRACTION_ETA: f64 = 0.1;
/// Minimal step size; collapsing to this ends the trace (or pops MLE mode).
const MIN_STEP: f64 = 1.0e-5;

fn default_max_decel() -> f64 {
    1.1
}

fn default_first_step() -> f64 {
    0.03
}

fn default_max_lambda() -> f64 {
    1.0e6
}

fn default_full_graph() -> bool {
    true
}

/// User-tunable settings of a trace; the numerical tolerances above are
/// fixed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TraceSettings {
    /// Maximum deceleration (and acceleration) of the step size per step.
    #[serde(default = "default_max_decel")]
    pub max_decel: f64,
    /// Initial step size.
    #[serde(default = "default_first_step")]
    pub first_step: f64,
    /// The trace stops once lambda reaches this bound.
    #[serde(default = "default_max_lambda")]
    pub max_lambda: f64,
    /// Emit every accepted step (otherwise only a terminal record).
    #[serde(default = "default_full_graph")]
    pub full_graph: bool,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            max_decel: default_max_decel(),
            first_step: default_first_step(),
            max_lambda: default_max_lambda(),
            full_graph: default_full_graph(),
        }
    }
}

impl TraceSettings {
    fn validate(&self) -> Result<()> {
        if !(self.first_step > 0.0) || !self.first_step.is_finite() {
            bail!("Initial step size must be positive.");
        }
        if !(self.max_decel >= 1.0) {
            bail!("Maximum deceleration must be at least 1.");
        }
        if !(self.max_lambda > 0.0) {
            bail!("Maximum lambda must be positive.");
        }
        Ok(())
    }
}

/// A point emitted along the traced branch, decoded to plain
/// probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub lambda: f64,
    pub profile: Vec<f64>,
    /// Log-likelihood of the observations at this profile, when tracing
    /// in maximum-likelihood mode.
    pub log_like: Option<f64>,
    /// Set on the single record emitted after a terminal-only trace.
    pub terminal: bool,
}

/// Consumer of emitted records. The tracer calls this synchronously, one
/// record per accepted step.
pub trait ProfileSink {
    fn emit(&mut self, record: &TraceRecord) -> Result<()>;
}

impl ProfileSink for Vec<TraceRecord> {
    fn emit(&mut self, record: &TraceRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// State pushed on entry to the secant sub-mode and restored when it
/// finishes.
struct Saved {
    x: DVector<f64>,
    h: f64,
    coords: CoordMap,
}

/// A single tracer invocation: owns the state vector, coordinate policy,
/// tangent, and linear-algebra workspace. Nothing persists across
/// invocations.
pub struct Tracer<'a, O: PayoffOracle> {
    oracle: &'a O,
    settings: TraceSettings,
    observations: Option<&'a Observations>,
    len: usize,
    x: DVector<f64>,
    coords: CoordMap,
    tangent: DVector<f64>,
    omega: f64,
    h: f64,
    b: DMatrix<f64>,
    q: DMatrix<f64>,
    saved: Option<Saved>,
    restarting: bool,
}

/// Evaluates the transposed Jacobian at `point` and QR-factors it.
fn factor<O: PayoffOracle>(
    oracle: &O,
    coords: &CoordMap,
    point: &DVector<f64>,
    b: &mut DMatrix<f64>,
    q: &mut DMatrix<f64>,
) -> Result<()> {
    model::jacobian(oracle, coords, point, b);
    if b.iter().any(|v| !v.is_finite()) {
        bail!("Payoff oracle produced a non-finite Jacobian entry.");
    }
    linalg::qr_decomp(b, q);
    Ok(())
}

impl<'a, O: PayoffOracle> Tracer<'a, O> {
    pub fn new(
        oracle: &'a O,
        settings: TraceSettings,
        observations: Option<&'a Observations>,
    ) -> Result<Self> {
        settings.validate()?;
        let len = oracle.layout().profile_len();
        if let Some(obs) = observations {
            if obs.len() != len {
                bail!(
                    "Observation vector has {} entries, expected {}.",
                    obs.len(),
                    len
                );
            }
        }

        let profile = oracle.layout().centroid();
        let coords = CoordMap::for_profile(&profile);
        let mut x = DVector::zeros(len + 1);
        coords.encode(&profile, &mut x);

        Ok(Self {
            oracle,
            settings,
            observations,
            len,
            x,
            coords,
            tangent: DVector::zeros(len + 1),
            omega: 1.0,
            h: settings.first_step,
            b: DMatrix::zeros(len + 1, len),
            q: DMatrix::zeros(len + 1, len + 1),
            saved: None,
            restarting: false,
        })
    }

    fn lambda(&self) -> f64 {
        self.x[self.len]
    }

    fn emit<S: ProfileSink>(&self, sink: &mut S, terminal: bool) -> Result<()> {
        let profile = self.coords.probabilities(&self.x);
        let log_like = self.observations.map(|obs| obs.log_like(&profile));
        sink.emit(&TraceRecord {
            lambda: self.lambda(),
            profile,
            log_like,
            terminal,
        })
    }

    /// Restores the state saved on entry to the secant sub-mode. Returns
    /// false when there is nothing to pop and the trace is really over.
    fn pop(&mut self) -> Result<bool> {
        let Some(saved) = self.saved.take() else {
            return Ok(false);
        };
        self.x = saved.x;
        self.h = saved.h;
        self.coords = saved.coords;
        factor(self.oracle, &self.coords, &self.x, &mut self.b, &mut self.q)?;
        self.tangent.copy_from(&self.q.row(self.len).transpose());
        self.restarting = true;
        Ok(true)
    }

    pub fn run<S: ProfileSink>(&mut self, sink: &mut S) -> Result<()> {
        let len = self.len;
        factor(self.oracle, &self.coords, &self.x, &mut self.b, &mut self.q)?;
        self.tangent.copy_from(&self.q.row(len).transpose());

        if self.settings.full_graph {
            self.emit(sink, false)?;
        }

        let mut u = DVector::zeros(len + 1);
        let mut y = DVector::zeros(len);

        while self.lambda() >= 0.0 && self.lambda() < self.settings.max_lambda {
            if self.h.abs() <= MIN_STEP {
                if self.pop()? {
                    continue;
                }
                // Step size collapsed outside the secant sub-mode: the
                // curve has terminated.
                return Ok(());
            }

            // Predictor.
            for k in 0..=len {
                u[k] = self.x[k] + self.h * self.omega * self.tangent[k];
            }

            let mut decel = 1.0 / self.settings.max_decel;
            factor(self.oracle, &self.coords, &u, &mut self.b, &mut self.q)?;

            // Corrector: chord Newton against the factorization at the
            // predicted point.
            let mut accept = true;
            let mut iter = 1;
            let mut dist_prev = 0.0;
            loop {
                model::residual(self.oracle, &self.coords, &u, &mut y);
                if y.iter().any(|v| !v.is_finite()) {
                    // An overshooting predictor can leave a linear
                    // coordinate nonpositive; reject and decelerate.
                    accept = false;
                    break;
                }
                let dist = linalg::newton_step(&self.q, &self.b, &mut u, &mut y);
                if !(dist < MAX_DIST) {
                    accept = false;
                    break;
                }

                decel = decel.max((dist / MAX_DIST).sqrt() * self.settings.max_decel);
                if iter >= 2 {
                    let contraction = dist / (dist_prev + CORRECTOR_TOL * CONTRACTION_ETA);
                    if contraction > MAX_CONTRACTION {
                        accept = false;
                        break;
                    }
                    decel =
                        decel.max((contraction / MAX_CONTRACTION).sqrt() * self.settings.max_decel);
                }

                if dist <= CORRECTOR_TOL {
                    break;
                }
                dist_prev = dist;
                iter += 1;
            }

            if !accept {
                // Not accepted: decelerate and retry from the same point.
                self.h /= self.settings.max_decel;
                if self.h.abs() <= MIN_STEP {
                    if self.pop()? {
                        continue;
                    }
                    return Ok(());
                }
                continue;
            }

            decel = decel.min(self.settings.max_decel);

            // Tangent at the corrected point, read off the same
            // factorization the corrector used.
            let tangent_at_u = self.q.row(len).transpose();

            if let Some(obs) = self.observations {
                let dll_x = obs.dir_deriv(&self.coords, &self.x, &self.tangent);
                let dll_u = obs.dir_deriv(&self.coords, &u, &tangent_at_u);

                if self.saved.is_none() && !self.restarting && dll_x * dll_u < 0.0 {
                    // The likelihood's directional derivative changed sign
                    // inside this step: save the state and hunt the
                    // extremum with secant steps in h.
                    self.saved = Some(Saved {
                        x: self.x.clone(),
                        h: self.h,
                        coords: self.coords.clone(),
                    });
                }

                if self.saved.is_some() {
                    self.h *= -dll_u / (dll_u - dll_x);
                } else {
                    self.h = (self.h / decel).abs();
                }
            } else {
                self.h = (self.h / decel).abs();
            }

            self.restarting = false;

            // Commit and emit.
            self.x.copy_from(&u);
            if self.settings.full_graph {
                self.emit(sink, false)?;
            }

            if self.coords.rescan(&mut self.x) {
                factor(self.oracle, &self.coords, &self.x, &mut self.b, &mut self.q)?;
            }

            let new_tangent = self.q.row(len).transpose();
            if self.tangent.dot(&new_tangent) < 0.0 {
                // Bifurcation: jump over it and continue with reversed
                // orientation of traversal.
                // TODO: locate the branch point instead of stepping across.
                self.omega = -self.omega;
            }
            self.tangent.copy_from(&new_tangent);
        }

        if !self.settings.full_graph {
            self.emit(sink, true)?;
        }
        Ok(())
    }
}

/// Traces a branch of the correspondence from the centroid at lambda = 0,
/// emitting records into `sink`.
pub fn trace_path<O: PayoffOracle, S: ProfileSink>(
    oracle: &O,
    settings: TraceSettings,
    observations: Option<&Observations>,
    sink: &mut S,
) -> Result<()> {
    Tracer::new(oracle, settings, observations)?.run(sink)
}
