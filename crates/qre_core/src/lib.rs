pub mod coords;
pub mod game;
pub mod linalg;
pub mod mle;
pub mod model;
/// The `qre_core` crate is the mathematical engine behind the `qretrace`
/// command-line tool. It follows a branch of the logit quantal response
/// correspondence of a finite normal-form game with a predictor-corrector
/// continuation method.
///
/// Key components:
/// - **LinAlg**: Givens-rotation QR for the tall transposed Jacobian and the
///   Newton corrector step on the factored system.
/// - **Game**: player-major profile layout and the two expected-payoff
///   queries the tracer consumes, behind the `PayoffOracle` trait.
/// - **Model**: the defining system F(x, lambda) = 0 and its Jacobian,
///   parameterized by a per-strategy linear/log coordinate policy.
/// - **Tracer**: the adaptive-step continuation loop, with optional
///   maximum-likelihood localization against observed play frequencies.
pub mod tracer;
