//! End-to-end traces over small games with known correspondence shape.

use nalgebra::DVector;
use qre_core::coords::CoordMap;
use qre_core::game::{NormalFormGame, PayoffOracle};
use qre_core::mle::Observations;
use qre_core::model;
use qre_core::tracer::{trace_path, TraceRecord, TraceSettings};

/// 2x2 zero-sum matching pennies; the centroid is the equilibrium for
/// every lambda.
fn matching_pennies() -> NormalFormGame {
    NormalFormGame::new(
        "Matching pennies".to_string(),
        &[2, 2],
        vec![
            vec![1.0, -1.0, -1.0, 1.0],
            vec![-1.0, 1.0, 1.0, -1.0],
        ],
    )
    .expect("game should build")
}

/// Rock-paper-scissors; the symmetric third-each profile is the
/// equilibrium for every lambda.
fn rock_paper_scissors() -> NormalFormGame {
    // Contingency order: first player's strategy varies fastest.
    let p1 = vec![
        0.0, 1.0, -1.0, // vs R
        -1.0, 0.0, 1.0, // vs P
        1.0, -1.0, 0.0, // vs S
    ];
    let p2: Vec<f64> = p1.iter().map(|v| -v).collect();
    NormalFormGame::new("RPS".to_string(), &[3, 3], vec![p1, p2]).expect("game should build")
}

/// Asymmetric 2x2 coordination game; the branch from the centroid
/// converges to the (A, A) equilibrium as lambda grows, driving the B
/// probabilities into logarithmic representation.
fn coordination() -> NormalFormGame {
    NormalFormGame::new(
        "Coordination".to_string(),
        &[2, 2],
        vec![
            vec![2.0, 0.0, 0.0, 1.0],
            vec![2.0, 0.0, 0.0, 1.0],
        ],
    )
    .expect("game should build")
}

/// Both players have a strictly dominant first strategy worth 2 against 0,
/// so each player's logit response is the closed form 1 / (1 + e^(-2 lambda))
/// independent of the opponent.
fn dominant_strategy_game() -> NormalFormGame {
    NormalFormGame::new(
        "Dominance".to_string(),
        &[2, 2],
        vec![
            vec![2.0, 0.0, 2.0, 0.0],
            vec![2.0, 2.0, 0.0, 0.0],
        ],
    )
    .expect("game should build")
}

/// Reconstructs the defining-system residual at an emitted record and
/// returns its infinity norm.
fn residual_inf_norm(game: &NormalFormGame, record: &TraceRecord) -> f64 {
    let len = game.layout().profile_len();
    let coords = CoordMap::for_profile(&record.profile);
    let mut x = DVector::zeros(len + 1);
    coords.encode(&record.profile, &mut x);
    x[len] = record.lambda;

    let mut out = DVector::zeros(len);
    model::residual(game, &coords, &x, &mut out);
    out.amax()
}

/// Every record must be on the curve (to 10x the corrector tolerance)
/// with per-player simplex sums intact.
fn assert_record_invariants(game: &NormalFormGame, records: &[TraceRecord]) {
    let layout = game.layout();
    for (i, record) in records.iter().enumerate() {
        assert!(
            record.profile.iter().all(|p| p.is_finite() && *p > 0.0),
            "record {} has a non-positive probability: {:?}",
            i,
            record.profile
        );
        for pl in 0..layout.num_players() {
            let sum: f64 = (0..layout.num_strategies(pl))
                .map(|st| record.profile[layout.index(pl, st)])
                .sum();
            assert!(
                (sum - 1.0).abs() <= 1.0e-3,
                "record {} player {} sums to {}",
                i,
                pl,
                sum
            );
        }
        let residual = residual_inf_norm(game, record);
        assert!(
            residual <= 1.0e-3,
            "record {} off the curve: |F|_inf = {}",
            i,
            residual
        );
    }
}

fn assert_lambda_monotone(records: &[TraceRecord]) {
    for pair in records.windows(2) {
        assert!(
            pair[1].lambda >= pair[0].lambda,
            "lambda decreased from {} to {}",
            pair[0].lambda,
            pair[1].lambda
        );
    }
}

#[test]
fn test_matching_pennies_stays_at_centroid() {
    let game = matching_pennies();
    let settings = TraceSettings {
        max_lambda: 100.0,
        ..TraceSettings::default()
    };
    let mut records: Vec<TraceRecord> = Vec::new();
    trace_path(&game, settings, None, &mut records).expect("trace should succeed");

    assert!(records.len() > 10);
    assert_eq!(records[0].lambda, 0.0);
    for record in &records {
        for p in &record.profile {
            assert!(
                (p - 0.5).abs() < 1e-8,
                "profile left the centroid at lambda {}: {:?}",
                record.lambda,
                record.profile
            );
        }
    }
    assert_lambda_monotone(&records);
    assert!(records.last().expect("records").lambda >= 100.0);
    assert_record_invariants(&game, &records);
}

#[test]
fn test_rock_paper_scissors_keeps_symmetry() {
    let game = rock_paper_scissors();
    let settings = TraceSettings {
        max_lambda: 10.0,
        ..TraceSettings::default()
    };
    let mut records: Vec<TraceRecord> = Vec::new();
    trace_path(&game, settings, None, &mut records).expect("trace should succeed");

    let third = 1.0 / 3.0;
    for record in &records {
        for p in &record.profile {
            assert!(
                (p - third).abs() < 1e-8,
                "profile left the symmetric point at lambda {}: {:?}",
                record.lambda,
                record.profile
            );
        }
    }
    assert_lambda_monotone(&records);
    assert_record_invariants(&game, &records);
}

#[test]
fn test_coordination_branch_reaches_pure_equilibrium() {
    let game = coordination();
    let settings = TraceSettings {
        max_lambda: 50.0,
        ..TraceSettings::default()
    };
    let mut records: Vec<TraceRecord> = Vec::new();
    trace_path(&game, settings, None, &mut records).expect("trace should succeed");

    assert!(records.len() > 10);
    assert_record_invariants(&game, &records);
    assert_lambda_monotone(&records);

    let last = records.last().expect("records");
    assert!(last.lambda >= 50.0);
    // Both players concentrate on the payoff-dominant strategy; the B
    // probabilities decay exponentially, exercising the log coordinates.
    let layout = game.layout();
    for pl in 0..2 {
        assert!(
            last.profile[layout.index(pl, 0)] > 0.999,
            "player {} did not converge: {:?}",
            pl,
            last.profile
        );
        assert!(
            last.profile[layout.index(pl, 1)] < 1.0e-3,
            "player {} B probability should be tiny: {:?}",
            pl,
            last.profile
        );
    }
}

#[test]
fn test_dominant_strategy_matches_closed_form() {
    let game = dominant_strategy_game();
    let settings = TraceSettings {
        max_lambda: 50.0,
        ..TraceSettings::default()
    };
    let mut records: Vec<TraceRecord> = Vec::new();
    trace_path(&game, settings, None, &mut records).expect("trace should succeed");

    assert_lambda_monotone(&records);
    assert_record_invariants(&game, &records);

    let layout = game.layout();
    for record in &records {
        let expected = 1.0 / (1.0 + (-2.0 * record.lambda).exp());
        for pl in 0..2 {
            let got = record.profile[layout.index(pl, 0)];
            assert!(
                (got - expected).abs() < 1.0e-3,
                "player {} at lambda {}: got {}, closed form {}",
                pl,
                record.lambda,
                got,
                expected
            );
        }
    }
}

#[test]
fn test_mle_localizes_observed_profile() {
    // Observations equal to the lambda = 1 point of the correspondence:
    // p = 1 / (1 + e^-2) for the dominant strategy of each player.
    let game = dominant_strategy_game();
    let p = 1.0 / (1.0 + (-2.0f64).exp());
    let obs = Observations::new(vec![p, 1.0 - p, p, 1.0 - p]);

    let settings = TraceSettings {
        max_lambda: 5.0,
        ..TraceSettings::default()
    };
    let mut records: Vec<TraceRecord> = Vec::new();
    trace_path(&game, settings, Some(&obs), &mut records).expect("trace should succeed");

    let target = [p, 1.0 - p, p, 1.0 - p];
    let closest = records
        .iter()
        .map(|record| {
            record
                .profile
                .iter()
                .zip(target.iter())
                .map(|(got, want)| (got - want).abs())
                .fold(0.0f64, f64::max)
        })
        .fold(f64::INFINITY, f64::min);
    assert!(
        closest <= 1.0e-3,
        "no record within tolerance of the observed profile: closest {}",
        closest
    );

    // Tracing resumes after the extremum and runs out to the lambda bound.
    assert!(records.last().expect("records").lambda >= 5.0);

    // Log-likelihood is reported and peaks in the interior of the trace.
    assert!(records.iter().all(|r| r.log_like.is_some()));
    let (best, _) = records
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.log_like
                .expect("log-likelihood")
                .total_cmp(&b.log_like.expect("log-likelihood"))
        })
        .expect("records");
    assert!(best > 0 && best < records.len() - 1);
}
