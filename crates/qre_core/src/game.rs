//! Finite normal-form games and the expected-payoff queries consumed by
//! the tracer.
//!
//! The tracer never touches a game representation directly; it sees only
//! the `PayoffOracle` trait, which exposes the player-major layout of the
//! flat profile vector and the two payoff derivatives the defining system
//! needs.

use anyhow::{bail, Result};

/// Player-major layout of a flat mixed-profile vector: which span of
/// indices belongs to which player, and where each (player, strategy)
/// pair lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLayout {
    counts: Vec<usize>,
    offsets: Vec<usize>,
    len: usize,
}

impl ProfileLayout {
    pub fn new(counts: &[usize]) -> Result<Self> {
        if counts.is_empty() {
            bail!("A game must have at least one player.");
        }
        if counts.iter().any(|&m| m == 0) {
            bail!("Every player must have at least one strategy.");
        }

        let mut offsets = Vec::with_capacity(counts.len());
        let mut len = 0;
        for &m in counts {
            offsets.push(len);
            len += m;
        }

        Ok(Self {
            counts: counts.to_vec(),
            offsets,
            len,
        })
    }

    pub fn num_players(&self) -> usize {
        self.counts.len()
    }

    pub fn num_strategies(&self, pl: usize) -> usize {
        self.counts[pl]
    }

    /// Flat index of strategy `st` of player `pl`.
    pub fn index(&self, pl: usize, st: usize) -> usize {
        self.offsets[pl] + st
    }

    /// Total profile length, the sum of all strategy counts.
    pub fn profile_len(&self) -> usize {
        self.len
    }

    /// The uniform profile: every strategy of player `pl` gets weight
    /// 1 / num_strategies(pl).
    pub fn centroid(&self) -> Vec<f64> {
        let mut profile = Vec::with_capacity(self.len);
        for &m in &self.counts {
            profile.extend(std::iter::repeat(1.0 / m as f64).take(m));
        }
        profile
    }
}

/// Expected-payoff interface of a finite normal-form game.
///
/// `profile` is a flat vector laid out per `layout()`. Both queries are
/// read-only and must be deterministic; the tracer assumes identical
/// inputs always produce identical outputs.
pub trait PayoffOracle {
    fn layout(&self) -> &ProfileLayout;

    /// Expected payoff to player `pl` for playing pure strategy `st`
    /// while everyone else follows the mixed play in `profile`.
    fn payoff(&self, pl: usize, st: usize, profile: &[f64]) -> f64;

    /// Derivative of `payoff(pl, st, ..)` with respect to the profile
    /// entry (pl2, st2), for `pl2 != pl`: the expected payoff to `pl`
    /// with both pure strategies pinned.
    fn payoff_deriv(&self, pl: usize, st: usize, pl2: usize, st2: usize, profile: &[f64]) -> f64;
}

/// Dense payoff-table game. Payoffs are stored per player, indexed by
/// contingency (one pure strategy per player, first player's strategy
/// varying fastest).
#[derive(Debug, Clone)]
pub struct NormalFormGame {
    layout: ProfileLayout,
    title: String,
    strides: Vec<usize>,
    num_contingencies: usize,
    payoffs: Vec<Vec<f64>>,
}

impl NormalFormGame {
    pub fn new(title: String, counts: &[usize], payoffs: Vec<Vec<f64>>) -> Result<Self> {
        let layout = ProfileLayout::new(counts)?;

        let mut strides = Vec::with_capacity(counts.len());
        let mut num_contingencies = 1usize;
        for &m in counts {
            strides.push(num_contingencies);
            num_contingencies *= m;
        }

        if payoffs.len() != counts.len() {
            bail!(
                "Expected one payoff table per player, got {} tables for {} players.",
                payoffs.len(),
                counts.len()
            );
        }
        for (pl, table) in payoffs.iter().enumerate() {
            if table.len() != num_contingencies {
                bail!(
                    "Payoff table for player {} has {} entries, expected {}.",
                    pl + 1,
                    table.len(),
                    num_contingencies
                );
            }
        }

        Ok(Self {
            layout,
            title,
            strides,
            num_contingencies,
            payoffs,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Pure strategy of player `pl` in contingency `c`.
    fn strategy_at(&self, c: usize, pl: usize) -> usize {
        (c / self.strides[pl]) % self.layout.num_strategies(pl)
    }
}

impl PayoffOracle for NormalFormGame {
    fn layout(&self) -> &ProfileLayout {
        &self.layout
    }

    fn payoff(&self, pl: usize, st: usize, profile: &[f64]) -> f64 {
        let mut total = 0.0;
        for c in 0..self.num_contingencies {
            if self.strategy_at(c, pl) != st {
                continue;
            }
            let mut weight = 1.0;
            for j in 0..self.layout.num_players() {
                if j == pl {
                    continue;
                }
                weight *= profile[self.layout.index(j, self.strategy_at(c, j))];
            }
            total += weight * self.payoffs[pl][c];
        }
        total
    }

    fn payoff_deriv(&self, pl: usize, st: usize, pl2: usize, st2: usize, profile: &[f64]) -> f64 {
        let mut total = 0.0;
        for c in 0..self.num_contingencies {
            if self.strategy_at(c, pl) != st || self.strategy_at(c, pl2) != st2 {
                continue;
            }
            let mut weight = 1.0;
            for j in 0..self.layout.num_players() {
                if j == pl || j == pl2 {
                    continue;
                }
                weight *= profile[self.layout.index(j, self.strategy_at(c, j))];
            }
            total += weight * self.payoffs[pl][c];
        }
        total
    }
}
