// Mamdani inference over two prosodic inputs and three hyperparameters
//
// Inputs:  x1 = tonal stable ratio [0, 1], x2 = energy CV [0, 2]
// Outputs: learning rate, hidden size, dropout (ranges from the search space)
// Operators: AND = min, implication = min, aggregation = max,
// centroid defuzzification on a 101-point universe.

use crate::config::HyperparameterSpace;
use serde::{Deserialize, Serialize};

/// Points in every discretized output universe
pub const UNIVERSE_POINTS: usize = 101;

/// Stable-ratio universe
pub const X1_RANGE: (f64, f64) = (0.0, 1.0);

/// Energy-CV universe
pub const X2_RANGE: (f64, f64) = (0.0, 2.0);

/// Margin keeping crisp inputs strictly inside their universe
pub const EDGE_NUDGE: f64 = 1e-6;

/// Triangular membership with vertices (a, b, c)
///
/// Degenerate shoulders (a == b or b == c) peak at 1 on the shared vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Triangle {
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    pub fn degree(&self, x: f64) -> f64 {
        if x == self.b {
            1.0
        } else if self.a < x && x < self.b {
            (x - self.a) / (self.b - self.a)
        } else if self.b < x && x < self.c {
            (self.c - x) / (self.c - self.b)
        } else {
            0.0
        }
    }
}

/// Linguistic term index shared by every variable (low/med/high)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Low,
    Med,
    High,
}

impl Term {
    fn index(self) -> usize {
        match self {
            Term::Low => 0,
            Term::Med => 1,
            Term::High => 2,
        }
    }
}

const X1_TERMS: [Triangle; 3] = [
    Triangle::new(0.0, 0.0, 0.4),
    Triangle::new(0.2, 0.5, 0.8),
    Triangle::new(0.6, 1.0, 1.0),
];

const X2_TERMS: [Triangle; 3] = [
    Triangle::new(0.0, 0.0, 0.6),
    Triangle::new(0.4, 0.9, 1.4),
    Triangle::new(1.2, 2.0, 2.0),
];

/// Consequents of one rule: (hidden_size, dropout, learning_rate)
///
/// Hidden size terms read small/medium/large; they map onto Low/Med/High.
struct Rule {
    x1: Term,
    x2: Term,
    hidden_size: Term,
    dropout: Term,
    learning_rate: Term,
}

const fn rule(x1: Term, x2: Term, hidden_size: Term, dropout: Term, learning_rate: Term) -> Rule {
    Rule {
        x1,
        x2,
        hidden_size,
        dropout,
        learning_rate,
    }
}

const RULES: [Rule; 9] = {
    use Term::{High, Low, Med};
    [
        rule(Low, Low, Med, Low, High),
        rule(Low, Med, Low, Med, Low),
        rule(Low, High, Low, High, Low),
        rule(Med, Low, Med, Low, Med),
        rule(Med, Med, Med, Med, Med),
        rule(Med, High, Low, High, Low),
        rule(High, Low, High, Low, Med),
        rule(High, Med, High, Med, High),
        rule(High, High, Med, Med, Low),
    ]
};

/// Crisp hyperparameter advice; `None` when no rule fired for an output
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub learning_rate: Option<f64>,
    pub hidden_size: Option<f64>,
    pub dropout: Option<f64>,
}

/// Output variable: three terms over [min, max]
struct OutputVariable {
    universe: Vec<f64>,
    terms: [Triangle; 3],
}

impl OutputVariable {
    fn new((min, max): (f64, f64)) -> Self {
        let mid = (min + max) / 2.0;
        let step = (max - min) / (UNIVERSE_POINTS - 1) as f64;
        Self {
            universe: (0..UNIVERSE_POINTS).map(|i| min + step * i as f64).collect(),
            terms: [
                Triangle::new(min, min, mid),
                Triangle::new(min, mid, max),
                Triangle::new(mid, max, max),
            ],
        }
    }

    /// Centroid of the max-aggregated, min-clipped consequents
    fn defuzzify(&self, activations: &[(Term, f64)]) -> Option<f64> {
        let mut weighted = 0.0;
        let mut total = 0.0;
        for &u in &self.universe {
            let mu = activations
                .iter()
                .map(|&(term, strength)| strength.min(self.terms[term.index()].degree(u)))
                .fold(0.0f64, f64::max);
            weighted += u * mu;
            total += mu;
        }
        (total > 0.0).then(|| weighted / total)
    }
}

/// Clip to `range` and keep the value `EDGE_NUDGE` away from both edges
pub fn nudge_into(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi).max(lo + EDGE_NUDGE).min(hi - EDGE_NUDGE)
}

/// Run the rule base on crisp inputs
///
/// Inputs are clipped and nudged into their universes before fuzzification.
pub fn recommend(x1: f64, x2: f64, space: &HyperparameterSpace) -> Recommendation {
    let x1 = nudge_into(if x1.is_nan() { 0.0 } else { x1 }, X1_RANGE);
    let x2 = nudge_into(if x2.is_nan() { 0.0 } else { x2 }, X2_RANGE);

    let mut hidden = Vec::with_capacity(RULES.len());
    let mut dropout = Vec::with_capacity(RULES.len());
    let mut learning_rate = Vec::with_capacity(RULES.len());
    for r in &RULES {
        let strength = X1_TERMS[r.x1.index()]
            .degree(x1)
            .min(X2_TERMS[r.x2.index()].degree(x2));
        if strength > 0.0 {
            hidden.push((r.hidden_size, strength));
            dropout.push((r.dropout, strength));
            learning_rate.push((r.learning_rate, strength));
        }
    }

    Recommendation {
        learning_rate: OutputVariable::new(space.learning_rate).defuzzify(&learning_rate),
        hidden_size: OutputVariable::new(space.hidden_size).defuzzify(&hidden),
        dropout: OutputVariable::new(space.dropout).defuzzify(&dropout),
    }
}
