//! Built-in test problems.

use anyhow::{bail, Result};
use nalgebra::DVector;
use nmsearch::prelude::*;

pub type Objective = fn(&DVector<f64>) -> Result<Vec<f64>, BlackboxError>;

/// A blackbox together with its starting point and variable layout.
pub struct Problem {
    pub name: &'static str,
    pub x0: DVector<f64>,
    pub vars: Variables,
    pub types: Vec<OutputType>,
    pub blackbox: Objective,
}

pub const NAMES: [&str; 4] = ["sphere", "rosenbrock", "constrained", "crash"];

/// `sum (x_i - 1)^2`.
fn sphere(x: &DVector<f64>) -> Result<Vec<f64>, BlackboxError> {
    Ok(vec![x.iter().map(|v| (v - 1.0).powi(2)).sum()])
}

fn rosenbrock(x: &DVector<f64>) -> Result<Vec<f64>, BlackboxError> {
    let f = x
        .as_slice()
        .windows(2)
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum();
    Ok(vec![f])
}

/// `min |x|^2` subject to `sum x_i >= 1` (progressive barrier).
fn constrained(x: &DVector<f64>) -> Result<Vec<f64>, BlackboxError> {
    Ok(vec![x.norm_squared(), 1.0 - x.sum()])
}

/// Sphere that fails below `x_0 = -0.5`.
fn crash(x: &DVector<f64>) -> Result<Vec<f64>, BlackboxError> {
    if x[0] < -0.5 {
        return Err(BlackboxError::new(format!("x0 = {} is outside the domain", x[0])));
    }
    sphere(x)
}

pub fn problem(name: &str, dim: usize) -> Result<Problem> {
    if dim == 0 {
        bail!("dimension must be positive");
    }
    let objective = vec![OutputType::Objective];
    let p = match name {
        "sphere" => Problem {
            name: "sphere",
            x0: DVector::zeros(dim),
            vars: Variables::free(dim),
            types: objective,
            blackbox: sphere,
        },
        "rosenbrock" => {
            if dim < 2 {
                bail!("rosenbrock needs at least 2 variables");
            }
            Problem {
                name: "rosenbrock",
                x0: DVector::from_fn(dim, |i, _| if i % 2 == 0 { -1.2 } else { 1.0 }),
                vars: Variables::free(dim),
                types: objective,
                blackbox: rosenbrock,
            }
        }
        "constrained" => Problem {
            name: "constrained",
            x0: DVector::zeros(dim),
            vars: Variables::free(dim).with_bounds(
                DVector::from_element(dim, -5.0),
                DVector::from_element(dim, 5.0),
            ),
            types: vec![OutputType::Objective, OutputType::ProgressiveBarrier],
            blackbox: constrained,
        },
        "crash" => Problem {
            name: "crash",
            x0: DVector::zeros(dim),
            vars: Variables::free(dim),
            types: objective,
            blackbox: crash,
        },
        other => bail!("unknown problem {other:?}; expected one of {NAMES:?}"),
    };
    Ok(p)
}
