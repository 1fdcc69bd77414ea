//! Search configuration.
//!
//! Defaults follow the usual MADS Nelder-Mead coefficients: `gamma = 0.5`,
//! `delta_e = 2`, `delta_oc = delta_ic = 0.5`. Coefficients are stored as
//! positive magnitudes; inside contraction is applied with `-delta_ic`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::order::{DominanceOrder, TieBreak};
use crate::simplex::PartitionPolicy;

/// Nelder-Mead search configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmCfg {
    /// Shrink factor, in (0, 1).
    pub gamma: f64,
    /// Expansion coefficient, > 1.
    pub delta_e: f64,
    /// Outside-contraction coefficient, in (0, 1).
    pub delta_oc: f64,
    /// Inside-contraction magnitude, in (0, 1).
    pub delta_ic: f64,
    /// Shrink inside the search instead of raising `SHRINK_REQUEST`.
    pub perform_shrink: bool,
    pub project_to_mesh: bool,
    pub h_min: f64,
    pub tie_break: TieBreak,
    /// Seeding radius for `INITIAL`, in frame sizes.
    pub include_factor: f64,
    /// Trial-point budget per call, in multiples of `n_free`.
    pub max_trial_pts_nfactor: usize,
    /// Relative singular-value threshold for the simplex rank.
    pub rank_eps: f64,
    /// Minimum normalized volume.
    pub min_simplex_vol: f64,
    /// `TOO_SMALL_SIMPLEX` fires when the diameter drops below this times the
    /// smallest free mesh size.
    pub min_diameter_ratio: f64,
    /// Number of vertices a trial point must dominate to be accepted on
    /// partial dominance.
    pub accept_threshold: usize,
    pub partition: PartitionPolicy,
    /// Stop after the first call-level full success.
    pub opportunistic: bool,
    /// Maximum number of simplex updates per call; `None` runs until another
    /// stop fires.
    pub max_iterations: Option<usize>,
    /// Restart the next call from the final simplex of this one.
    pub carry_simplex: bool,
    /// When the cache holds too few usable points, complete the initial
    /// simplex with new points one frame size away along the free axes.
    pub seed_new_points: bool,
}

impl Default for NmCfg {
    fn default() -> Self {
        Self {
            gamma: 0.5,
            delta_e: 2.0,
            delta_oc: 0.5,
            delta_ic: 0.5,
            perform_shrink: false,
            project_to_mesh: true,
            h_min: 0.0,
            tie_break: TieBreak::OlderFirst,
            include_factor: 8.0,
            max_trial_pts_nfactor: 80,
            rank_eps: 0.01,
            min_simplex_vol: 1e-12,
            min_diameter_ratio: 1.0,
            accept_threshold: 2,
            partition: PartitionPolicy::Dominance,
            opportunistic: false,
            max_iterations: None,
            carry_simplex: false,
            seed_new_points: false,
        }
    }
}

impl NmCfg {
    /// Standalone ("intensive") variant: shrinks itself and works off-mesh.
    pub fn intensive() -> Self {
        Self {
            perform_shrink: true,
            project_to_mesh: false,
            ..Self::default()
        }
    }

    #[inline]
    pub fn order(&self) -> DominanceOrder {
        DominanceOrder::new(self.h_min, self.tie_break)
    }

    /// Trial-point budget for a problem with `n_free` free variables.
    #[inline]
    pub fn budget(&self, n_free: usize) -> usize {
        self.max_trial_pts_nfactor.saturating_mul(n_free)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let open_unit = |name: &'static str, value: f64| {
            if value > 0.0 && value < 1.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidParameter { name, value })
            }
        };
        open_unit("gamma", self.gamma)?;
        open_unit("delta_oc", self.delta_oc)?;
        open_unit("delta_ic", self.delta_ic)?;
        if !(self.delta_e > 1.0 && self.delta_e.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "delta_e",
                value: self.delta_e,
            });
        }
        let non_negative = [
            ("h_min", self.h_min),
            ("include_factor", self.include_factor),
            ("rank_eps", self.rank_eps),
            ("min_simplex_vol", self.min_simplex_vol),
            ("min_diameter_ratio", self.min_diameter_ratio),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        if self.accept_threshold == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "accept_threshold",
                value: 0.0,
            });
        }
        if self.max_trial_pts_nfactor == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_trial_pts_nfactor",
                value: 0.0,
            });
        }
        Ok(())
    }
}
