//! Target model blending and its round cadence.
//!
//! # Soft Updates (Polyak Averaging)
//!
//! ```text
//! θ_target = τ * θ_online + (1 - τ) * θ_target
//! ```
//!
//! `τ = 1` replaces the target with the online weights, `τ = 0` leaves it
//! untouched. The trainer decides *when* to blend through
//! [`TargetUpdateSchedule`]; the agent owning the models decides *how*.

use burn::module::{Module, ModuleMapper, Param};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Collects every float parameter of a module, flattened to 1D.
///
/// Traversal order is deterministic for a given architecture, so two modules
/// built from the same config yield parameters in matching order.
struct ParamCollector<B: Backend> {
    params: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for ParamCollector<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let numel: usize = val.dims().iter().product();
        self.params.push(val.reshape([numel]));
        param
    }
}

/// Blends each target parameter with the online parameter at the same traversal index.
struct PolyakMapper<B: Backend> {
    online: Vec<Tensor<B, 1>>,
    tau: f32,
    next: usize,
}

impl<B: Backend> ModuleMapper<B> for PolyakMapper<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let idx = self.next;
        self.next += 1;

        let Some(online) = self.online.get(idx) else {
            log::warn!("Soft update: target has more parameters than online model, keeping #{}", idx);
            return param;
        };

        let target = param.val();
        let shape = target.dims();
        let numel: usize = shape.iter().product();
        let blended = online.clone().mul_scalar(self.tau)
            + target.reshape([numel]).mul_scalar(1.0 - self.tau);

        Param::initialized(param.id.clone(), blended.reshape(shape))
    }
}

/// Polyak-average `online` into `target`, returning the updated target.
///
/// Parameters are matched by traversal order, not by id, so the two modules
/// may be independently initialized as long as they share an architecture.
pub fn soft_update<B, M>(online: &M, target: M, tau: f32) -> M
where
    B: Backend,
    M: Module<B>,
{
    let tau = tau.clamp(0.0, 1.0);
    if (tau - 1.0).abs() < 1e-6 {
        return online.clone();
    }
    if tau.abs() < 1e-6 {
        return target;
    }

    let mut collector = ParamCollector { params: Vec::new() };
    let _ = online.clone().map(&mut collector);

    let mut mapper = PolyakMapper {
        online: collector.params,
        tau,
        next: 0,
    };
    target.map(&mut mapper)
}

/// Cadence that decides when the target model is blended.
///
/// The schedule holds no counter of its own: the caller passes the number of
/// the round that just trained, and [`is_due`](Self::is_due) answers `true`
/// exactly when that number is a multiple of `frequency`. Over R rounds it
/// fires `R / frequency` times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetUpdateSchedule {
    frequency: usize,
    tau: f32,
}

impl TargetUpdateSchedule {
    /// Create a schedule.
    ///
    /// # Panics
    ///
    /// Panics if `frequency` is 0 or `tau` is outside `[0, 1]`. Use
    /// [`TrainerConfig::validate`](crate::trainer::TrainerConfig::validate) to
    /// check user input first.
    pub fn new(frequency: usize, tau: f32) -> Self {
        assert!(frequency > 0, "target_update_frequency must be > 0");
        assert!((0.0..=1.0).contains(&tau), "tau must be within [0, 1]");
        Self { frequency, tau }
    }

    /// Whether completing round number `round` (1-based) triggers an update.
    pub fn is_due(&self, round: u64) -> bool {
        round > 0 && round % self.frequency as u64 == 0
    }

    pub fn frequency(&self) -> usize {
        self.frequency
    }

    pub fn tau(&self) -> f32 {
        self.tau
    }
}
