use serde::{Deserialize, Serialize};

/// The elementwise activation applied to every new hidden layer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFn {
    Identity,
    Sigmoid {
        amp: f32,
    },
    Tanh,
    #[default]
    HardTanh,
}
use ActFn::*;

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Sigmoid { amp }
    }

    pub fn f(&self, z: f32) -> f32 {
        match self {
            Identity => z,
            Sigmoid { amp } => amp / (1. + (-z).exp()),
            Tanh => z.tanh(),
            HardTanh => z.clamp(-1., 1.),
        }
    }
}
