//! Post-processing accept/reject policy, applied exactly once per fully
//! persisted profile.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Like,
    Pass,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionStrategy {
    /// Likes are rate-limited server-side; use sparingly.
    AlwaysLike,
    AlwaysPass,
    CoinFlip { probability: f64 },
}

impl DecisionStrategy {
    /// Build from the config surface: "like", "pass", or "coinflip".
    pub fn from_name(name: &str, like_probability: f64) -> anyhow::Result<Self> {
        match name {
            "like" => Ok(Self::AlwaysLike),
            "pass" | "nope" => Ok(Self::AlwaysPass),
            "coinflip" => Ok(Self::CoinFlip {
                probability: like_probability.clamp(0.0, 1.0),
            }),
            other => anyhow::bail!(
                "unknown decision strategy '{}' (expected like, pass, or coinflip)",
                other
            ),
        }
    }

    pub fn decide(&self) -> Decision {
        match self {
            Self::AlwaysLike => Decision::Like,
            Self::AlwaysPass => Decision::Pass,
            Self::CoinFlip { probability } => {
                if rand::rng().random_bool(*probability) {
                    Decision::Like
                } else {
                    Decision::Pass
                }
            }
        }
    }
}
