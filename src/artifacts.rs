//! Cosmetic artifact rewards: a fixed template pool and a weighted
//! rarity draw. Artifacts are immutable once stamped.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sampling::categorical;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Legendary,
}

impl Rarity {
    /// Draw weights, summing to 100.
    pub const WEIGHTS: [(Rarity, u32); 4] = [
        (Rarity::Common, 70),
        (Rarity::Uncommon, 22),
        (Rarity::Rare, 7),
        (Rarity::Legendary, 1),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Legendary => "legendary",
        }
    }
}

/// A drawn reward instance. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: Uuid,
    pub name: String,
    pub rarity: Rarity,
    pub acquired_at: DateTime<Utc>,
    pub symbol: String,
}

struct ArtifactTemplate {
    name: &'static str,
    symbol: &'static str,
    rarity: Rarity,
}

const POOL: &[ArtifactTemplate] = &[
    ArtifactTemplate { name: "Dewdrop Lens", symbol: "💧", rarity: Rarity::Common },
    ArtifactTemplate { name: "Paper Crane", symbol: "🕊", rarity: Rarity::Common },
    ArtifactTemplate { name: "Smooth Pebble", symbol: "🪨", rarity: Rarity::Common },
    ArtifactTemplate { name: "Candle Stub", symbol: "🕯", rarity: Rarity::Common },
    ArtifactTemplate { name: "Pressed Leaf", symbol: "🍂", rarity: Rarity::Common },
    ArtifactTemplate { name: "Tuning Fork", symbol: "🎐", rarity: Rarity::Uncommon },
    ArtifactTemplate { name: "Moth Wing", symbol: "🦋", rarity: Rarity::Uncommon },
    ArtifactTemplate { name: "Static Shell", symbol: "🐚", rarity: Rarity::Uncommon },
    ArtifactTemplate { name: "Signal Prism", symbol: "🔮", rarity: Rarity::Rare },
    ArtifactTemplate { name: "Hollow Key", symbol: "🗝", rarity: Rarity::Rare },
    ArtifactTemplate { name: "Eclipse Fragment", symbol: "🌒", rarity: Rarity::Legendary },
    ArtifactTemplate { name: "First Mirror Shard", symbol: "🪞", rarity: Rarity::Legendary },
];

/// Draw one artifact: rarity by weighted draw, then a uniform pick within
/// the tier. A fresh id and timestamp are stamped on every draw, so the
/// same template can be drawn repeatedly as distinct instances.
pub fn draw_artifact<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> Artifact {
    let weights: Vec<u32> = Rarity::WEIGHTS.iter().map(|(_, w)| *w).collect();
    let rarity = Rarity::WEIGHTS[categorical(rng, &weights)].0;
    let tier: Vec<&ArtifactTemplate> = POOL.iter().filter(|t| t.rarity == rarity).collect();
    let template = tier[rng.gen_range(0..tier.len())];
    Artifact {
        id: Uuid::new_v4(),
        name: template.name.to_string(),
        rarity,
        acquired_at: now,
        symbol: template.symbol.to_string(),
    }
}
