//! Progression engine for the EVA Mirror onboarding flow.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  UI events   │────►│  Soul Seed   │────►│ Local store  │
//! │  (answers)   │     │  (feed fn)   │     │  (sqlite kv) │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                            │                     │
//!                            ▼                     ▼
//!                      ┌──────────────┐     ┌──────────────┐
//!                      │  Classifier  │     │ Remote sync  │
//!                      │  (HTTP port) │     │ (best-effort)│
//!                      └──────────────┘     └──────────────┘
//! ```
//!
//! The local store is the source of truth for a session; the remote
//! backend is an eventually-consistent mirror that never blocks or
//! rolls back a local write.

pub mod artifacts;
pub mod backoff;
pub mod classifier;
pub mod config;
pub mod logging;
pub mod profile;
pub mod sampling;
pub mod seed;
pub mod session;
pub mod store;
pub mod sync;
pub mod traits;

pub use artifacts::{draw_artifact, Artifact, Rarity};
pub use classifier::{Analysis, AnswerCategory, ClassifyRequest, HttpClassifier, TextClassifier};
pub use config::Config;
pub use profile::{Session, SocialProfile, UserProfile, VerifiedIdentity};
pub use seed::{FeedOutcome, SoulSeed, Vibe};
pub use session::{re_analyze_session, CancelToken, ReanalysisOutcome};
pub use store::{KvStore, MemoryStore, SqliteStore};
pub use sync::SyncAdapter;
pub use traits::{apply_text_to_traits, check_trait_unlock, Answer, TraitAxis, TraitVector};
