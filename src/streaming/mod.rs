//! Viewpoint-driven chunk streaming under a per-tick budget

pub mod budget;
pub mod priority;
pub mod scheduler;
pub mod window;

pub use budget::{BudgetTracker, ResolvedOptions, StreamingConfig, UpdateBudget, UpdateOptions};
pub use priority::{CreatePriority, CreateQueue, DestroyPriority, DestroyQueue, TIER_CORE, TIER_NORMAL};
pub use scheduler::{update_chunks, SkipReason, UpdateReport};
pub use window::{
    chunk_center, clamp_load_radius, compute_window, default_load_radius, StreamWindow,
    WindowSignature,
};
