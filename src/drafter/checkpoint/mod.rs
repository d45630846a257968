// SPDX-License-Identifier: MIT

//! Durable checkpoints for drafting runs
//!
//! This module provides:
//! - `CheckpointKey` - plain thread ids or structured run configs
//! - `Raw` / `Normalizer` - total JSON-safety normalization
//! - `CheckpointStore` - upsert/select with bounded exponential retry
//! - `MemoryBackend` / `SupabaseBackend` - where records live

mod backend;
mod key;
mod normalize;
mod store;
mod supabase;

pub use backend::{CheckpointBackend, MemoryBackend};
pub use key::{CheckpointKey, Configurable, RunConfig};
pub use normalize::{normalize, Normalizer, Raw, DEFAULT_MAX_DEPTH, DEPTH_MARKER};
pub use store::{CheckpointStore, Checkpointer, RetryPolicy};
pub use supabase::{SupabaseBackend, DEFAULT_TABLE};
