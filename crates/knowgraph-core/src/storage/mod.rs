//! Storage layer - graph repositories
//!
//! - `memory`: snapshot held in process memory
//! - `jsonl`: one JSONL file per record kind, git-friendly
//!
//! Both implement [`GraphRepository`](crate::domain::graph::GraphRepository).

pub mod jsonl;
pub mod memory;

pub use jsonl::{ENTITIES_FILE, JsonlGraphRepository, RELATIONS_FILE};
pub use memory::MemoryGraphRepository;
