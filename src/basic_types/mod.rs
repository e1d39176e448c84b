//! Small building blocks shared by [`crate::engine`] and [`crate::propagators`]: the trail, keyed
//! vectors, the error taxonomy of spec.md §7, and an `fnv`-backed [`HashMap`] alias.

mod error;
mod keyed_vec;
mod trail;

pub use error::EmptyDomain;
pub use error::PropagationStatusCP;
pub use error::ResourceConstraintError;
pub use keyed_vec::KeyedVec;
pub use keyed_vec::StorageKey;
pub use trail::Trail;
pub use trail::Trailed;

/// A fast, non-cryptographic hash map, matching the teacher crate's use of `fnv` for the many
/// small maps inside the domain store (holes, watch lists).
pub type HashMap<K, V> = std::collections::HashMap<K, V, fnv::FnvBuildHasher>;
