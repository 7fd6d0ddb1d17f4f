pub mod probe;
pub mod replica;

pub use probe::ProbeCache;
pub use replica::ReplicaCache;
