pub mod atomic_store;
pub mod state_store;

pub use state_store::StateStore;
