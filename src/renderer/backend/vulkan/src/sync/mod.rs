pub use self::{
    fence::Fence,
    semaphore::Semaphore,
    synchronization_set::{SynchronizationSet, SynchronizationSetConstants},
};

pub mod fence;
pub mod semaphore;
pub mod synchronization_set;
