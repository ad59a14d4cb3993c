pub(crate) use registration::Registration;
pub(crate) use signal::Signal;
pub(crate) use slots::{SlotId, Slots};
pub(crate) use work_stack::WorkStack;
pub(crate) use worker_pool::{JobFn, WorkerPool};

mod registration;
mod signal;
mod slots;
mod work_stack;
mod worker_pool;
