//! Long-running consumers.

pub mod subscription_worker;
