#![cfg_attr(not(test), no_std)]

pub mod agc;
pub mod channel;
pub mod code_search;
pub mod config;
pub mod control;
pub mod mode;
pub mod reception;
pub mod rf;
pub mod scan;
pub mod scheduler;
pub mod store;
