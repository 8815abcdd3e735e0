#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod command;
pub mod error;
pub mod frame;
pub mod oath;
