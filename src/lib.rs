//! Budget-aware steepest-ascent hill climbing over skill tree allocations.
//!
//! Layers, leaves first: [`domain`] (graph, allocation, budgets, moves),
//! [`application`] (neighbor generation, evaluation pool, optimizer),
//! [`infrastructure`] (I/O traits, engines, loader, DI), and [`cli`].

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
