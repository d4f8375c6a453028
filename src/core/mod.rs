//! Core library modules for butterfly-net
//!
//! This module contains the internal implementation details of the butterfly-net library.

pub mod config;
pub mod elements;
pub mod error;
pub mod graph;
pub mod network;
pub mod options;
pub mod output;
pub mod overpass;
pub mod partition;
pub mod projection;
pub mod query;
