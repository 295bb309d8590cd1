// src/params/mod.rs

//! Experiment parameter sets.
//!
//! - [`value`] holds the tagged [`ParamValue`] and its dump coercion.
//! - [`set`] holds [`ParamSet`]: naming, argument rendering, dump IO.
//! - [`cohort`] holds cross-set operations such as name shortening.
//! - [`sweep`] holds small generators for swept numeric values.

pub mod cohort;
pub mod set;
pub mod sweep;
pub mod value;

pub use cohort::{shorten_names, shortened_key_orders, subset};
pub use set::{ArgStyle, ParamSet, PARAMS_FILE};
pub use value::ParamValue;
