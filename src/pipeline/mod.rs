//! The transformations behind each stage, kept free of CLI and progress output.

pub mod baselines;
pub mod climatology;
pub mod cutoffs;
pub mod features;
pub mod globe;
pub mod metrics;
pub mod monthly;
pub mod outliers;
pub mod report;
pub mod split;
pub mod trim;
pub mod yearly;
