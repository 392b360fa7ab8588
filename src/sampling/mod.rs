pub mod gaussian;
pub mod uniform;

pub use gaussian::DiscreteGaussian;
pub use uniform::{sample_uniform_mod, sample_uniform_poly, sample_ternary, sample_ternary_poly};
