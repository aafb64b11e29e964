// geocontrol_core/src/utils/mod.rs

pub mod so3;
