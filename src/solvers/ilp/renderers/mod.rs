//! ILP Formulation Renderers

pub mod lp;
