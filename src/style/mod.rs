//! Cascade & inheritance resolver
//!
//! Turns the loosely typed per-element capture into resolved, provenance
//! carrying property records. Nothing downstream of normalisation looks at
//! raw capture strings other than through [`ResolvedStyle`].

pub mod cascade;
pub mod properties;
pub mod specificity;
pub mod tokens;
pub mod value;

pub use cascade::{CascadeResolver, Provenance, ResolvedProperty, ResolvedStyle, ResolvedStyles};
pub use specificity::{specificity_of, Specificity};
pub use value::StyleValue;
