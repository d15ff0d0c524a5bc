//! Sample domain wiring the binding pipeline into REST routes: users keyed by
//! uuid (and by their textual form), products keyed by integer, and pet and
//! project payloads whose owner and lead fields are bound from sibling ids.

pub mod module;
pub use module::CatalogModule;

#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
