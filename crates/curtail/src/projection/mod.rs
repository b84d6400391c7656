//! Response projection: filter, reshape and bound upstream results.
//!
//! - [`capper`] — name-glob, numeric range and item-count filters applied
//!   before reshaping.
//! - [`policy`] — the [`FieldPolicy`] table keyed by entity kind and tier.
//! - [`projector`] — interprets a policy against one entity.
//! - [`render`] — the cap, project, enforce pipeline every tool goes through.

pub mod capper;
pub mod policy;
pub mod projector;
pub mod render;

pub use capper::{Capped, FilterSpec, RangeFilter, cap, glob_to_regex};
pub use policy::{EntityKind, FieldPolicy, policy};
pub use projector::{project, project_all};
pub use render::{RenderRequest, render};
