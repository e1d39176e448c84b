//! Integer variable handles: a plain [`DomainId`] into the domain store, and the [`AffineView`]
//! used for the `offset(var, d)` view of spec.md §6.

mod affine_view;
mod domain_id;
mod integer_variable;

pub use affine_view::AffineView;
pub use domain_id::DomainId;
pub use integer_variable::IntegerVariable;
