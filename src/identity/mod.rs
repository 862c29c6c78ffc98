//! Team identity linkage
//!
//! Scraped rows are per season; an identity ties together the rows that
//! denote the same real club. The resolver here only ever links exact
//! recurrences and reports everything else as unresolved.

mod resolver;

pub use resolver::{IdentityResolver, Resolution, ResolutionReport};
