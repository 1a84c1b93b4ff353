pub mod conversions;
pub mod predicates;
