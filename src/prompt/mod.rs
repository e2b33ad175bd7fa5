pub mod engineer;
pub mod instructions;
pub mod quoting;
