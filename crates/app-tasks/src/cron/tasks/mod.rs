pub mod scratch;
pub mod tools;
