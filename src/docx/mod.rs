pub mod document;
pub mod emit;
pub mod package;
pub mod xml;
