pub mod config;
pub mod docx;
pub mod ir;
pub mod number;
pub mod pattern;
pub mod pipeline;
pub mod progress;
pub mod reduce;
pub mod rewrite;
pub mod scan;
