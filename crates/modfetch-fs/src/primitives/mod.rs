pub mod positional;

pub use positional::PositionalFile;
