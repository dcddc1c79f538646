pub mod directory;
pub mod program;
pub mod url;
