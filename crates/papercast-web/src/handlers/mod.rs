pub mod files;
pub mod index;
pub mod process;
