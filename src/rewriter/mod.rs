mod array_init;
mod entry;
mod options;
mod output;
mod packed;
mod properties;
mod rewrite;
mod texture;

pub use array_init::*;
pub use entry::*;
pub use options::*;
pub use output::*;
pub use packed::*;
pub use properties::*;
pub use rewrite::*;
pub use texture::*;
