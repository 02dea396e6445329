mod command;
mod process;
mod writer;

pub use command::{CommandConfig, TermSize};
pub use process::{CloseConfig, PtyProcess};
pub use writer::PtyWriter;
