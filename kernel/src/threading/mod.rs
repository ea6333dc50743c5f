pub mod process;

pub use process::{Pid, Process, ProcessTable};
