mod args;
mod run;

pub use args::{Args, InputFormat};
pub use run::{render_chunk, replay_provider, run, Output};
