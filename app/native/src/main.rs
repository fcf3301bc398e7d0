//! Muscle - layout muscle memory for i3 and sway.
//!
//! A single binary: with no arguments (or `run`) it starts the engine, with
//! any other subcommand it acts as the control CLI.

fn main() {
    if let Err(err) = muscle_lib::cli::run() {
        eprintln!("muscle: {err}");
        std::process::exit(1);
    }
}
