//! gomodrun CLI Application

// CLI binary needs to output to stderr - this is intentional
#![allow(clippy::print_stderr)]

fn main() {
    // Tracing may be unusable during a panic.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("gomodrun panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    std::process::exit(gomodrun::cli::run(std::env::args_os()));
}
