fn main() {
    if let Err(err) = multichat::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
