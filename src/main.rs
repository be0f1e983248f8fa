fn main() {
    if let Err(code) = tabulon::cli::run() {
        std::process::exit(code);
    }
}
