fn main() {
    if let Err(e) = seedkeeper_lib::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
