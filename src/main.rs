fn main() {
    if let Err(e) = medreminder_lib::run() {
        eprintln!("medreminder: {e}");
        std::process::exit(1);
    }
}
