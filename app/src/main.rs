fn main() {
    if let Err(error) = signease_app::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
