fn main() {
    if let Err(err) = network_map_renderer::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
