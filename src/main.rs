fn main() {
    if let Err(err) = stepflow_graph::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
