fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--once") {
        rabbit_recorder_lib::run_once();
        return;
    }

    if let Err(e) = rabbit_recorder_lib::run() {
        eprintln!("rabbit-recorder: {:#}", e);
        std::process::exit(1);
    }
}
