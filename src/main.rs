use sphere_bvh_tracer::config::RunOptions;
use sphere_bvh_tracer::run;

use rayon::ThreadPoolBuilder;
use std::process::ExitCode;
use std::thread::available_parallelism;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let options = RunOptions::from_args(&args);

    let default_filter = if options.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let thread_count = options
        .threads
        .or_else(|| available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(4);
    if let Err(e) = ThreadPoolBuilder::new().num_threads(thread_count).build_global() {
        log::warn!("failed to configure rayon thread pool: {e}");
    }
    log::info!("rayon threads: {thread_count}");

    // Use pollster to run the async run function to completion.
    match pollster::block_on(run(options)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
