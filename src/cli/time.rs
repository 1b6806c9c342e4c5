use std::path::PathBuf;
use std::process;

use hjvalue::EngineConfig;

use super::{format_vector, parse_vector, ready_engine};

pub fn cmd_time(artifact: PathBuf, start: String, stop: String) {
    let engine = ready_engine(
        Some(artifact),
        EngineConfig {
            cache_capacity: 0,
            ..EngineConfig::default()
        },
    );
    let start = parse_vector("start", &start);
    let stop = parse_vector("stop", &stop);

    match engine.best_possible_time(&start, &stop) {
        Ok(t) => println!("{}", t),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
    if let Ok(tb) = engine.tracking_bound() {
        eprintln!("tracking bound: {}", format_vector(&tb));
    }
}
