use std::path::PathBuf;
use std::process;

use super::{format_vector, parse_vector, ready_engine, resolve_config};

pub fn cmd_query(
    artifact: Option<PathBuf>,
    states: Vec<String>,
    config: Option<PathBuf>,
    control: bool,
) {
    let config = resolve_config(config.as_deref());
    let engine = ready_engine(artifact, config);

    let parsed: Vec<Vec<f64>> = states.iter().map(|s| parse_vector("state", s)).collect();
    let mut failed = false;
    for (raw, result) in states.iter().zip(engine.query_batch(&parsed)) {
        match result {
            Ok(r) => {
                let flag = if r.within_domain { "" } else { "  (outside domain)" };
                println!(
                    "{}  V = {}  grad = {}{}",
                    raw,
                    r.value,
                    format_vector(&r.gradient),
                    flag
                );
            }
            Err(e) => {
                eprintln!("error: {}: {}", raw, e);
                failed = true;
            }
        }
    }

    if control && !failed {
        for (raw, state) in states.iter().zip(&parsed) {
            match engine.optimal_control(state) {
                Ok(u) => println!("{}  u* = {}", raw, format_vector(&u)),
                Err(e) => {
                    eprintln!("error: {}: {}", raw, e);
                    failed = true;
                }
            }
        }
    }

    engine.shutdown();
    if failed {
        process::exit(1);
    }
}
