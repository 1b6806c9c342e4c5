use std::path::PathBuf;
use std::process;

use super::format_vector;

pub fn cmd_inspect(artifact: PathBuf, full: bool) {
    let decoded = match hjvalue::artifact::read(&artifact) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    let planner = decoded.planner.clone();
    let evaluator = match hjvalue::loader::load_artifact(decoded) {
        Ok(ev) => ev,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let id = evaluator.id();
    if full {
        println!("model:      {}", id.to_hex());
    } else {
        println!("model:      {}", id);
    }
    println!("kind:       {}", evaluator.kind());
    println!("input dim:  {}", evaluator.input_dim());
    println!("parameters: {}", evaluator.parameter_count());
    println!("bounds min: {}", format_vector(&evaluator.bounds().min));
    println!("bounds max: {}", format_vector(&evaluator.bounds().max));
    let out = evaluator.output_scale();
    println!("output:     {} * y + {}", out.scale, out.offset);
    if !evaluator.description().is_empty() {
        println!("about:      {}", evaluator.description());
    }

    if let Some(p) = planner {
        println!("planner:");
        if let (Some(lo), Some(hi)) = (&p.control_lower, &p.control_upper) {
            println!("  control:        {} .. {}", format_vector(lo), format_vector(hi));
        }
        if let Some(tb) = &p.tracking_bound {
            println!("  tracking bound: {}", format_vector(tb));
        }
        if let Some(v) = &p.max_planner_speed {
            println!("  planner speed:  {}", format_vector(v));
        }
        if let (Some(lo), Some(hi)) = (p.priority_lower, p.priority_upper) {
            println!("  priority:       {} .. {}", lo, hi);
        }
    }
}
