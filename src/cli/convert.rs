use std::path::PathBuf;
use std::process;

pub fn cmd_convert(input: PathBuf, output: PathBuf, binary: bool) {
    let artifact = match hjvalue::artifact::read(&input) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    // Refuse to write something that would not load back.
    if let Err(e) = hjvalue::loader::load_artifact(artifact.clone()) {
        eprintln!("error: '{}' does not validate: {}", input.display(), e);
        process::exit(1);
    }

    let written = if binary {
        hjvalue::artifact::write_binary(&artifact, &output)
    } else {
        hjvalue::artifact::write_json(&artifact, &output)
    };
    if let Err(e) = written {
        eprintln!("error: cannot write '{}': {}", output.display(), e);
        process::exit(1);
    }
    eprintln!(
        "Wrote {} ({}) for model {}",
        output.display(),
        if binary { "binary" } else { "json" },
        artifact.id()
    );
}
