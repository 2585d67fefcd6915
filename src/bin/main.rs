use std::fs;
use std::process::ExitCode;

use keff_mc::objects::McObject;
use keff_mc::Model;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "keff-mc".into());
    let Some(path) = args.next() else {
        eprintln!("Usage: {} <model.json>", program);
        return ExitCode::from(1);
    };

    let input = match fs::read_to_string(&path) {
        Ok(input) => input,
        Err(error) => {
            eprintln!("error: cannot read {}: {}", path, error);
            return ExitCode::from(1);
        }
    };

    let objects: Vec<McObject> = match serde_json::from_str(&input) {
        Ok(objects) => objects,
        Err(error) => {
            eprintln!("error: cannot parse {}: {}", path, error);
            return ExitCode::from(1);
        }
    };

    let model = match Model::build(objects) {
        Ok(model) => model,
        Err(error) => {
            eprintln!("error: {}", error);
            return ExitCode::from(1);
        }
    };

    match model.run() {
        Ok(results) => {
            println!();
            println!(
                " k-eff = {:.6} +/- {:.6} over {} active cycles",
                results.active_mean,
                results.std_error,
                model.settings.active()
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::from(2)
        }
    }
}
