//! Writes the OpenAPI document to the path given as the first argument, or to
//! stdout when none is given.

use std::fs;

use fundacion_portal::config::AppConfig;
use fundacion_portal::docs::build_openapi;

fn main() -> anyhow::Result<()> {
    let port = AppConfig::from_env()?.port;
    let doc = serde_json::to_string_pretty(&build_openapi(port))?;

    match std::env::args().nth(1) {
        Some(path) => {
            fs::write(&path, doc)?;
            eprintln!("wrote {path}");
        }
        None => println!("{doc}"),
    }
    Ok(())
}
