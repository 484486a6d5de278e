//! Export the gateway OpenAPI document
//!
//! Usage:
//!   cargo run --bin export_openapi > openapi.json
//!
//! Or with file output:
//!   cargo run --bin export_openapi -- --output docs/openapi.json

use anyhow::Context;
use utoipa::OpenApi;
use order_mesh::gateway::openapi::ApiDoc;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let output_path = match args.as_slice() {
        [_, flag, path, ..] if flag == "--output" => Some(path.as_str()),
        _ => None,
    };

    let json = ApiDoc::openapi()
        .to_pretty_json()
        .context("serializing OpenAPI document")?;

    match output_path {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("writing {path}"))?;
            eprintln!("OpenAPI document exported to: {path}");
        }
        None => println!("{json}"),
    }
    Ok(())
}
