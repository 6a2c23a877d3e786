//! services/api/src/bin/openapi.rs
//!
//! Dumps the OpenAPI document to `openapi.json` so the front-end can
//! regenerate its client without a running server.

use api_lib::web::ApiDoc;
use std::fs;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let doc = ApiDoc::openapi().to_pretty_json()?;
    fs::write("openapi.json", doc)?;
    println!("Wrote openapi.json");
    Ok(())
}
