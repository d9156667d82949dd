use std::path::Path;

use anyhow::Result;
use curate_templates::{load_catalog, Namespace, RuleDefinition};
use serde_json::json;

pub fn print_schema() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&Namespace::json_schema())?);
    Ok(())
}

pub fn check_catalog(path: Option<&Path>) -> Result<()> {
    let loaded = match path {
        Some(path) => load_catalog(path),
        None => Ok(Namespace::bids()),
    };

    match loaded {
        Ok(catalog) => {
            let templates: Vec<&str> = catalog.rules().iter().map(RuleDefinition::id).collect();
            let summary = json!({
                "valid": true,
                "namespace": catalog.name(),
                "description": catalog.description(),
                "templates": templates,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(err) => {
            let violations = err
                .violations()
                .map_or_else(|| vec![err.to_string()], <[String]>::to_vec);
            let summary = json!({"valid": false, "violations": violations});
            println!("{}", serde_json::to_string_pretty(&summary)?);
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
