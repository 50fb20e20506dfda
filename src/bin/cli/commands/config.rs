use anyhow::Result;
use memoport_lib::importer::ImportConfig;

use crate::OutputFormat;

pub fn run(config: &ImportConfig, format: &OutputFormat) -> Result<()> {
    let value = serde_json::to_value(config)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => {
            let fields = value.as_object().cloned().unwrap_or_default();
            let width = fields.keys().map(|k| k.len()).max().unwrap_or(0);
            for (key, value) in &fields {
                let shown = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                println!("{:<width$}  {}", key, shown, width = width);
            }
        }
    }

    Ok(())
}
