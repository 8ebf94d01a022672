//! Parse-payload command implementation.

use anyhow::{Context, Result};
use nearby_core::IdentityPayload;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_payload_text};

pub fn cmd_parse_payload(payload: &str, format: OutputFormat, opts: &FormatOptions) -> Result<()> {
    let parsed = IdentityPayload::parse(payload.as_bytes())
        .with_context(|| format!("Invalid identity payload '{}'", payload))?;
    match format {
        OutputFormat::Text => print!("{}", format_payload_text(&parsed, opts)),
        OutputFormat::Json => print!("{}", opts.as_json(&parsed)?),
    }
    Ok(())
}
