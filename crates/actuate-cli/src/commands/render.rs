//! Render a configuration document with bindings, nothing is executed

use crate::cli::OutputFormat;
use crate::error::CliResult;
use crate::utils::{emit, parse_binding, read_document, ColoredOutput};
use actuate_core::{substitute, Bindings, SubstitutionMode};

pub fn execute(file: &str, bindings: &[String], lenient: bool, format: OutputFormat) -> CliResult<()> {
    let document = read_document(file)?;
    let mut values = Bindings::new();
    for raw in bindings {
        let (name, value) = parse_binding(raw)?;
        values.insert(name, value);
    }
    let mode = if lenient { SubstitutionMode::Lenient } else { SubstitutionMode::Strict };

    let rendered = substitute(&document, &values, mode)?;
    for warning in &rendered.warnings {
        eprintln!("{} {}", ColoredOutput::warning("Warning:"), warning);
    }
    emit(&format.format_json(&rendered.value)?, None)
}
