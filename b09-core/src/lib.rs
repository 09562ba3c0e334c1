//! Translates Color BASIC and Extended Color BASIC source into BASIC09.
//!
//! [convert] runs the whole pipeline: parse the 6809-era source
//! ([parser]), rewrite and render it as BASIC09 ([codegen]), and
//! optionally bundle it with the runtime procedures it depends on
//! ([procbank]).
pub mod codegen;
pub mod errors;
pub mod parser;
pub mod procbank;

use crate::codegen::CodegenOptions;
use crate::errors::CoreResult;
use crate::procbank::ProcedureBank;
use once_cell::sync::Lazy;
use regex::Regex;

const FALLBACK_PROCEDURE_NAME: &str = "program";

pub struct ConvertOptions {
    /// Name for the generated procedure header.
    pub procedure_name: String,
    /// Drop the number from lines nothing jumps to.
    pub filter_unused_line_numbers: bool,
    /// Zero every variable ahead of the program.
    pub initialize_vars: bool,
    /// Emit the bare program without a `procedure` header.
    pub skip_procedure_header: bool,
    /// Append the runtime procedures the program runs.
    pub output_dependencies: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            procedure_name: FALLBACK_PROCEDURE_NAME.to_string(),
            filter_unused_line_numbers: false,
            initialize_vars: true,
            skip_procedure_header: false,
            output_dependencies: false,
        }
    }
}

/// A name BASIC09 will accept, or the fallback when the requested one
/// does not even start with a safe character.
fn sanitize_procedure_name(name: &str) -> String {
    static SAFE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new("^[A-Za-z0-9_-]+$").unwrap());
    if SAFE_NAME.is_match(name) {
        name.to_string()
    } else {
        FALLBACK_PROCEDURE_NAME.to_string()
    }
}

pub fn convert(source: &str, options: &ConvertOptions) -> CoreResult<String> {
    let mut program = parser::parse(source)?;
    let procname = sanitize_procedure_name(&options.procedure_name);
    if !options.skip_procedure_header {
        program.procname = procname.clone();
    }
    let text = codegen::generate(
        program,
        &CodegenOptions {
            filter_unused_line_numbers: options.filter_unused_line_numbers,
            initialize_vars: options.initialize_vars,
        },
    );
    if options.output_dependencies && !options.skip_procedure_header {
        let mut bank = ProcedureBank::default();
        bank.add_runtime_procedures();
        bank.add_from_str(&text);
        return Ok(bank.procedure_and_dependencies(&procname));
    }
    Ok(text)
}
