use anyhow::Result;
use argh::FromArgs;
use b09_core::ConvertOptions;
use fs_err as fs;
use log::{error, info};
use std::path::PathBuf;

/// Converts Color BASIC programs to BASIC09 source
#[derive(FromArgs, PartialEq, Debug)]
struct Args {
    /// sets the level of verbosity
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// drop the number from lines nothing jumps to
    #[argh(switch, short = 'l')]
    filter_unused_line_numbers: bool,

    /// do not zero variables ahead of the program
    #[argh(switch, short = 'z')]
    no_initialize_vars: bool,

    /// emit the bare program without a procedure header
    #[argh(switch, short = 'b')]
    no_procedure_header: bool,

    /// do not prepend the runtime procedures the program runs
    #[argh(switch, short = 'D')]
    no_dependencies: bool,

    /// name for the generated procedure, defaults to the input file stem
    #[argh(option, short = 'n')]
    procname: Option<String>,

    /// the Color BASIC file to convert
    #[argh(positional)]
    input: PathBuf,

    /// where to write the BASIC09 output
    #[argh(positional)]
    output: PathBuf,
}

fn run(args: &Args) -> Result<()> {
    let source = fs::read_to_string(&args.input)?;
    let procedure_name = match &args.procname {
        Some(name) => name.clone(),
        None => args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let options = ConvertOptions {
        procedure_name,
        filter_unused_line_numbers: args.filter_unused_line_numbers,
        initialize_vars: !args.no_initialize_vars,
        skip_procedure_header: args.no_procedure_header,
        output_dependencies: !args.no_dependencies,
    };
    let text = b09_core::convert(&source, &options)
        .map_err(|e| anyhow::anyhow!("{}: {}", args.input.display(), e))?;
    info!("writing {}", args.output.display());
    fs::write(&args.output, text + "\n")?;
    Ok(())
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    loggerv::Logger::new()
        .verbosity(if args.verbose { 1 } else { 0 })
        .module_path(false)
        .init()
        .unwrap();

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        std::process::exit(1)
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: PathBuf, output: PathBuf) -> Args {
        Args {
            verbose: false,
            filter_unused_line_numbers: true,
            no_initialize_vars: false,
            no_procedure_header: false,
            no_dependencies: true,
            procname: None,
            input,
            output,
        }
    }

    #[test]
    fn converts_a_file_end_to_end() -> Result<()> {
        b09_testing::enable_default_tracing();
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("hello.bas");
        let output = dir.path().join("hello.b09");
        fs::write(&input, "10 PRINT \"HELLO\"")?;

        run(&args(input, output.clone()))?;

        assert_eq!(
            fs::read_to_string(&output)?,
            "procedure hello\nPRINT \"HELLO\"\n"
        );
        Ok(())
    }

    #[test]
    fn reports_unparseable_input() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("bad.bas");
        let output = dir.path().join("bad.b09");
        fs::write(&input, "10 WAT")?;

        let err = run(&args(input, output)).unwrap_err();
        assert!(err.to_string().contains("unexpected input near 'WAT'"));
        Ok(())
    }
}
