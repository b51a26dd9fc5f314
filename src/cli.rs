//! CLI argument parsing

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use comidl::GeneratorConfig;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "comidl", version)]
#[command(about = "Translate MIDL interface definitions into Rust declarations", long_about = None)]
pub struct Cli {
    /// MIDL source file to read
    pub input: PathBuf,

    /// Rust file to write; only created when translation succeeds
    pub output: PathBuf,

    /// Name of the module wrapping the generated items
    #[arg(long = "package", default_value = "idl")]
    pub package_name: String,

    /// Path that provides HRESULT, GUID and the other platform types
    #[arg(long, default_value = "wintypes")]
    pub types_path: String,

    /// Spaces per indentation level
    #[arg(long, default_value_t = 4)]
    pub indent: u8,

    /// Omit the "generated" banner
    #[arg(long)]
    pub no_header: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            package_name: self.package_name.clone(),
            types_path: self.types_path.clone(),
            indent_spaces: self.indent,
            header: !self.no_header,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["comidl", "in.idl", "out.rs"]).unwrap();
        assert_eq!(cli.log_level(), LevelFilter::Warn);
        let config = cli.generator_config();
        assert_eq!(config.package_name, "idl");
        assert_eq!(config.types_path, "wintypes");
        assert_eq!(config.indent_spaces, 4);
        assert!(config.header);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "comidl",
            "in.idl",
            "out.rs",
            "--package",
            "shell",
            "--types-path",
            "crate::types",
            "--indent",
            "2",
            "--no-header",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), LevelFilter::Debug);
        let config = cli.generator_config();
        assert_eq!(config.package_name, "shell");
        assert_eq!(config.types_path, "crate::types");
        assert_eq!(config.indent_spaces, 2);
        assert!(!config.header);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["comidl", "a", "b", "-q", "-v"]).is_err());
        let cli = Cli::try_parse_from(["comidl", "a", "b", "-q"]).unwrap();
        assert_eq!(cli.log_level(), LevelFilter::Error);
    }

    #[test]
    fn test_missing_output_is_rejected() {
        assert!(Cli::try_parse_from(["comidl", "in.idl"]).is_err());
    }
}
