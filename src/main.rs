use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use spv_build::{
    BuildConfig, ConsoleReporter, Driver, ErrorPolicy, GlslangValidator,
    driver::{compiling_message, ready_message},
    io::{Overwrite, create_ron_file, parse_ron_file},
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "Incremental compilation of GLSL shaders to SPIR-V", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile every shader whose SPIR-V output is missing or out of date
    Build {
        #[command(flatten)]
        source: SourceArgs,
        /// Shader compiler executable to run
        #[arg(long, value_name = "PATH")]
        compiler: Option<PathBuf>,
        /// Target client API environment (e.g. `vulkan1.3`)
        #[arg(long)]
        target_api: Option<String>,
        /// Target SPIR-V version (e.g. `spirv1.6`)
        #[arg(long)]
        target_ir: Option<String>,
        /// Emit debug information in the compiled shaders
        #[arg(short = 'g', long)]
        debug_info: bool,
        /// Skip shaders that can not be processed instead of aborting
        #[arg(short, long)]
        keep_going: bool,
    },
    /// Show which shaders would be compiled, without compiling anything
    Status {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Generate the default RON configuration file
    GenerateConfig {
        /// Path where the file should be written
        #[arg(short, long)]
        output_path: PathBuf,
        /// Overwrite any existing file at the given path
        #[arg(short, long)]
        force_overwrite: bool,
    },
}

#[derive(Debug, clap::Args)]
struct SourceArgs {
    /// Directory containing the shader sources [default: current directory]
    #[arg(short, long, value_name = "PATH")]
    dir: Option<PathBuf>,
    /// Path to RON configuration file to use
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            source,
            compiler,
            target_api,
            target_ir,
            debug_info,
            keep_going,
        } => {
            let mut config = source.load_config()?;
            if let Some(executable) = compiler {
                config.compiler.executable = executable;
            }
            if let Some(target_api) = target_api {
                config.compiler.target_api = target_api;
            }
            if let Some(target_ir) = target_ir {
                config.compiler.target_ir = target_ir;
            }
            config.compiler.debug_info |= debug_info;
            if keep_going {
                config.on_error = ErrorPolicy::Skip;
            }

            let compiler = GlslangValidator::new(config.compiler.clone());
            let mut driver = Driver::new(config, compiler);
            let summary = driver.run(&mut ConsoleReporter)?;

            if !summary.is_complete() {
                bail!("Skipped {} shader(s) because of errors", summary.skipped.len());
            }
        }
        Command::Status { source } => {
            let config = source.load_config()?;
            let compiler = GlslangValidator::new(config.compiler.clone());
            let driver = Driver::new(config, compiler);

            for planned in driver.plan()? {
                match planned.staleness {
                    Ok(staleness) if staleness.needs_compilation => {
                        println!("{}", compiling_message(&planned.job.output, &staleness.updated));
                    }
                    Ok(_) => {
                        println!("{}", ready_message(&planned.job.output));
                    }
                    Err(error) => {
                        println!(
                            " Error:\t\t {} ({:#})",
                            planned.job.source.display(),
                            anyhow::Error::from(error)
                        );
                    }
                }
            }
        }
        Command::GenerateConfig {
            output_path,
            force_overwrite,
        } => {
            let overwrite = if force_overwrite {
                Overwrite::Allow
            } else {
                Overwrite::Refuse
            };
            create_ron_file(&BuildConfig::default(), output_path, overwrite)?;
        }
    }

    Ok(())
}

impl SourceArgs {
    fn load_config(&self) -> Result<BuildConfig> {
        let mut config = match &self.config {
            Some(file_path) => parse_ron_file(file_path)?,
            None => BuildConfig::default(),
        };
        if let Some(dir) = &self.dir {
            config.shader_dir.clone_from(dir);
        }
        Ok(config)
    }
}
