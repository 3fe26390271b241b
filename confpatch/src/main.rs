//! Configuration patch tool.
//!
//! Generates append-only patch files from the difference between module
//! baselines and the live configuration of a site, and applies them safely:
//! units whose live state diverged from the recorded snapshot are skipped
//! with a warning instead of being overwritten.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use confpatch::apply::ConfigApplier;
use confpatch::core::codec;
use confpatch::core::types::{GlobalActions, UpdateId};
use confpatch::exit_codes;
use confpatch::generate::{
    Direction, GenerateRequest, export_baselines, generate_patch, write_generated,
};
use confpatch::io::baseline::ModuleBaselines;
use confpatch::io::config_store::DirStore;
use confpatch::io::installer::{SiteInstaller, installed_modules};
use confpatch::io::layout::SitePaths;
use confpatch::io::ledger::{JsonLedger, ProgressLedger};
use confpatch::io::patch_store::PatchStore;
use confpatch::logging;

#[derive(Parser)]
#[command(
    name = "confpatch",
    version,
    about = "Generate and apply hierarchical configuration patches"
)]
struct Cli {
    /// Site root holding `confpatch.toml`, modules and active config.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Diff module baselines against active config and append a patch.
    Generate {
        /// Module that owns the patch file.
        #[arg(long)]
        module: String,
        /// Update name; the patch file is `<update>.<ext>`.
        #[arg(long)]
        update: String,
        /// Modules to scan (comma separated). Defaults to the installed
        /// modules, or every module when none are recorded.
        #[arg(long, value_delimiter = ',')]
        scan: Vec<String>,
        /// Treat active config as the desired state and export it into the
        /// module baselines once the patch is written.
        #[arg(long)]
        to_active: bool,
        /// Module to install before any unit is patched (repeatable).
        #[arg(long = "install-module")]
        install_modules: Vec<String>,
        /// Config to import from module baselines (repeatable).
        #[arg(long = "import-config")]
        import_configs: Vec<String>,
        /// Print the patch without writing it or any baseline.
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply `<module>/config/update/<update>` to active config.
    Apply { module: String, update: String },
    /// Decode a patch file and print it in canonical form.
    Show { module: String, update: String },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let (paths, cfg) = SitePaths::load(&cli.root)?;
    let patches = PatchStore::new(&paths.modules_dir, cfg.format);

    match cli.command {
        Command::Generate {
            module,
            update,
            scan,
            to_active,
            install_modules,
            import_configs,
            dry_run,
        } => {
            let id = UpdateId::new(module, update)?;
            let store = DirStore::new(&paths.active_dir);
            let mut baselines = ModuleBaselines::new(&paths.modules_dir);
            let modules = if scan.is_empty() {
                default_scan(&store, &baselines)?
            } else {
                scan
            };
            let actions = GlobalActions {
                install_modules,
                import_configs,
            };
            let request = GenerateRequest {
                modules,
                direction: if to_active {
                    Direction::BaselineToActive
                } else {
                    Direction::ActiveToBaseline
                },
                global_actions: Some(actions),
            };
            let generated = generate_patch(&store, &baselines, cfg.format, &request)?;
            if !generated.changes_found {
                println!("no configuration changes");
            }
            if generated.text.is_empty() {
                return Ok(exit_codes::OK);
            }
            if dry_run {
                print!("{}", generated.text);
            } else {
                let path = write_generated(&patches, &id, &generated)?;
                println!("wrote {}", path.display());
                let exported = export_baselines(&mut baselines, &generated)?;
                if exported > 0 {
                    println!("exported {exported} baseline(s)");
                }
            }
            Ok(exit_codes::OK)
        }
        Command::Apply { module, update } => {
            let id = UpdateId::new(module, update)?;
            let mut applier = ConfigApplier::new(
                DirStore::new(&paths.active_dir),
                SiteInstaller::new(&paths.modules_dir),
                ModuleBaselines::new(&paths.modules_dir),
            );
            let report = applier.apply_patch(&patches, &id)?;
            for outcome in &report.units {
                println!("{}: {}", outcome.unit, outcome.state);
            }
            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
            JsonLedger::new(&paths.ledger_path).record(&id, report.ok)?;
            Ok(if report.ok {
                exit_codes::OK
            } else {
                exit_codes::WARNINGS
            })
        }
        Command::Show { module, update } => {
            let id = UpdateId::new(module, update)?;
            let record = patches.load(&id)?;
            print!("{}", codec::encode_record(cfg.format, &record)?);
            Ok(exit_codes::OK)
        }
    }
}

/// Installed modules, or every module on disk when none are recorded.
fn default_scan(store: &DirStore, baselines: &ModuleBaselines) -> Result<Vec<String>> {
    let installed = installed_modules(store)?;
    if installed.is_empty() {
        return baselines.modules();
    }
    Ok(installed.into_iter().collect())
}
