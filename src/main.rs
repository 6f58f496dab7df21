use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info, warn};

use printkit::{init_logging, Orchestrator, PostProcessConfig, ToolCommandStyle};

fn print_usage() {
    eprintln!("Usage: printkit [OPTIONS] <gcode-file>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --worker                    process through the external worker");
    eprintln!("  --idex                      force dual-toolhead mode");
    eprintln!("  --mmu                       emit multi-material-unit tool commands");
    eprintln!("  --no-write                  extract coordinates only, leave the file untouched");
    eprintln!("  --allow-unknown-generator   accept files from unrecognized slicers");
    eprintln!("  --config <path>             load configuration from a JSON or TOML file");
    eprintln!("  --version                   print version and build date");
}

#[tokio::main]
async fn main() -> ExitCode {
    if init_logging().is_err() {
        eprintln!("failed to initialize logging");
    }

    let mut file: Option<PathBuf> = None;
    let mut use_worker = false;
    let mut config_path: Option<PathBuf> = None;
    let mut idex = false;
    let mut mmu = false;
    let mut no_write = false;
    let mut allow_unknown = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--worker" => use_worker = true,
            "--idex" => idex = true,
            "--mmu" => mmu = true,
            "--no-write" => no_write = true,
            "--allow-unknown-generator" => allow_unknown = true,
            "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("--config requires a path");
                    print_usage();
                    return ExitCode::FAILURE;
                }
            },
            "--help" | "-h" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "--version" | "-V" => {
                println!("printkit {} (built {})", printkit::VERSION, printkit::BUILD_DATE);
                return ExitCode::SUCCESS;
            }
            other if other.starts_with("--") => {
                eprintln!("unknown option: {}", other);
                print_usage();
                return ExitCode::FAILURE;
            }
            other => file = Some(PathBuf::from(other)),
        }
    }

    let Some(file) = file else {
        print_usage();
        return ExitCode::FAILURE;
    };

    let mut config = match config_path {
        Some(path) => match PostProcessConfig::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), "failed to load configuration: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => PostProcessConfig::default(),
    };
    if idex {
        config.idex = true;
    }
    if mmu {
        config.tool_command_style = ToolCommandStyle::Mmu;
    }
    if no_write {
        config.apply_corrections = false;
    }
    if allow_unknown {
        config.allow_unknown_generator = true;
    }

    // This entry point is for interactive inspection; failures are
    // reported, never escalated into a panic or abort.
    let mut orchestrator = Orchestrator::new(config);
    if use_worker {
        match orchestrator.process_with_worker(&file).await {
            Ok(payload) => {
                info!(printability = %payload.printability, "file is ready to print");
                if let Some(analysis) = &payload.analysis_result {
                    info!(
                        used_tools = %analysis.used_tools.join(","),
                        tool_changes = analysis.tool_change_count.unwrap_or(0),
                        "worker analysis"
                    );
                }
            }
            Err(e) => error!("post-processing failed: {}", e),
        }
    } else {
        match orchestrator.process_in_process(&file) {
            Ok(report) => {
                if report.already_processed {
                    info!("file already processed, nothing to do");
                } else {
                    info!(
                        slicer = %report.slicer.family,
                        toolshifts = report.toolshift_count,
                        used_tools = %report.used_tools.join(","),
                        changed = report.changed,
                        "transformation complete"
                    );
                    if let Some((x, y)) = report.first_motion {
                        info!(first_x = x, first_y = y, "first motion");
                    }
                    if report.first_motion.is_none() {
                        warn!("no motion found after the start-print line");
                    }
                }
            }
            Err(e) => error!("transformation failed: {}", e),
        }
    }

    ExitCode::SUCCESS
}
