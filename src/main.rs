use clap::{Arg, ArgAction, Command};
use std::fs;
use std::path::{Path, PathBuf};
use vlbasic::config::Config;
use vlbasic::runner::{self, DebugLevel, RunOptions};
use vlbasic::repl;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = Command::new("vlb")
        .about("Interpreter for the vlbasic scripting language")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("file")
                .help("The script file to execute")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start in interactive REPL mode")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Dump pipeline stages to stderr")
                .value_name("LEVEL")
                .value_parser(["stages", "all"]),
        )
        .arg(
            Arg::new("time")
                .long("time")
                .help("Print how long the script took")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .help("Directory used as the module search root")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .help("Deepest allowed nesting of function calls")
                .value_name("N")
                .value_parser(clap::value_parser!(usize)),
        )
        .get_matches();

    let mut config = Config::default();
    if let Some(root) = matches.get_one::<PathBuf>("root") {
        config = config.root_dir(root.clone());
    }
    if let Some(depth) = matches.get_one::<usize>("max-depth") {
        config = config.max_call_depth(*depth);
    }

    let debug = match matches.get_one::<String>("debug").map(String::as_str) {
        Some("stages") => DebugLevel::Stages,
        Some("all") => DebugLevel::All,
        _ => DebugLevel::Off,
    };

    match matches.get_one::<String>("file") {
        Some(file_path) if !matches.get_flag("interactive") => {
            let options = RunOptions {
                config,
                debug,
                time: matches.get_flag("time"),
            };
            run_file(Path::new(file_path), &options);
        }
        _ => repl::start(config),
    }
}

fn run_file(path: &Path, options: &RunOptions) {
    if !path.exists() {
        eprintln!("Error: File '{}' not found", path.display());
        std::process::exit(1);
    }

    match fs::read_to_string(path) {
        Ok(source) => {
            if !runner::run(&source, path, options) {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
