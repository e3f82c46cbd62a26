use std::path::PathBuf;

use structopt::clap::AppSettings::*;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod util;

use commands::ViewArgs;

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "ls", visible_alias = "list", about = "List a directory of an archive")]
    List {
        #[structopt(flatten)]
        view: ViewArgs,

        #[structopt(default_value = "", help = "Directory to list [default: top level]")]
        dir: String,

        #[structopt(short = "R", long, help = "List subdirectories too")]
        recursive: bool,

        #[structopt(long, help = "Print one JSON object per line")]
        json: bool,
    },

    #[structopt(name = "cat", about = "Write a file from an archive to standard output")]
    Cat {
        #[structopt(flatten)]
        view: ViewArgs,

        #[structopt(help = "Path of the file inside the archive")]
        path: String,

        #[structopt(short, long, default_value = "0", help = "Bytes to skip first")]
        offset: u64,

        #[structopt(short = "n", long, help = "Bytes to write at most")]
        count: Option<u64>,
    },

    #[structopt(name = "pack", visible_alias = "create", about = "Create a zip archive")]
    Pack {
        #[structopt(short, long, help = "Overwrite an existing archive")]
        force: bool,

        #[structopt(name = "archive", parse(from_os_str), help = "Path of the new archive")]
        archive: PathBuf,

        #[structopt(
            name = "files",
            parse(from_os_str),
            required = true,
            help = "Files and directories to add"
        )]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "arcfs",
    about = "Browse zip archives and squashfs images as a directory tree, and pack new zip archives.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands]
)]
struct CliOpts {
    #[structopt(
        short,
        long,
        parse(from_occurrences),
        global = true,
        help = "More log output (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence"
    )]
    verbose: u8,

    #[structopt(subcommand)]
    cmd: Commands,
}

fn init_logging(verbose: u8) {
    let filter = match std::env::var_os("RUST_LOG") {
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let opts = CliOpts::from_iter(wild::args_os());
    init_logging(opts.verbose);

    let result = match opts.cmd {
        Commands::List {
            view,
            dir,
            recursive,
            json,
        } => commands::list(view, dir, recursive, json),
        Commands::Cat {
            view,
            path,
            offset,
            count,
        } => commands::cat(view, path, offset, count),
        Commands::Pack {
            force,
            archive,
            files,
        } => commands::pack(archive, files, force),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
