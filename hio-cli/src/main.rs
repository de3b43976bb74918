//! Command-line harness for `hio-core`: create, write, read, close, list
//! and unlink a dataset against a single-rank or in-process multi-thread
//! rank group. Not a reimplementation of the context/dataset object model
//! `spec.md` puts out of scope — it is a driver over the library.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hio_core::{DatasetConfig, DatasetFlags, DatasetMode, DatasetOpenOptions, RankGroup, Request};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hio", about = "Hierarchical parallel I/O dataset harness", version)]
struct Cli {
    /// Storage root directory (`<root>/<context>.hio/...`).
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Context id; the namespace a dataset name lives under.
    #[arg(long, global = true, default_value_t = 0)]
    context: u64,

    /// Enable per-rank trace.<rank> files under the dataset directory.
    #[arg(long, global = true)]
    trace: bool,

    /// Request a specific stripe count (`spec.md` §6.5); clamped against
    /// the filesystem's `max_stripe_count` by `fsattrs::finalize`.
    #[arg(long, global = true)]
    stripe_count: Option<u32>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a new dataset generation (truncates any existing one).
    Create {
        name: String,
        id: u64,
        #[arg(long, value_enum, default_value = "basic")]
        file_mode: FileModeArg,
        #[arg(long, value_enum, default_value = "shared")]
        mode: ModeArg,
    },
    /// Write a string payload to an element at an offset, then close.
    Write {
        name: String,
        id: u64,
        element: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        data: String,
    },
    /// Read `len` bytes of an element at an offset and print them.
    Read {
        name: String,
        id: u64,
        element: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        len: u64,
    },
    /// List every generation of a dataset name.
    List { name: String },
    /// Delete a dataset generation (rank 0 only).
    Unlink { name: String, id: u64 },
}

#[derive(Clone, clap::ValueEnum)]
enum FileModeArg {
    Basic,
    Strided,
    Optimized,
}

#[derive(Clone, clap::ValueEnum)]
enum ModeArg {
    Shared,
    Unique,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let rg = hio_core::LocalRankGroup::new().context("starting a single-rank group")?;
    let fs = hio_core::PosixFs::new();

    match cli.cmd {
        Cmd::Create { name, id, file_mode, mode } => {
            let mut config = DatasetConfig::default();
            config.file_mode = Some(match file_mode {
                FileModeArg::Basic => hio_core::FileMode::Basic,
                FileModeArg::Strided => hio_core::FileMode::Strided,
                FileModeArg::Optimized => hio_core::FileMode::FilePerNode,
            });
            config.stripe_count = cli.stripe_count;
            let mode = match mode {
                ModeArg::Shared => DatasetMode::Shared,
                ModeArg::Unique => DatasetMode::Unique,
            };
            let flags = DatasetFlags::CREATE
                | DatasetFlags::TRUNCATE
                | DatasetFlags::READ
                | DatasetFlags::WRITE;
            let opts = DatasetOpenOptions::new(cli.root.clone(), cli.context, name, id, flags, mode)
                .with_config(config)
                .with_tracing(cli.trace);
            let ds = hio_core::Dataset::open(&fs, &rg, opts).context("opening dataset")?;
            println!("created {} generation {} at {:?}", ds.name(), ds.id(), ds.base_path());
            let status = ds.close(&rg)?;
            if status != 0 {
                bail!("close reported status {status}");
            }
        }
        Cmd::Write { name, id, element, offset, data } => {
            let flags = DatasetFlags::READ | DatasetFlags::WRITE;
            let mut config = DatasetConfig::default();
            config.stripe_count = cli.stripe_count;
            let opts =
                DatasetOpenOptions::new(cli.root.clone(), cli.context, name, id, flags, DatasetMode::Shared)
                    .with_config(config)
                    .with_tracing(cli.trace);
            let mut ds = hio_core::Dataset::open(&fs, &rg, opts).context("opening dataset")?;
            let bytes = data.into_bytes();
            let status = ds.process_reqs(&mut [Request::write(element, offset, &bytes)]);
            if status < 0 {
                bail!("write failed with status {status}");
            }
            let status = ds.close(&rg)?;
            if status != 0 {
                bail!("close reported status {status}");
            }
        }
        Cmd::Read { name, id, element, offset, len } => {
            let mut config = DatasetConfig::default();
            config.stripe_count = cli.stripe_count;
            let opts = DatasetOpenOptions::new(
                cli.root.clone(),
                cli.context,
                name,
                id,
                DatasetFlags::READ,
                DatasetMode::Shared,
            )
            .with_config(config)
            .with_tracing(cli.trace);
            let mut ds = hio_core::Dataset::open(&fs, &rg, opts).context("opening dataset")?;
            let mut buf = vec![0u8; len as usize];
            let status = ds.process_reqs(&mut [Request::read(element, offset, &mut buf)]);
            if status < 0 {
                bail!("read failed with status {status}");
            }
            println!("{}", String::from_utf8_lossy(&buf));
            ds.close(&rg)?;
        }
        Cmd::List { name } => {
            let headers = hio_core::dataset::list(&cli.root, cli.context, &name, &rg)
                .context("listing dataset generations")?;
            for h in headers {
                println!("{}\t{}\t{:?}\t{:?}\t{}", h.id, h.name, h.mode, h.file_mode, h.ctime);
            }
        }
        Cmd::Unlink { name, id } => {
            hio_core::dataset::unlink(&cli.root, cli.context, &name, id, rg.rank())
                .context("unlinking dataset")?;
            println!("unlinked {name} generation {id}");
        }
    }
    Ok(())
}
