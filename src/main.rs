use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use refz::{
    ArchiveHeader, DecodeOptions, Decompressor, GenomicInterval, InMemoryReference, InputStreams,
    IntervalSidecar, ReferenceSource, SamWriter,
};

#[derive(Parser)]
#[command(
    name = "refz",
    about = "Random-access decompression of reference-based alignment archives",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress progress output and set logging level to WARN
    #[arg(short = 'q', long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompress an archive, whole or over a genomic interval
    Decompress(DecompressArgs),
}

#[derive(Parser)]
struct DecompressArgs {
    /// Archive base path (the part before `.offs.lz`, `.head`, ...)
    input: PathBuf,

    /// Reference FASTA for sequence reconstruction
    #[arg(short = 'r', long = "reference", value_name = "FASTA")]
    reference: Option<PathBuf>,

    /// Output path (stdout when absent)
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Restrict decompression to an interval, e.g. chr2:5000000-100000000
    #[arg(short = 'L', long = "location", value_name = "INTERVAL")]
    location: Option<String>,

    /// Resume so the first emitted record is the (K+1)-th alignment
    #[arg(long = "from-alignment", value_name = "K", conflicts_with = "location")]
    from_alignment: Option<u64>,

    /// Skip sequence reconstruction
    #[arg(long)]
    no_seq: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let Commands::Decompress(args) = cli.command;
    match decompress(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn decompress(args: &DecompressArgs) -> refz::Result<()> {
    let sidecar_path = args
        .input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("genomic_intervals.txt");
    let sidecar = IntervalSidecar::load(&sidecar_path)?;

    let mut head_path = args.input.as_os_str().to_owned();
    head_path.push(".head");
    let header = ArchiveHeader::load(Path::new(&head_path))?;
    info!(
        transcripts = header.transcripts.len(),
        read_len = header.read_len,
        "parsed archive header"
    );

    let mut streams = InputStreams::open(&args.input, &sidecar, &header)?;

    let reference = match &args.reference {
        Some(path) => Some(InMemoryReference::from_fasta(path, &header)?),
        None => None,
    };
    let decompressor = Decompressor::new(
        header,
        reference.as_ref().map(|r| r as &dyn ReferenceSource),
    );

    let mut options = DecodeOptions::default();
    if args.no_seq || args.reference.is_none() {
        options.remove(DecodeOptions::SEQ);
    }

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(io::BufWriter::new(io::stdout())),
    };
    let mut sink = SamWriter::new(decompressor.header(), writer);

    if let Some(location) = &args.location {
        let interval = GenomicInterval::parse(location)?;
        info!(%interval, "decompressing interval");
        decompressor.decompress_interval(interval, &mut streams, options, &mut sink)?;
    } else if let Some(k) = args.from_alignment {
        info!(k, "decompressing from alignment");
        decompressor.decompress_from_alignment(k, &mut streams, options, &mut sink)?;
    } else {
        info!("decompressing whole archive");
        decompressor.decompress(&mut streams, options, &mut sink)?;
    }
    sink.finish()?;
    Ok(())
}
