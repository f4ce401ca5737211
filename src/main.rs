use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;
use xopen::{Config, Reader, Writer, DEFAULT_BUFFER_SIZE};

#[derive(Parser)]
#[command(name = "xopen", about = "Read and write files, pipes and URLs with transparent gzip/xz/zstd")]
struct Cli {
    /// Buffer size in bytes for every layer
    #[arg(long, global = true, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode inputs and concatenate them into OUTPUT
    Cat {
        /// Output descriptor; .gz/.xz/.zst selects the encoder
        #[arg(short, long, default_value = "-")]
        output: String,
        /// Compression level (gzip/xz 0-9; zstd 1-22)
        #[arg(short, long)]
        level: Option<i32>,
        /// Inputs: paths, '-', '|command args', http(s) URLs
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<String>,
    },
    /// Print the sniffed compression format of each input
    Detect {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xopen=warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("xopen: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> xopen::Result<()> {
    let config = Config::default().with_buffer_size(cli.buffer_size);

    match cli.command {
        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { output, level, inputs } => {
            let config = match level {
                Some(l) => config.with_level(l),
                None    => config,
            };
            let mut out = Writer::create(
                &output,
                &xopen::sink::default_open_options(),
                xopen::writer::DEFAULT_FILE_MODE,
                &config,
            )?;
            for input in &inputs {
                let mut reader = match Reader::open(input, &config) {
                    Ok(r) => r,
                    Err(e) if e.is_no_content() => {
                        debug!(input = %input, "skipping empty input");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                io::copy(&mut reader, &mut out).map_err(xopen::Error::from_io)?;
                reader.close()?;
            }
            out.close()?;
        }

        // ── Detect ───────────────────────────────────────────────────────────
        Commands::Detect { inputs } => {
            let stdout = io::stdout();
            let mut stdout = stdout.lock();
            for input in &inputs {
                let format = match Reader::open(input, &config) {
                    Ok(mut r) => {
                        let f = r.format();
                        r.close()?;
                        f.name()
                    }
                    Err(e) if e.is_no_content() => "empty",
                    Err(e) => return Err(e),
                };
                writeln!(stdout, "{input}\t{format}")?;
            }
        }
    }

    Ok(())
}
