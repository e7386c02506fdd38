use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pagescene::transport::{encode_document, loopback, write_ndjson, StreamStatus};
use pagescene::{emit_document, ConvertConfig, Conversion, Converter, JsonFileSource, RecordingSink, SnapshotSource};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pagescene", version, about = "Convert captured web pages into a vector scene graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a snapshot and write the IR as JSON
    Convert {
        #[command(flatten)]
        common: CommonArgs,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also drive a recording sink over the result and report its calls
        #[arg(long)]
        dry_run_sink: bool,
    },
    /// Convert a snapshot and write the wire messages as NDJSON
    Stream {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Replay the messages through an in-process receiver and check the result
        #[arg(long)]
        verify: bool,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Snapshot JSON exported by the capture tool
    snapshot: PathBuf,
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Skip asset fetching; content images become placeholders
    #[arg(long)]
    no_assets: bool,
}

impl CommonArgs {
    fn config(&self) -> Result<ConvertConfig> {
        let mut config = match &self.config {
            Some(path) => ConvertConfig::from_file(path)?,
            None => ConvertConfig::default(),
        };
        if self.no_assets {
            config.assets.enabled = false;
        }
        Ok(config)
    }

    async fn run(&self) -> Result<(ConvertConfig, Conversion)> {
        let config = self.config()?;
        let mut source = JsonFileSource::new(&self.snapshot);
        let snapshot = source
            .capture("", &config.capture)
            .with_context(|| format!("reading {}", self.snapshot.display()))?;
        let conversion = Converter::new(config.clone()).convert(&snapshot).await?;
        Ok((config, conversion))
    }
}

fn output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("creating {}", p.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn print_summary(conversion: &Conversion) {
    let s = &conversion.summary;
    eprintln!(
        "{} nodes ({} hidden, {} text), {} stacking contexts",
        s.nodes, s.hidden, s.text_nodes, s.stacking_contexts
    );
    eprintln!(
        "{} layout fallbacks, {} unsupported values, {} structural repairs, {} failed assets",
        s.fallbacks, s.unsupported, s.structural, s.failed_assets
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Convert {
            common,
            output: out,
            dry_run_sink,
        } => {
            let (_, conversion) = common.run().await?;
            let mut writer = output(out.as_ref())?;
            serde_json::to_writer_pretty(&mut writer, &conversion.document)?;
            writeln!(writer)?;
            writer.flush()?;
            print_summary(&conversion);
            if dry_run_sink {
                let mut sink = RecordingSink::new();
                let report = emit_document(&conversion.document, &mut sink);
                eprintln!(
                    "sink: {} nodes created, {} calls, {} failed",
                    report.created,
                    sink.calls.len(),
                    report.failed_nodes + report.failed_calls
                );
            }
        }
        Command::Stream {
            common,
            output: out,
            verify,
        } => {
            let (config, conversion) = common.run().await?;
            let envelopes = encode_document(&conversion.document, &conversion.payloads, &config.transport);
            write_ndjson(output(out.as_ref())?, &envelopes)?;
            print_summary(&conversion);
            eprintln!("{} messages", envelopes.len());
            if verify {
                let received = loopback(&conversion.document, &conversion.payloads, &config.transport).await?;
                let problems = pagescene::hierarchy::check_integrity(&received.document);
                match (&received.status, problems.is_empty()) {
                    (StreamStatus::Complete, true) => eprintln!("verify: receiver rebuilt {} nodes", received.document.len()),
                    (status, _) => {
                        for p in &problems {
                            eprintln!("verify: {}", p);
                        }
                        anyhow::bail!("verification failed: {:?}", status);
                    }
                }
            }
        }
    }
    Ok(())
}
