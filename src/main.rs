use std::path::PathBuf;
use std::process::exit;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use env_logger::Env;
use flip::converter::format::TargetFormat;
use flip::converter::level::CompressionLevel;
use flip::{Config, FileSelection, Mode, Session};
use log::{error, info};

/// Convert or compress a batch of image and video files.
#[derive(Parser, Debug)]
#[command(
    name = "flip",
    version,
    about = "Convert or compress a batch of image and video files",
    arg_required_else_help = true
)]
struct Cli {
    /// What to do with the files.
    #[arg(value_enum)]
    mode: ModeArg,

    /// Output format in convert mode (e.g. webp, mp4), compression level in
    /// compress mode (extreme, recommended, low).
    #[arg(value_name = "FORMAT|LEVEL")]
    choice: String,

    /// Files to load into the session.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directory the finished file or archive is written to.
    #[arg(short, long, env = "FLIP_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    Convert,
    Compress,
}

impl From<ModeArg> for Mode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Convert => Mode::Convert,
            ModeArg::Compress => Mode::Compress,
        }
    }
}

#[derive(Debug)]
enum Choice {
    Format(TargetFormat),
    Level(CompressionLevel),
}

impl Cli {
    /// Reads the positional choice against the selected mode.
    fn choice(&self) -> Result<Choice, String> {
        match self.mode {
            ModeArg::Convert => TargetFormat::from_extension(&self.choice)
                .map(Choice::Format)
                .ok_or_else(|| format!("unknown output format {:?}", self.choice)),
            ModeArg::Compress => self.choice.parse().map(Choice::Level).map_err(|_| {
                let levels: Vec<String> =
                    CompressionLevel::ALL.iter().map(|l| l.to_string()).collect();
                format!(
                    "unknown compression level {:?}, expected one of {}",
                    self.choice,
                    levels.join(", ")
                )
            }),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("flip")).init();

    let cli = Cli::parse();
    let choice = cli
        .choice()
        .unwrap_or_else(|msg| Cli::command().error(ErrorKind::InvalidValue, msg).exit());
    let config = Config::from_env()?;
    let mode = Mode::from(cli.mode);

    info!("starting flip in {} mode", mode);
    let session = Session::from_config(&config);

    let mut selections = Vec::with_capacity(cli.paths.len());
    for path in &cli.paths {
        match FileSelection::from_path(path).await {
            Ok(selection) => selections.push(selection),
            Err(e) => error!("skipping {}: {}", path.display(), e),
        }
    }
    if session.add_files(selections).await.is_empty() {
        error!("nothing to process");
        exit(1);
    }

    session.set_mode(mode).await?;
    match choice {
        Choice::Format(format) => session.select_format(format).await?,
        Choice::Level(level) => session.select_level(level).await?,
    }

    let report = session.process().await?;
    if !report.failed.is_empty() {
        error!("{} file(s) failed", report.failed.len());
    }

    match session.export().await? {
        Some(export) => {
            let path = export.save_to(&cli.output_dir).await?;
            info!("wrote {}", path.display());
        }
        None => error!("nothing finished, nothing to save"),
    }

    println!("{}", serde_json::to_string_pretty(&session.snapshot().await)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_convert_invocation() {
        let cli = Cli::try_parse_from(["flip", "convert", "webp", "a.png", "b.jpg"]).unwrap();
        assert_eq!(cli.mode, ModeArg::Convert);
        assert!(matches!(cli.choice(), Ok(Choice::Format(TargetFormat::WebP))));
        assert_eq!(cli.paths.len(), 2);
    }

    #[test]
    fn parses_compress_invocation() {
        let cli = Cli::try_parse_from(["flip", "compress", "Extreme", "a.png", "-o", "out"]).unwrap();
        assert_eq!(Mode::from(cli.mode), Mode::Compress);
        assert!(matches!(cli.choice(), Ok(Choice::Level(CompressionLevel::Extreme))));
        assert_eq!(cli.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn rejects_bad_invocations() {
        let missing_files = Cli::try_parse_from(["flip", "convert", "webp"]).unwrap_err();
        assert_eq!(missing_files.kind(), ErrorKind::MissingRequiredArgument);

        let bad_mode = Cli::try_parse_from(["flip", "shrink", "low", "a.png"]).unwrap_err();
        assert_eq!(bad_mode.kind(), ErrorKind::InvalidValue);

        let cli = Cli::try_parse_from(["flip", "compress", "medium", "a.png"]).unwrap();
        assert!(cli.choice().unwrap_err().contains("extreme, recommended, low"));
        let cli = Cli::try_parse_from(["flip", "convert", "heic", "a.png"]).unwrap();
        assert!(cli.choice().is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
