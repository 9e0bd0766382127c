use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use pdfedit::api;
use pdfedit::images::ImageDetection;
use pdfedit::operations::parse_page_list;
use pdfedit::{EncryptionAlgorithm, EncryptionOptions, RecompressOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "pdfedit",
    about = "Merge, split, extract, rotate, encrypt and compress PDF files",
    version,
    author
)]
struct Cli {
    /// Directory the results are written to
    #[arg(short = 'd', long, global = true, default_value = "Files")]
    output_dir: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append the pages of the second file to the first
    Merge { first: PathBuf, second: PathBuf },

    /// Split a PDF in two before the given page
    Split {
        input: PathBuf,

        /// First page of the second part (1-based)
        #[arg(long)]
        at: usize,
    },

    /// Write each requested page as its own PDF
    Extract {
        input: PathBuf,

        /// Comma-separated page numbers, e.g. "3,1,3"
        #[arg(short, long)]
        pages: String,

        /// File name prefix for the extracted pages
        #[arg(long, default_value = "extracted_pages")]
        prefix: String,
    },

    /// Encrypt with one password used as both user and owner password
    Encrypt {
        input: PathBuf,

        #[arg(short, long)]
        password: String,

        #[arg(long, value_enum, default_value_t = Algorithm::Rc4_128)]
        algorithm: Algorithm,
    },

    /// Remove encryption
    Decrypt {
        input: PathBuf,

        #[arg(short, long)]
        password: String,
    },

    /// Recompress embedded images as JPEG
    Compress {
        input: PathBuf,

        /// JPEG quality (1-100)
        #[arg(short, long, default_value_t = 75)]
        quality: u8,

        /// Only consider a page-level image named Im0
        #[arg(long)]
        only_im0: bool,

        /// Replace images even when the JPEG is larger
        #[arg(long)]
        always: bool,
    },

    /// Rotate every page
    Rotate {
        input: PathBuf,

        /// Rotation angle (90, 180, 270)
        #[arg(short, long, default_value_t = 90)]
        angle: i64,
    },

    /// Show version, page count, encryption status and page geometry
    Info { input: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    #[value(name = "rc4-40")]
    Rc4_40,
    #[value(name = "rc4-128")]
    Rc4_128,
    #[value(name = "aes-128")]
    Aes128,
}

impl From<Algorithm> for EncryptionAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Rc4_40 => EncryptionAlgorithm::Rc4_40,
            Algorithm::Rc4_128 => EncryptionAlgorithm::Rc4_128,
            Algorithm::Aes128 => EncryptionAlgorithm::Aes128,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "pdfedit=info",
        1 => "pdfedit=debug",
        _ => "pdfedit=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Writes named results into the output directory
struct Output {
    dir: PathBuf,
}

impl Output {
    fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✓ Wrote {}", path.display());
        Ok(path)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Merge { first, second } => {
            let merged = api::merge(&read_pdf(&first)?, &read_pdf(&second)?)
                .context("Failed to merge PDFs")?;
            let output = Output::new(cli.output_dir)?;
            output.write(
                &format!("{}_and_{}_merged.pdf", stem(&first), stem(&second)),
                &merged,
            )?;
        }

        Commands::Split { input, at } => {
            let (first, second) = api::split(&read_pdf(&input)?, at).context("Failed to split PDF")?;
            let name = stem(&input);
            let output = Output::new(cli.output_dir)?;
            output.write(&format!("{name}_split_part1.pdf"), &first)?;
            output.write(&format!("{name}_split_part2.pdf"), &second)?;
        }

        Commands::Extract {
            input,
            pages,
            prefix,
        } => {
            let bytes = read_pdf(&input)?;
            let requested = parse_page_list(&pages);
            let page_count = api::inspect(&bytes)?.pages.len();
            let parts = api::extract(&bytes, &requested).context("Failed to extract pages")?;

            let valid = requested
                .into_iter()
                .filter(|number| (1..=page_count).contains(number));
            let output = Output::new(cli.output_dir)?;
            for (number, part) in valid.zip(&parts) {
                output.write(&format!("{prefix}_page_{number}.pdf"), part)?;
            }
        }

        Commands::Encrypt {
            input,
            password,
            algorithm,
        } => {
            let bytes = read_pdf(&input)?;
            if api::is_encrypted(&bytes)? {
                bail!("{} is already encrypted", input.display());
            }
            let options = EncryptionOptions {
                algorithm: algorithm.into(),
                ..EncryptionOptions::default()
            };
            let encrypted =
                api::encrypt_with(&bytes, &password, &options).context("Failed to encrypt PDF")?;
            let output = Output::new(cli.output_dir)?;
            output.write(&format!("{}_encrypted.pdf", stem(&input)), &encrypted)?;
        }

        Commands::Decrypt { input, password } => {
            let decrypted = match api::decrypt(&read_pdf(&input)?, &password) {
                Ok(bytes) => bytes,
                Err(e) if e.is_authentication_failure() => bail!("Wrong password for {}", input.display()),
                Err(e) => return Err(e).context("Failed to decrypt PDF"),
            };
            let output = Output::new(cli.output_dir)?;
            output.write(&format!("{}_decrypted.pdf", stem(&input)), &decrypted)?;
        }

        Commands::Compress {
            input,
            quality,
            only_im0,
            always,
        } => {
            let options = RecompressOptions {
                quality,
                detection: if only_im0 {
                    ImageDetection::NamedIm0
                } else {
                    ImageDetection::AnySubtype
                },
                only_if_smaller: !always,
            };
            let (compressed, report) =
                api::compress_with(&read_pdf(&input)?, &options).context("Failed to compress PDF")?;

            if report.images_found == 0 {
                println!("No images found");
            } else {
                println!(
                    "Recompressed {} of {} images ({} -> {} bytes)",
                    report.images_recompressed,
                    report.images_found,
                    report.bytes_before,
                    report.bytes_after
                );
            }
            let output = Output::new(cli.output_dir)?;
            output.write(&format!("{}_compressed.pdf", stem(&input)), &compressed)?;
        }

        Commands::Rotate { input, angle } => {
            if ![90, 180, 270].contains(&angle) {
                bail!("Invalid angle {angle}. Valid angles are 90, 180, 270");
            }
            let rotated = api::rotate(&read_pdf(&input)?, angle).context("Failed to rotate PDF")?;
            let output = Output::new(cli.output_dir)?;
            output.write(&format!("{}_rotated.pdf", stem(&input)), &rotated)?;
        }

        Commands::Info { input } => {
            let summary = api::inspect(&read_pdf(&input)?).context("Failed to parse PDF")?;

            println!("PDF Information for: {}", input.display());
            println!("==========================================");
            println!("PDF Version: {}", summary.version);
            println!("Pages: {}", summary.pages.len());
            println!("Encrypted: {}", if summary.encrypted { "yes" } else { "no" });
            if let Some(id) = &summary.document_id {
                println!("Document ID: {}", hex::encode(id));
            }
            if summary.recovered {
                println!("Cross-reference table: rebuilt (file is damaged)");
            }

            if !summary.pages.is_empty() {
                println!("\nPage Information:");
                println!("-----------------");
            }
            for page in &summary.pages {
                match page.media_box {
                    Some([x0, y0, x1, y1]) => println!(
                        "Page {}: {:.0}x{:.0} pts, rotation {}",
                        page.number,
                        x1 - x0,
                        y1 - y0,
                        page.rotation
                    ),
                    None => println!("Page {}: no media box, rotation {}", page.number, page.rotation),
                }
            }
        }
    }

    Ok(())
}
