use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ripper_core::config::{DEFAULT_DB_NAME, DEFAULT_OUTPUT, DEFAULT_REPORT_NAME};
use ripper_core::{
	describe_filesystem, Allocation, FileKind, RipConfig, RipDatabase, RipEngine, RipStage,
	SystemRunner,
};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "ripper", version, about = "Extracts images and PDFs from a disk image")]
struct Cli {
	/// More log output (-v debug, -vv trace)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbose: u8,
	#[command(subcommand)]
	command: Commands,
}

/// How to reach the file system inside the image
#[derive(Args, Debug)]
struct TskArgs {
	/// Sector offset of the file system inside the image
	#[arg(long)]
	offset: Option<u64>,
	/// File system type passed to The Sleuth Kit (ntfs, fat32, ext4, ...)
	#[arg(long)]
	fstype: Option<String>,
	/// Directory containing fls, icat and fsstat
	#[arg(long)]
	tsk_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Extract overt and deleted images and PDFs from a disk image
	Rip {
		/// The image to examine
		image: PathBuf,
		/// Directory receiving extracted files, the report and the database
		#[arg(long, default_value = DEFAULT_OUTPUT)]
		output: PathBuf,
		/// Database file name inside the output directory
		#[arg(long, default_value = DEFAULT_DB_NAME)]
		db: String,
		/// Report file name inside the output directory
		#[arg(long, default_value = DEFAULT_REPORT_NAME)]
		report: String,
		/// Keep extracted files that are neither images nor PDFs
		#[arg(long)]
		keep_other: bool,
		/// Extract one file at a time
		#[arg(long)]
		sequential: bool,
		#[command(flatten)]
		tsk: TskArgs,
	},
	/// Show file system information for an image
	Info {
		/// The image to examine
		image: PathBuf,
		#[command(flatten)]
		tsk: TskArgs,
	},
	/// List images recorded in a database
	List {
		/// Path to the database
		#[arg(long, default_value = "output/ripper.sqlite")]
		db: PathBuf,
		/// Print JSON instead of a table
		#[arg(long)]
		json: bool,
	},
}

impl TskArgs {
	fn apply(self, config: RipConfig) -> RipConfig {
		RipConfig {
			sector_offset: self.offset,
			fs_type: self.fstype,
			tsk_bin_dir: self.tsk_dir,
			..config
		}
	}
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let level = match cli.verbose {
		0 => Level::INFO,
		1 => Level::DEBUG,
		_ => Level::TRACE,
	};
	tracing_subscriber::fmt()
		.with_max_level(level)
		.with_writer(std::io::stderr)
		.init();

	match cli.command {
		Commands::Rip { image, output, db, report, keep_other, sequential, tsk } => {
			let config = tsk.apply(RipConfig {
				output_dir: output,
				db_name: db,
				report_name: report,
				keep_other,
				parallel_processing: !sequential,
				..RipConfig::for_image(image)
			});
			let report_path = config.report_path();
			let db_path = config.db_path();

			let mut engine = RipEngine::new(config, SystemRunner);
			if atty::is(atty::Stream::Stderr) {
				let bar = ProgressBar::new(0);
				bar.set_style(
					ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")?
						.progress_chars("=> "),
				);
				engine.set_progress_callback(move |progress| {
					bar.set_length(progress.total as u64);
					bar.set_position(progress.completed as u64);
					bar.set_message(progress.current_operation);
					if progress.stage == RipStage::Complete {
						bar.finish_and_clear();
					}
				});
			}

			let rip = engine.run()?;

			println!("✅ Rip completed successfully!");
			println!("📊 Rip ID: {}", rip.id);
			println!("📁 File System: {}", rip.filesystem.fs_type);
			for allocation in [Allocation::Overt, Allocation::Deleted] {
				println!(
					"🔎 {}: {} images, {} PDFs, {} other",
					allocation,
					rip.count(allocation, FileKind::Image),
					rip.count(allocation, FileKind::Pdf),
					rip.count(allocation, FileKind::Other)
				);
			}
			println!(
				"💾 Recovered: {} bytes ({} useful)",
				rip.total_recovered_size(),
				rip.total_useful_size()
			);
			if rip.failed_count() > 0 {
				println!("⚠️  {} files could not be extracted", rip.failed_count());
			}
			println!("📝 Report: {}", report_path.display());
			println!("🗄️  Database: {}", db_path.display());
		}
		Commands::Info { image, tsk } => {
			let config = tsk.apply(RipConfig::for_image(image));
			let info = describe_filesystem(&config)?;
			println!("📋 File System Information:");
			println!("Type: {}", info.fs_type);
			println!();
			println!("{}", info.details);
		}
		Commands::List { db, json } => {
			if !db.exists() {
				anyhow::bail!("No database at {}", db.display());
			}
			let images = RipDatabase::open(&db)?.list_images()?;

			if json {
				println!("{}", serde_json::to_string_pretty(&images)?);
			} else if images.is_empty() {
				println!("No images recorded in {}", db.display());
			} else {
				for image in images {
					let rip_id = image.rip_id.to_string();
					println!(
						"{}  {}  {}  {} overt / {} deleted  {} useful of {} bytes  {}",
						&rip_id[..8],
						image.created_at.format("%Y-%m-%d %H:%M:%S"),
						image.fs_type,
						image.overt_files,
						image.deleted_files,
						image.total_useful_size,
						image.total_recovered_size,
						image.path.display()
					);
				}
			}
		}
	}
	Ok(())
}
