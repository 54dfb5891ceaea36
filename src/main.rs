use clap::{Parser, Subcommand};
use ird::IrdRecord;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ird-tool", about = "Inspect PS3 IRD containers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a container and show its metadata
    Info {
        input: PathBuf,
        /// Directory receiving header.bin and footer.bin
        #[arg(short = 'C', long, default_value = ".")]
        scratch_dir: PathBuf,
        /// Print the decoded record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List region and file hashes
    Hashes {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        scratch_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, scratch_dir, json } => {
            let record = ird::decode(&input, &scratch_dir)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_info(&input, &record);
            }
        }

        // ── Hashes ───────────────────────────────────────────────────────────
        Commands::Hashes { input, scratch_dir } => {
            let record = ird::decode(&input, &scratch_dir)?;
            println!("Regions ({}):", record.region_count());
            for (i, r) in record.region_hashes.iter().enumerate() {
                println!("  {:>3}  {}", i, hex::encode(r.0));
            }
            println!("Files ({}):", record.file_count());
            for f in &record.file_hashes {
                println!("  {}  {}", hex::encode(f.sector), hex::encode(f.hash));
            }
        }
    }

    Ok(())
}

fn print_info(input: &Path, record: &IrdRecord) {
    println!("── IRD ──────────────────────────────────────────────────");
    println!("  Path           {}", input.display());
    println!("  Title          {}", record.title);
    println!("  Title ID       {}", record.title_id_lossy());
    println!("  System version {}", String::from_utf8_lossy(&record.sys_ver));
    println!("  Disc version   {}", String::from_utf8_lossy(&record.disc_ver));
    println!("  App version    {}", String::from_utf8_lossy(&record.app_ver));
    println!("  UID            {:08x}", record.uid);
    println!("  CRC            {:08x}", record.crc);
    println!("  Regions        {}", record.region_count());
    println!("  Files          {}", record.file_count());
    for (label, blob) in [("Header", &record.header_blob), ("Footer", &record.footer_blob)] {
        println!(
            "  {:<14} {} ({} -> {} B, {})",
            label,
            blob.path.display(),
            blob.compressed_len,
            blob.decompressed_len,
            blob.framing.name()
        );
    }
}
