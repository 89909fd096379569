use clap::{Parser, Subcommand};
use slidepress::pyramid::VipsBackend;
use slidepress::repo::{StageSet, WorkingCopy};
use slidepress::{aggregate, config, manifest, output, publish};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slidepress")]
#[command(about = "Publish whole-slide images as deep-zoomable static galleries")]
#[command(long_about = "\
Publish whole-slide images as deep-zoomable static galleries

Each slide is tiled into a Deep Zoom pyramid and committed to its own
repository; a top-level gallery repository indexes every slide. Both are
plain static sites a hosting platform serves directly.

Repository layout after a publish:

  repos/
  ├── gallery-01/                  # Per-slide repository
  │   ├── slides/a1b2c3d4/         # One published slide
  │   │   ├── slide.dzi            # Deep Zoom descriptor
  │   │   ├── slide_files/         # Tile pyramid (level/col_row.jpeg)
  │   │   ├── index.html           # OpenSeadragon viewer
  │   │   ├── thumbnail.jpg        # Optional preview
  │   │   └── README.md
  │   ├── gallery.json             # Structured record of this repo's slides
  │   └── index.html               # Repo-local gallery listing
  └── galeri/                      # Top-level gallery repository
      ├── gallery.json             # Combined record, tagged by source repo
      ├── index.html               # Combined listing, newest first
      └── README.md                # Markdown rendering of the same list

Publishing commits locally only. Run 'slidepress push' per repository when
ready to upload; tile sets are large and pushes are independently retryable.

Run 'slidepress gen-config' to generate a documented slidepress.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing slidepress.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tile a slide and commit it into its repositories
    Publish {
        /// Source slide image (SVS, TIFF, JPEG, anything vips reads)
        image: PathBuf,

        /// Display title for the gallery listing
        #[arg(long)]
        title: String,

        /// Free-text description shown under the title
        #[arg(long, default_value = "")]
        description: String,

        /// Optional preview image copied alongside the pyramid
        #[arg(long)]
        thumbnail: Option<PathBuf>,

        /// Per-slide repository the pyramid lands in
        #[arg(long)]
        repo: String,

        /// Explicit slide id (defaults to a fresh 8-character id)
        #[arg(long)]
        id: Option<String>,
    },
    /// Rebuild the top-level gallery from every repository's record
    Rebuild,
    /// Push a repository's default branch to origin
    Push {
        /// Repository name under the working-copy base
        repo: String,
    },
    /// Parse a gallery page and print its entries
    Parse {
        /// HTML file to inspect
        file: PathBuf,
    },
    /// Print a stock slidepress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Publish {
            image,
            title,
            description,
            thumbnail,
            repo,
            id,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            let request = publish::PublishRequest {
                source_image: image,
                title,
                description,
                thumbnail,
                repo,
                slide_id: id,
            };
            let result = publish::publish(&config, &VipsBackend, &request, &mut print_progress);
            output::print_publish_report(&result);
            if !result.success {
                std::process::exit(1);
            }
        }
        Command::Rebuild => {
            let config = config::load_config(&cli.config_dir)?;
            let gallery = WorkingCopy::ensure(
                &config.repo_base,
                &config.gallery_repo,
                &config.remote_url(&config.gallery_repo),
                &config.branch,
            )?;
            if let Err(err) = gallery.sync() {
                eprintln!("Warning: {err}; rebuilding against local state");
            }

            let result = aggregate::rebuild(&config.repo_base, &config.gallery_repo)?;
            gallery.stage_and_commit(
                &StageSet::Paths(result.written.clone()),
                "Rebuild gallery index",
            )?;
            output::print_aggregate_report(&result);
        }
        Command::Push { repo } => {
            let config = config::load_config(&cli.config_dir)?;
            let wc = WorkingCopy::ensure(
                &config.repo_base,
                &repo,
                &config.remote_url(&repo),
                &config.branch,
            )?;
            wc.push()?;
            println!("Pushed {} to origin", repo);
        }
        Command::Parse { file } => {
            let text = std::fs::read_to_string(&file)?;
            output::print_parse_report(&manifest::parse(&text));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Progress callback for the publish pipeline: one line per phase change.
fn print_progress(percent: u8, phase: &str) {
    println!("[{percent:>3}%] {phase}");
}
