#![deny(
    rust_2018_idioms,
    unreachable_pub,
    unsafe_code,
    unused_imports,
    unused_mut,
    missing_debug_implementations
)]

use anyhow::Context;
use colored::*;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use junai::{
    archive::{self, Archive, Manifest},
    dictionary::NameDictionary,
    resource::{ResourceMagic, ResourceType},
    util,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt()]
enum Opt {
    /// Extract archives
    Unpack {
        /// Archives to extract
        #[structopt(required = true, name = "ARCHIVES", parse(from_os_str))]
        files: Vec<PathBuf>,

        /// Directory to output extracted files
        #[structopt(
            short = "o",
            long = "output",
            parse(from_os_str),
            default_value = "ext/"
        )]
        output_dir: PathBuf,

        /// Newline separated list of known file names
        #[structopt(short = "n", long = "names", parse(from_os_str))]
        names: Option<PathBuf>,

        /// Convert TLG images to PNG
        #[structopt(short, long)]
        convert: bool,
    },
    /// Build an archive from an unpacked directory
    Repack {
        /// Directory containing manifest.json
        #[structopt(name = "DIRECTORY", parse(from_os_str))]
        input_dir: PathBuf,

        /// Archive to create
        #[structopt(name = "OUTPUT", parse(from_os_str))]
        output: PathBuf,
    },
    /// Convert loose TLG images to PNG
    Convert {
        /// Files to process
        #[structopt(required = true, name = "FILES", parse(from_os_str))]
        files: Vec<PathBuf>,
    },
}

fn main() {
    env_logger::init();
    let opt = Opt::from_args();

    let result = match &opt {
        Opt::Unpack {
            files,
            output_dir,
            names,
            convert,
        } => unpack_archives(files, output_dir, names.as_deref(), *convert),
        Opt::Repack { input_dir, output } => repack_archive(input_dir, output),
        Opt::Convert { files } => convert_resources(files),
    };
    if let Err(err) = result {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn unpack_archives(
    files: &[PathBuf],
    output_dir: &Path,
    names: Option<&Path>,
    convert: bool,
) -> anyhow::Result<()> {
    let dictionary = match names {
        Some(path) => NameDictionary::load(path)?,
        None => {
            println!(
                "{}",
                "No name list given, only compressed entries can be extracted"
                    .yellow()
            );
            NameDictionary::new()
        }
    };
    log::debug!("Known names: {}", dictionary.len());

    files.iter().filter(|file| file.is_file()).try_for_each(|file| {
        let archive = match Archive::open(file, &dictionary) {
            Ok(archive) => archive,
            Err(err) => {
                log::error!("{:?}: {:#}", file, err);
                return Ok(());
            }
        };
        let unresolved = archive.entries().len()
            - archive.table().extractable_count();
        if unresolved > 0 {
            println!(
                "{}",
                format!(
                    "{:?}: {} entries have unknown names and will be skipped",
                    file, unresolved
                )
                .yellow()
            );
        }

        let output_dir = output_dir.join(
            file.file_stem().context("Could not get archive file name")?,
        );
        let progress_bar = init_progressbar(
            &format!("Extracting: {:?}", file),
            archive.entries().len() as u64,
        );
        archive.unpack_with(&output_dir, convert, |_| progress_bar.inc(1))?;
        progress_bar.finish();
        Ok(())
    })
}

fn repack_archive(input_dir: &Path, output: &Path) -> anyhow::Result<()> {
    let manifest = Manifest::load(input_dir)?;
    let table = archive::repack(input_dir, &manifest, output)?;
    let skipped = table.entries.len() - table.extractable_count();
    if skipped > 0 {
        println!(
            "{}",
            format!("{} unresolved entries were left out", skipped).yellow()
        );
    }
    Ok(())
}

fn convert_resources(files: &[PathBuf]) -> anyhow::Result<()> {
    let progress_bar = init_progressbar("Converting...", files.len() as u64);

    files
        .par_iter()
        .progress_with(progress_bar)
        .filter(|file| file.is_file())
        .try_for_each(|file| {
            log::debug!("Converting: {:?}", file);
            let contents = std::fs::read(file)?;
            let resource_magic = ResourceMagic::parse_magic(&contents);
            match resource_magic.parse(&contents) {
                Ok(r) => write_resource(r, file),
                Err(err) => {
                    log::error!("{:?}: {}", file, err);
                    Ok(())
                }
            }
        })
}

fn init_progressbar(prefix: &str, size: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(size).with_style(
        ProgressStyle::default_bar().template(
            " {spinner} {prefix} {wide_bar:} {pos:>6}/{len:6} ETA:[{eta}]",
        ),
    );
    progress_bar.set_prefix(prefix);
    progress_bar
}

fn write_resource(resource: ResourceType, file_name: &Path) -> anyhow::Result<()> {
    match resource {
        ResourceType::RgbaImage { image } => {
            let new_file_name = file_name.with_extension("png");
            let png = util::image::raw_to_png(image.width, image.height, image.pixels)?;
            util::save_file(&new_file_name, &png)
        }
        ResourceType::Other => Ok(()),
    }
}
