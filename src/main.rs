//! Batch front end: load the volumes of a TOML job, render their central
//! slices or register one onto the other.
//!
//! ```sh
//! volume-fusion info job.toml
//! volume-fusion render job.toml --out slices/
//! volume-fusion register job.toml --out registered/
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use volume_fusion::{
    config::{self, JobConfig},
    registration::LandmarkSet,
    sync::VolumeId,
    viewer::Viewer,
    volume_loader::LoadOptions,
};

#[derive(Parser)]
#[command(name = "volume-fusion")]
#[command(about = "Multi-planar viewing and rigid registration of two volumes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every volume of a job and print its size and spacing.
    Info {
        /// Path to the job configuration file.
        job: PathBuf,
    },
    /// Render the three central slices of every volume as PNG.
    Render {
        job: PathBuf,
        #[arg(short, long, default_value = "output")]
        out: PathBuf,
    },
    /// Register the source volume onto the target using the job's landmarks
    /// and render the result.
    Register {
        job: PathBuf,
        #[arg(short, long, default_value = "output")]
        out: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { job } => {
            let (job, viewer) = load_job(&job)?;
            for (id, viewed) in viewer.volumes().iter().enumerate() {
                let volume = viewed.handle.read();
                let geometry = volume.geometry();
                println!("{}", job.volumes[id].path.display());
                println!("  voxels:  {:?}", geometry.dims);
                println!("  spacing: {:?} mm", geometry.spacing);
                println!("  extent:  {:?} mm", geometry.extent_mm());
                println!("  maximum: {}", volume.max_intensity());
            }
            Ok(())
        }
        Commands::Render { job, out } => {
            let (_, mut viewer) = load_job(&job)?;
            for id in 0..viewer.volumes().len() {
                render_volume(&mut viewer, VolumeId(id), &out, "volume")?;
            }
            Ok(())
        }
        Commands::Register { job, out } => {
            let (job, mut viewer) = load_job(&job)?;
            let Some(registration) = job.registration else {
                bail!("job has no [registration] table");
            };
            let source = VolumeId(registration.source_volume);
            let target = VolumeId(registration.target_volume);

            for index in &registration.source {
                viewer.add_landmark(LandmarkSet::Source, source, *index)?;
            }
            for index in &registration.target {
                viewer.add_landmark(LandmarkSet::Target, target, *index)?;
            }
            let transform = viewer.compute_registration()?;
            println!("rigid transform:{}", transform.matrix());

            viewer.apply_registration(source)?.run().await?;
            render_volume(&mut viewer, source, &out, "registered")?;
            render_volume(&mut viewer, target, &out, "target")?;
            Ok(())
        }
    }
}

fn load_job(path: &Path) -> anyhow::Result<(JobConfig, Viewer)> {
    let job = config::load_config(path)
        .with_context(|| format!("reading job {}", path.display()))?;
    let mut viewer = Viewer::new(job.viewer);
    for entry in &job.volumes {
        let options = LoadOptions {
            sort_by: entry.sort_by,
            voxel_size: entry.voxel_size,
        };
        viewer
            .load_volume(&entry.path, options)
            .with_context(|| format!("loading {}", entry.path.display()))?;
    }
    Ok((job, viewer))
}

fn render_volume(viewer: &mut Viewer, id: VolumeId, out: &Path, prefix: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(out)?;
    let panels = viewer.register_panels(id)?;
    for panel in panels {
        let (_, plane) = viewer.bus().panel(panel)?;
        let Some(image) = viewer.render(panel)? else {
            log::warn!("could not render {} slice of volume {}", plane.name(), id.0);
            continue;
        };
        let path = out.join(format!("{prefix}{}_{}.png", id.0, plane.name()));
        image.save(&path)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}
