//! meshsync - normal projection driver
//!
//! Projects normals from a reference mesh onto a simplified mesh, either
//! between two generated spheres or between two JSON mesh files, and prints
//! the projection statistics as JSON.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use geometry::generators::uv_sphere;
use meshsync_config::ProjectionConfig;
use projection::{EditFlags, NormalProjector, ProjectionStats};
use serde::Serialize;
use tracing::info;

mod mesh_io;

use mesh_io::{SurfaceOffset, load_mesh, save_mesh, surface_offset};

#[derive(Parser)]
#[command(name = "meshsync")]
#[command(about = "Project normals from a reference mesh onto a simplified mesh")]
#[command(version)]
struct Cli {
    /// Use the data-parallel backend when an accelerator is available
    #[arg(long, global = true)]
    prefer_gpu: bool,

    /// Count the host kernels as an accelerator
    #[arg(long, global = true)]
    emulate_accelerator: bool,

    /// Smoothing angle in degrees for generated meshes
    #[arg(long, global = true)]
    smooth_angle: Option<f32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project from a dense sphere onto a coarse one
    Demo {
        /// Reference sphere subdivisions around the pole axis
        #[arg(long, default_value_t = 64)]
        src_segments: usize,

        /// Reference sphere subdivisions pole to pole
        #[arg(long, default_value_t = 32)]
        src_rings: usize,

        #[arg(long, default_value_t = 1.0)]
        src_radius: f32,

        /// Simplified sphere subdivisions around the pole axis
        #[arg(long, default_value_t = 12)]
        dst_segments: usize,

        /// Simplified sphere subdivisions pole to pole
        #[arg(long, default_value_t = 6)]
        dst_rings: usize,

        #[arg(long, default_value_t = 0.95)]
        dst_radius: f32,
    },

    /// Project between two JSON mesh files
    Project {
        /// Reference mesh
        src: PathBuf,

        /// Mesh receiving the normals
        dst: PathBuf,

        /// Write the destination mesh with its new normals
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Report {
    config: ProjectionConfig,
    stats: ProjectionStats,
    offset: SurfaceOffset,
}

/// Environment settings with command-line overrides applied.
fn resolve_config(cli: &Cli) -> ProjectionConfig {
    let mut config = ProjectionConfig::from_env();
    if cli.prefer_gpu {
        config.prefer_gpu = true;
    }
    if cli.emulate_accelerator {
        config.emulate_accelerator = true;
    }
    if let Some(angle) = cli.smooth_angle {
        config.default_smooth_angle = angle;
    }
    config
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli);
    let flags = EditFlags::from_config(&config);
    let projector = NormalProjector::new(config.clone());

    let (mut dst, mut src, output) = match cli.command {
        Commands::Demo {
            src_segments,
            src_rings,
            src_radius,
            dst_segments,
            dst_rings,
            dst_radius,
        } => {
            let src = uv_sphere(src_radius, src_segments, src_rings)
                .with_smooth_angle(config.default_smooth_angle);
            let dst = uv_sphere(dst_radius, dst_segments, dst_rings)
                .with_smooth_angle(config.default_smooth_angle);
            info!(
                "Demo: {} reference triangles, {} target triangles",
                src.triangle_count(),
                dst.triangle_count()
            );
            (dst, src, None)
        }
        Commands::Project { src, dst, output } => {
            let src_mesh = load_mesh(&src, config.default_smooth_angle)?;
            let dst_mesh = load_mesh(&dst, config.default_smooth_angle)?;
            info!(
                "Projecting {:?} ({} faces) -> {:?} ({} faces)",
                src,
                src_mesh.face_count(),
                dst,
                dst_mesh.face_count()
            );
            (dst_mesh, src_mesh, output)
        }
    };

    let stats = projector.project(&mut dst, &mut src, flags)?;
    let offset = surface_offset(&dst, &src);

    if let Some(path) = output {
        save_mesh(&path, &dst)?;
        info!("Wrote {:?}", path);
    }

    let report = Report {
        config,
        stats,
        offset,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "meshsync",
            "demo",
            "--prefer-gpu",
            "--smooth-angle",
            "45",
            "--dst-rings",
            "8",
        ])
        .unwrap();

        let config = resolve_config(&cli);
        assert!(config.prefer_gpu);
        assert_eq!(config.default_smooth_angle, 45.0);
        assert!(matches!(cli.command, Commands::Demo { dst_rings: 8, .. }));
    }

    #[test]
    fn test_cli_project_paths() {
        let cli = Cli::try_parse_from([
            "meshsync", "project", "ref.json", "lo.json", "-o", "out.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Project { src, dst, output } => {
                assert_eq!(src, PathBuf::from("ref.json"));
                assert_eq!(dst, PathBuf::from("lo.json"));
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            Commands::Demo { .. } => panic!("expected project"),
        }
    }

    #[test]
    fn test_demo_report() {
        let mut src = uv_sphere(1.0, 32, 16);
        let mut dst = uv_sphere(0.95, 9, 5);
        let tilt = glam::Quat::from_rotation_x(0.3) * glam::Quat::from_rotation_z(0.2);
        for p in &mut dst.points {
            *p = tilt * *p;
        }
        let stats = NormalProjector::default()
            .project(&mut dst, &mut src, EditFlags::default())
            .unwrap();
        let offset = surface_offset(&dst, &src);

        assert_eq!(offset.samples, stats.num_rays);
        assert!(offset.hits > 0);
        assert!(offset.mean < 0.1);

        let report = Report {
            config: ProjectionConfig::default(),
            stats,
            offset,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stats"]["path"], "RayCast");
    }
}
