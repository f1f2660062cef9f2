//! patchmorph CLI - morph between two meshes with identical connectivity.
//!
//! Usage: patchmorph <COMMAND> [OPTIONS] <SOURCE> ...
//!
//! Run `patchmorph --help` for available commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};

use patchmorph::io;
use patchmorph::mesh::HalfEdgeMesh;
use patchmorph::morph::{
    build_hierarchy_with_progress, ComposeOptions, HierarchyOptions, KabschSolver, LeafInterpolator,
    LinearInterpolator, MorphOptions, Morpher, OverlapPolicy, Progress, RigidBlendInterpolator, SolverOptions,
};

#[derive(Parser)]
#[command(name = "patchmorph")]
#[command(author, version, about = "Hierarchical patch-based mesh morphing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the morph at a single blend value
    Morph {
        /// Source mesh file (t = 0)
        source: PathBuf,

        /// Target mesh file (t = 1)
        target: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Blend value between 0 and 1
        #[arg(short, long, default_value = "0.5")]
        t: f64,

        #[command(flatten)]
        morph: MorphArgs,
    },

    /// Write evenly spaced frames from source to target
    Sequence {
        /// Source mesh file (t = 0)
        source: PathBuf,

        /// Target mesh file (t = 1)
        target: PathBuf,

        /// Directory receiving frame_0000.<ext>, frame_0001.<ext>, ...
        out_dir: PathBuf,

        /// Number of frames, both ends included
        #[arg(short, long, default_value = "10")]
        frames: usize,

        /// Extension of the frame files
        #[arg(long, default_value = "off")]
        extension: String,

        #[command(flatten)]
        morph: MorphArgs,
    },

    /// Build a patch hierarchy and print its statistics
    Hierarchy {
        /// Mesh file
        source: PathBuf,

        #[command(flatten)]
        hierarchy: HierarchyArgs,
    },
}

#[derive(Args, Clone)]
struct HierarchyArgs {
    /// Children per split
    #[arg(short = 'k', long, default_value = "4")]
    branching: usize,

    /// Patches with at most this many faces become leaves
    #[arg(short, long, default_value = "50")]
    leaf_size: usize,

    /// Maximum leaf depth (exclusive) for an accepted hierarchy
    #[arg(short, long, default_value = "15")]
    depth_bound: usize,

    /// Hierarchy attempts before giving up
    #[arg(short, long, default_value = "64")]
    attempts: usize,

    /// Random seed (default: from the OS)
    #[arg(short, long)]
    seed: Option<u64>,

    /// How sibling patches share seam faces
    #[arg(long, value_enum, default_value = "discoverer")]
    overlap: OverlapArg,
}

#[derive(Args, Clone)]
struct MorphArgs {
    #[command(flatten)]
    hierarchy: HierarchyArgs,

    /// Leaf interpolation method
    #[arg(short, long, value_enum, default_value = "rigid")]
    interpolator: InterpolatorArg,

    /// Refinement sweeps of the sibling alignment
    #[arg(long, default_value = "2")]
    refine: usize,

    /// Use single-threaded execution (for benchmarking)
    #[arg(long)]
    sequential: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OverlapArg {
    /// The region that finds a foreign face also takes it
    Discoverer,
    /// Both regions take each other's seam face
    Mutual,
    /// No overlap
    Disjoint,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum InterpolatorArg {
    /// Straight-line blend per vertex
    Linear,
    /// Rotation-aware blend per leaf
    Rigid,
}

impl HierarchyArgs {
    fn options(&self) -> HierarchyOptions {
        let overlap = match self.overlap {
            OverlapArg::Discoverer => OverlapPolicy::Discoverer,
            OverlapArg::Mutual => OverlapPolicy::Mutual,
            OverlapArg::Disjoint => OverlapPolicy::Disjoint,
        };
        let options = HierarchyOptions::default()
            .with_branching(self.branching)
            .with_leaf_size(self.leaf_size)
            .with_depth_bound(self.depth_bound)
            .with_max_attempts(self.attempts)
            .with_overlap(overlap);
        match self.seed {
            Some(seed) => options.with_seed(seed),
            None => options,
        }
    }
}

impl MorphArgs {
    fn options(&self) -> MorphOptions {
        MorphOptions::default()
            .with_hierarchy(self.hierarchy.options())
            .with_compose(ComposeOptions::default().with_parallel(!self.sequential))
    }

    fn solver(&self) -> KabschSolver {
        KabschSolver::new(SolverOptions::default().with_refine_iterations(self.refine))
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult {
    match cli.command {
        Commands::Morph {
            source,
            target,
            output,
            t,
            morph,
        } => match morph.interpolator {
            InterpolatorArg::Linear => cmd_morph(&source, &target, &output, t, &morph, LinearInterpolator),
            InterpolatorArg::Rigid => {
                cmd_morph(&source, &target, &output, t, &morph, RigidBlendInterpolator::default())
            }
        },

        Commands::Sequence {
            source,
            target,
            out_dir,
            frames,
            extension,
            morph,
        } => {
            let frames = FrameOutput {
                dir: out_dir,
                frames,
                extension,
            };
            match morph.interpolator {
                InterpolatorArg::Linear => cmd_sequence(&source, &target, &frames, &morph, LinearInterpolator),
                InterpolatorArg::Rigid => {
                    cmd_sequence(&source, &target, &frames, &morph, RigidBlendInterpolator::default())
                }
            }
        }

        Commands::Hierarchy { source, hierarchy } => cmd_hierarchy(&source, &hierarchy),
    }
}

/// Create a progress reporter that draws a bar on stderr.
fn create_progress() -> Progress {
    let shown = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }
        let percent = if current >= total {
            100
        } else {
            (current * 100 + total / 2) / total
        };

        // Only redraw when the bar moves forward.
        let previous = shown.fetch_max(percent, Ordering::Relaxed);
        if percent <= previous && percent != 100 {
            return;
        }

        let width = 30;
        let filled = percent * width / 100;
        eprint!("\r[{}{}] {:3}% {}", "=".repeat(filled), " ".repeat(width - filled), percent, message);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn load_pair(source: &Path, target: &Path) -> Result<(HalfEdgeMesh, HalfEdgeMesh), Box<dyn std::error::Error>> {
    let source_mesh: HalfEdgeMesh = io::load(source)?;
    let target_mesh: HalfEdgeMesh = io::load(target)?;
    println!(
        "Loaded: {} vertices, {} faces",
        source_mesh.num_vertices(),
        source_mesh.num_faces()
    );
    Ok((source_mesh, target_mesh))
}

fn build_morpher<I: LeafInterpolator>(
    source: &Path,
    target: &Path,
    morph: &MorphArgs,
    interpolator: I,
) -> Result<Morpher<HalfEdgeMesh, I, KabschSolver>, Box<dyn std::error::Error>> {
    let (source_mesh, target_mesh) = load_pair(source, target)?;

    let start = Instant::now();
    let morpher = Morpher::with_parts(
        source_mesh,
        target_mesh,
        &morph.options(),
        interpolator,
        morph.solver(),
        &Progress::none(),
    )?;
    let stats = morpher.hierarchy().stats();
    println!(
        "Hierarchy: {} leaves, depth {}..{}, {} attempt(s) ({:.2?})",
        stats.leaf_count,
        stats.min_depth,
        stats.max_depth,
        stats.attempts,
        start.elapsed()
    );
    Ok(morpher)
}

fn cmd_morph<I: LeafInterpolator>(
    source: &Path,
    target: &Path,
    output: &Path,
    t: f64,
    morph: &MorphArgs,
    interpolator: I,
) -> CliResult {
    let mut morpher = build_morpher(source, target, morph, interpolator)?;

    let mode = if morph.sequential { "sequential" } else { "parallel" };
    println!("Interpolating at t = {} ({})...", t, mode);
    let start = Instant::now();
    let mesh = morpher.interpolate_mesh(t)?;
    let elapsed = start.elapsed();

    io::save(&mesh, output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);
    Ok(())
}

struct FrameOutput {
    dir: PathBuf,
    frames: usize,
    extension: String,
}

fn cmd_sequence<I: LeafInterpolator>(
    source: &Path,
    target: &Path,
    output: &FrameOutput,
    morph: &MorphArgs,
    interpolator: I,
) -> CliResult {
    if io::Format::from_extension(&output.extension).is_none() {
        return Err(format!("unsupported frame extension: {}", output.extension).into());
    }
    let mut morpher = build_morpher(source, target, morph, interpolator)?;

    let start = Instant::now();
    let frames = morpher.sequence_with_progress(output.frames, &create_progress())?;
    let elapsed = start.elapsed();

    std::fs::create_dir_all(&output.dir)?;
    for (k, points) in frames.iter().enumerate() {
        let mesh = morpher.source().with_positions(points)?;
        let path = output.dir.join(format!("frame_{:04}.{}", k, output.extension));
        io::save(&mesh, &path)?;
    }
    println!(
        "Saved: {} frames to {} ({:.2?})",
        frames.len(),
        output.dir.display(),
        elapsed
    );
    Ok(())
}

fn cmd_hierarchy(source: &Path, args: &HierarchyArgs) -> CliResult {
    let mesh: HalfEdgeMesh = io::load(source)?;
    println!("File: {}", source.display());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Faces: {}", mesh.num_faces());
    println!("Boundary edges: {}", mesh.num_boundary_halfedges());
    println!("Surface area: {:.4}", mesh.surface_area());
    if let Some((lo, hi)) = mesh.bounding_box() {
        println!(
            "Bounds: ({:.3}, {:.3}, {:.3}) - ({:.3}, {:.3}, {:.3})",
            lo.x, lo.y, lo.z, hi.x, hi.y, hi.z
        );
    }

    let options = args.options();
    let mut rng = options.rng();

    let start = Instant::now();
    let hierarchy = build_hierarchy_with_progress(&mesh, &options, &mut rng, &create_progress())?;
    let elapsed = start.elapsed();

    let stats = hierarchy.stats();
    println!("Attempts: {}", stats.attempts);
    println!("Nodes: {} ({} leaves)", stats.node_count, stats.leaf_count);
    println!("Leaf depth: {}..{} (bound {})", stats.min_depth, stats.max_depth, options.depth_bound);
    println!("Smallest patch: {} faces", stats.min_patch_faces);

    let mut leaf_sizes = Vec::new();
    hierarchy.root().walk(|_, node| {
        if node.is_leaf() {
            leaf_sizes.push(node.face_ids().len());
        }
    });
    if let (Some(min), Some(max)) = (leaf_sizes.iter().min(), leaf_sizes.iter().max()) {
        let avg = leaf_sizes.iter().sum::<usize>() as f64 / leaf_sizes.len() as f64;
        println!("Leaf faces: min={}, max={}, avg={:.1}", min, max, avg);
    }
    println!("Built in {:.2?}", elapsed);
    Ok(())
}
