use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tessera_edge::{DispatchPolicy, HostArg, HostView, Session};
use tessera_kernels::{cpu_matmul, fractal, KernelKind, MatrixDescriptor, FractalDescriptor, Strategy, Viewport, WorkerGroup};

const BANNER: &str = r#"
 _____ _____ ____ ____  _____ ____      _
|_   _| ____/ ___/ ___|| ____|  _ \    / \
  | | |  _| \___ \___ \|  _| | |_) |  / _ \
  | | | |___ ___) |__) | |___|  _ <  / ___ \
  |_| |_____|____/____/|_____|_| \_\/_/   \_\"#;

#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Tessera numeric kernels CLI",
    long_about = "Run and inspect the Tessera guest kernels natively.\n\nThe same boundary, dispatcher and kernels that ship in the WASM build\nrun here, so plans, crossing counts and outputs match the browser.",
    version,
)]
struct Cli {
    /// Log dispatch decisions and per-call summaries
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show platform info and the active dispatch policy
    Info {
        /// Dispatch policy JSON file
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Compare naive, cache-blocked and parallel kernels
    Bench {
        /// Matrix sizes to benchmark (comma-separated)
        #[arg(long, default_value = "64,128,256,512")]
        sizes: String,
        /// Worker threads for the parallel strategy (0 = all cores)
        #[arg(long, default_value = "0")]
        workers: usize,
    },
    /// Hash a string with hashMix
    Hash {
        /// Input text (hashed as UTF-8 bytes)
        data: String,
        /// Number of passes over the input
        #[arg(long, default_value = "1000")]
        iterations: u32,
        /// Dispatch policy JSON file
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Render a fractal and print summary statistics
    Fractal {
        #[arg(long, default_value = "640")]
        width: usize,
        #[arg(long, default_value = "480")]
        height: usize,
        #[arg(long, default_value = "-2.5", allow_hyphen_values = true)]
        xmin: f64,
        #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
        xmax: f64,
        #[arg(long, default_value = "-1.25", allow_hyphen_values = true)]
        ymin: f64,
        #[arg(long, default_value = "1.25", allow_hyphen_values = true)]
        ymax: f64,
        #[arg(long, default_value = "100")]
        max_iterations: u32,
        /// Dispatch policy JSON file
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Show the plan the dispatcher would pick
    Plan {
        /// matrix, fractal, hash or ray
        kernel: String,
        /// Work size compared against the kernel's threshold
        size: usize,
        /// Dispatch policy JSON file
        #[arg(long)]
        policy: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Info { policy } => load_policy(policy).map(|p| cmd_info(&p)),
        Commands::Bench { sizes, workers } => {
            cmd_bench(&sizes, workers);
            Ok(())
        }
        Commands::Hash { data, iterations, policy } => load_policy(policy).and_then(|p| cmd_hash(&p, &data, iterations)),
        Commands::Fractal { width, height, xmin, xmax, ymin, ymax, max_iterations, policy } => load_policy(policy)
            .and_then(|p| cmd_fractal(&p, width, height, Viewport::new(xmin, xmax, ymin, ymax), max_iterations)),
        Commands::Plan { kernel, size, policy } => load_policy(policy).and_then(|p| cmd_plan(&p, &kernel, size)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "trace" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn load_policy(path: Option<PathBuf>) -> Result<DispatchPolicy, String> {
    match path {
        Some(path) => {
            let policy = DispatchPolicy::from_file(&path).map_err(|e| format!("{}: {}", path.display(), e))?;
            tracing::info!("loaded dispatch policy from {}", path.display());
            Ok(policy)
        }
        None => Ok(DispatchPolicy::host_default()),
    }
}

fn cmd_info(policy: &DispatchPolicy) {
    println!("{}", BANNER);
    println!("  v{}  -  numeric kernels behind a guest boundary\n", env!("CARGO_PKG_VERSION"));

    println!("Platform");
    println!("  OS:      {}", std::env::consts::OS);
    println!("  Arch:    {}", std::env::consts::ARCH);
    println!("  Endian:  {}", if cfg!(target_endian = "little") { "little (bulk copies are memcpy)" } else { "big (bulk copies swap)" });

    println!("\nKernels");
    let kernels = [
        ("matrix",  "f64 n x n matmul, transposed B, 64/8 tiles, 2x2 micro-kernel"),
        ("fractal", "escape-time counts, 64x64 tiles, lanes of 4"),
        ("hash",    "multiply-rotate hash, single-lane or laned"),
        ("ray",     "one sphere, Lambert shading, stratified samples"),
    ];
    for (name, desc) in kernels {
        println!("  {:<9} {}", name, desc);
    }

    println!("\nDispatch policy");
    for line in policy.to_json().lines() {
        println!("  {}", line);
    }

    println!("\n{}", Session::new(policy.clone()).info());
}

fn time<F: FnMut()>(iters: usize, mut f: F) -> f64 {
    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn gflops(n: usize, secs: f64) -> f64 {
    (2.0 * (n as f64).powi(3)) / secs / 1e9
}

fn cmd_bench(sizes_str: &str, workers: usize) {
    let sizes: Vec<usize> = sizes_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    let workers = if workers == 0 {
        tessera_edge::ExecutionContext::detect_host().workers()
    } else {
        workers
    };
    let group = WorkerGroup::new(workers);
    let single = WorkerGroup::cooperative();

    println!("=== Tessera Matmul Benchmark ===");
    println!("Parallel strategy: {} worker(s)\n", group.workers());

    println!("{:<10} {:>12} {:>12} {:>12} {:>9} {:>10}",
        "Size", "Naive (ms)", "Tiled (ms)", "Par (ms)", "Speedup", "Par GF/s");
    println!("{}", "-".repeat(70));

    for &n in &sizes {
        let a: Vec<f64> = (0..n * n).map(|i| ((i * 7 + 3) % 13) as f64 * 0.1 - 0.6).collect();
        let b: Vec<f64> = (0..n * n).map(|i| ((i * 11 + 5) % 17) as f64 * 0.1 - 0.8).collect();
        let desc = MatrixDescriptor::new(n);

        let iters = if n <= 64 { 50 } else if n <= 128 { 10 } else if n <= 256 { 3 } else { 1 };

        let naive_s = time(iters, || {
            let _ = cpu_matmul::matmul_f64(&a, &b, &desc, Strategy::Naive, &single);
        });
        let tiled_s = time(iters, || {
            let _ = cpu_matmul::matmul_f64(&a, &b, &desc, Strategy::CacheBlocked, &single);
        });
        let par_s = time(iters, || {
            let _ = cpu_matmul::matmul_f64(&a, &b, &desc, Strategy::Parallel, &group);
        });

        println!("{:<10} {:>10.3}ms {:>10.3}ms {:>10.3}ms {:>8.1}x {:>10.2}",
            format!("{}x{}", n, n),
            naive_s * 1e3, tiled_s * 1e3, par_s * 1e3,
            naive_s / par_s, gflops(n, par_s));
    }

    println!("\n=== Tessera Fractal Benchmark ===");
    let desc = FractalDescriptor::new(800, 600, Viewport::default(), 200);
    for strategy in [Strategy::Naive, Strategy::CacheBlocked, Strategy::Parallel] {
        let g = if strategy.is_multi_lane() { &group } else { &single };
        let secs = time(3, || {
            let _ = fractal::generate(&desc, strategy, g);
        });
        println!("  {:<14} {:>10.3}ms", strategy.to_string(), secs * 1e3);
    }
}

fn cmd_hash(policy: &DispatchPolicy, data: &str, iterations: u32) -> Result<(), String> {
    let session = Session::new(policy.clone());
    let traced = session
        .hash_digest_traced(HostView::Contiguous(data.as_bytes()), iterations)
        .map_err(|e| e.to_failure().to_json())?;
    let digest = traced.output;

    println!("0x{:08x}", digest.value);
    println!("{}", serde_json::to_string(&traced.invocation).map_err(|e| e.to_string())?);
    println!("variant: {:?}", digest.variant);
    Ok(())
}

fn cmd_fractal(policy: &DispatchPolicy, width: usize, height: usize, viewport: Viewport, max_iterations: u32) -> Result<(), String> {
    let session = Session::new(policy.clone());
    let args = [
        HostArg::Number(width as f64),
        HostArg::Number(height as f64),
        HostArg::Number(viewport.xmin),
        HostArg::Number(viewport.xmax),
        HostArg::Number(viewport.ymin),
        HostArg::Number(viewport.ymax),
        HostArg::Number(max_iterations as f64),
    ];

    let start = Instant::now();
    let traced = session.fractal_generate_traced(&args).map_err(|e| e.to_failure().to_json())?;
    let elapsed = start.elapsed();
    let invocation = traced.invocation;
    let counts = traced.output.to_elements::<i32>().map_err(|e| e.to_string())?;

    let inside = counts.iter().filter(|&&c| c as u32 == max_iterations).count();
    let mean = if counts.is_empty() {
        0.0
    } else {
        counts.iter().map(|&c| c as f64).sum::<f64>() / counts.len() as f64
    };

    println!("{}x{} pixels in {:.3}ms", width, height, elapsed.as_secs_f64() * 1e3);
    println!("  inside set:      {} ({:.1}%)", inside, 100.0 * inside as f64 / counts.len().max(1) as f64);
    println!("  mean iterations: {:.2}", mean);
    println!("  plan:            {} on {} worker(s)", invocation.plan.strategy, invocation.plan.workers);
    println!("  crossings:       {}", invocation.crossings.total());
    Ok(())
}

fn cmd_plan(policy: &DispatchPolicy, kernel: &str, size: usize) -> Result<(), String> {
    let kind = match kernel {
        "matrix" => KernelKind::Matrix,
        "fractal" => KernelKind::Fractal,
        "hash" => KernelKind::Hash,
        "ray" => KernelKind::Ray,
        other => return Err(format!("unknown kernel '{}' (expected matrix, fractal, hash or ray)", other)),
    };
    let plan = policy.select(kind, size);
    println!("{}", serde_json::to_string_pretty(&plan).map_err(|e| e.to_string())?);
    Ok(())
}
