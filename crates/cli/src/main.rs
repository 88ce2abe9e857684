use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use polycert::cfg::LpCfg;
use polycert::io::{write_ext, write_ine};
use polycert::polytope::{Engine, Polytope};
use polycert::Vector;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::SubscriberBuilder;

mod provenance;

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Certified polytope conversions and queries on cdd files")]
struct Cmd {
    /// Log the DD and LP internals
    #[arg(long, global = true)]
    verbose: bool,

    /// LP feasibility tolerance
    #[arg(long, global = true, default_value_t = 1e-9)]
    tolerance: f64,

    /// Wall-clock budget of one LP solve
    #[arg(long, global = true, default_value_t = 4000)]
    timeout_ms: u64,

    #[command(subcommand)]
    action: Action,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineArg {
    Dd,
    Lp,
}

impl From<EngineArg> for Engine {
    fn from(e: EngineArg) -> Self {
        match e {
            EngineArg::Dd => Engine::Dd,
            EngineArg::Lp => Engine::Lp,
        }
    }
}

#[derive(Subcommand)]
enum Action {
    /// Enumerate the vertices of an H-representation (.ine → .ext)
    Vertices {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Hull of a V-representation, minimized (.ext → .ine)
    Facets {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print dimension, facet counts, emptiness and tight box as JSON
    Info {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = EngineArg::Dd)]
        engine: EngineArg,
    },
    /// Certified upper bound of `row·x` over the polytope
    Bound {
        #[arg(long)]
        input: PathBuf,
        /// Comma-separated coefficients, e.g. "1,2,3"
        #[arg(long)]
        row: String,
        #[arg(long, value_enum, default_value_t = EngineArg::Dd)]
        engine: EngineArg,
    },
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    let cmd = Cmd::parse();
    let level = if cmd.verbose { Level::DEBUG } else { Level::INFO };
    SubscriberBuilder::default()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    let cfg = LpCfg {
        timeout: Duration::from_millis(cmd.timeout_ms),
        tolerance: cmd.tolerance,
        ..LpCfg::default()
    };
    match cmd.action {
        Action::Vertices { input, out } => emit(vertices(&input)?, out, json!({"cmd": "vertices", "input": input.display().to_string()})),
        Action::Facets { input, out } => emit(facets(&input)?, out, json!({"cmd": "facets", "input": input.display().to_string()})),
        Action::Info { input, engine } => {
            let info = info(&input, engine.into(), cfg)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Action::Bound { input, row, engine } => {
            let b = bound(&input, &row, engine.into(), cfg)?;
            println!("{}", json!({"row": row, "bound": b}));
            Ok(())
        }
        Action::Report => report(),
    }
}

/// Load a polytope from a `.ine` or `.ext` file.
fn load(input: &Path, engine: Engine, cfg: LpCfg) -> Result<Polytope> {
    let p = match input.extension().and_then(|e| e.to_str()) {
        Some("ine") => Polytope::from_ine_file(input),
        Some("ext") => Polytope::from_ext_file(input),
        _ => bail!("{}: expected a .ine or .ext file", input.display()),
    }
    .with_context(|| format!("reading {}", input.display()))?;
    tracing::info!(input = %input.display(), dim = p.dim(), "loaded");
    Ok(p.with_engine(engine).with_lp_cfg(cfg))
}

fn vertices(input: &Path) -> Result<String> {
    let p = load(input, Engine::Dd, LpCfg::default())?;
    let points: Vec<Vector> = p.vertices().iter().map(|v| v.mid()).collect();
    tracing::info!(count = points.len(), "vertices");
    Ok(write_ext(p.dim(), &points))
}

fn facets(input: &Path) -> Result<String> {
    let p = load(input, Engine::Dd, LpCfg::default())?;
    p.minimize_constraints();
    let bbox = p.bbox(true);
    tracing::info!(facets = ?p.nb_facets(), "facets");
    Ok(write_ine(&p.facets(), &bbox))
}

#[derive(Debug, Serialize)]
struct Info {
    dim: usize,
    nb_facets: Option<usize>,
    nb_eq_facets: Option<usize>,
    empty: bool,
    flat: bool,
    /// `[lb, ub]` per coordinate; absent when empty.
    bbox: Option<Vec<[f64; 2]>>,
}

fn info(input: &Path, engine: Engine, cfg: LpCfg) -> Result<Info> {
    let p = load(input, engine, cfg)?;
    let empty = p.is_empty(true);
    let bbox = (!empty).then(|| p.bbox(true).iter().map(|c| [c.lb(), c.ub()]).collect());
    Ok(Info {
        dim: p.dim(),
        nb_facets: p.nb_facets(),
        nb_eq_facets: p.nb_eq_facets(),
        empty,
        flat: !empty && p.is_flat(),
        bbox,
    })
}

fn parse_row(row: &str) -> Result<Vector> {
    let coeffs = row
        .split(',')
        .map(|t| t.trim().parse::<f64>().with_context(|| format!("bad coefficient `{t}`")))
        .collect::<Result<Vec<f64>>>()?;
    Ok(Vector::from_vec(coeffs))
}

fn bound(input: &Path, row: &str, engine: Engine, cfg: LpCfg) -> Result<f64> {
    let p = load(input, engine, cfg)?;
    let row = parse_row(row)?;
    if row.len() != p.dim() {
        bail!("row has {} coefficients, polytope has dimension {}", row.len(), p.dim());
    }
    Ok(p.bound_row(&row))
}

/// Print `text`, or write it to `out` with a provenance sidecar.
fn emit(text: String, out: Option<PathBuf>, params: serde_json::Value) -> Result<()> {
    let Some(out) = out else {
        print!("{text}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(&out, text).with_context(|| format!("writing {}", out.display()))?;
    let sidecar = provenance::write_sidecar(&out, provenance::Payload::new(params))?;
    tracing::info!(out = %out.display(), sidecar = %sidecar.display(), "written");
    Ok(())
}

fn report() -> Result<()> {
    let obj = json!({
        "code_rev": provenance::current_git_rev(),
        "polycert": polycert::VERSION,
        "params": {},
        "outputs": []
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polycert::io::{parse_ext, parse_ine};
    use std::fs;
    use tempfile::tempdir;

    const SQUARE: &str = "H-representation\nbegin\n5 3 real\n0 1 0\n1 -1 0\n0 0 1\n1 0 -1\n3/2 -1 -1\nend\n";

    fn write_square(dir: &Path) -> PathBuf {
        let path = dir.join("square.ine");
        fs::write(&path, SQUARE).unwrap();
        path
    }

    #[test]
    fn vertices_of_a_cut_square() {
        let dir = tempdir().unwrap();
        let text = vertices(&write_square(dir.path())).unwrap();
        let (dim, pts) = parse_ext(&text).unwrap();
        assert_eq!(dim, 2);
        assert_eq!(pts.len(), 5);
        assert!(pts.iter().any(|p| (p[0] - 1.0).abs() < 1e-9 && (p[1] - 0.5).abs() < 1e-9));
    }

    #[test]
    fn facets_round_trip_through_ext() {
        let dir = tempdir().unwrap();
        let ext = dir.path().join("square.ext");
        emit(vertices(&write_square(dir.path())).unwrap(), Some(ext.clone()), json!({})).unwrap();
        assert!(dir.path().join("square.provenance.json").exists());
        let facets = parse_ine(&facets(&ext).unwrap()).unwrap();
        assert_eq!(facets.dim(), 2);
        // four axis rows plus the diagonal cut
        assert_eq!(facets.nb_facets(), 5);
    }

    #[test]
    fn info_and_bound_agree_across_engines() {
        let dir = tempdir().unwrap();
        let input = write_square(dir.path());
        for engine in [Engine::Dd, Engine::Lp] {
            let info = info(&input, engine, LpCfg::default()).unwrap();
            assert_eq!(info.dim, 2);
            assert!(!info.empty && !info.flat);
            let bbox = info.bbox.unwrap();
            assert!((bbox[0][1] - 1.0).abs() < 1e-9);
            let b = bound(&input, "1, 1", engine, LpCfg::default()).unwrap();
            assert!(b >= 1.5 && b < 1.5 + 1e-6);
        }
    }

    #[test]
    fn bad_inputs_are_reported() {
        let dir = tempdir().unwrap();
        let input = write_square(dir.path());
        assert!(bound(&input, "1,2,3", Engine::Dd, LpCfg::default()).is_err());
        assert!(bound(&input, "1,x", Engine::Dd, LpCfg::default()).is_err());
        let csv = dir.path().join("square.csv");
        fs::write(&csv, SQUARE).unwrap();
        assert!(info(&csv, Engine::Dd, LpCfg::default()).is_err());
        let broken = dir.path().join("broken.ine");
        fs::write(&broken, "begin\n2 3 real\n0 1 0\n").unwrap();
        assert!(vertices(&broken).is_err());
    }
}
