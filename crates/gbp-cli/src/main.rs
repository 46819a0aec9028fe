mod cli;

use anyhow::Context;
use cli::DumpDefault;
use gbp_config::Config;
use gbp_contour::{ContourConfig, ContourManager};
use gbp_factorgraph::FactorGraph;
use gbp_linalg::{Float, Vector};
use ndarray::array;
use tracing_subscriber::EnvFilter;

fn contour_config_from(section: &gbp_config::ContourSection) -> ContourConfig {
    ContourConfig {
        transition_noise: section.transition_noise,
        line_factor_huber_distance: section.line_factor_huber_distance,
        birth_line_variance: section.birth_line_variance,
        death_node_sigma: section.death_node_sigma,
        line_measurement_noise: section.line_measurement_noise,
        line_merge_residual: section.line_merge_residual,
        max_iterations_per_measurement: section.max_iterations_per_measurement,
        num_initial_nodes: section.num_initial_nodes,
        use_huber: section.use_huber,
    }
}

/// Deterministic stand-in for a sensor feed: an L-shaped point cloud that
/// straightens out over successive frames, so the demo exercises both birth
/// (the bend) and convergence. No RNG; generating randomized measurements is
/// left to whatever calls this demo as a library.
fn synthetic_frame(frame: usize, points_per_frame: usize) -> Vec<Vector<Float>> {
    let bend = 1.0 - (frame as Float * 0.1).min(1.0);
    let half = points_per_frame / 2;
    let mut points = Vec::with_capacity(points_per_frame);
    for i in 0..half {
        let t = i as Float / (half.max(1) - 1).max(1) as Float;
        points.push(array![t, bend * 0.0]);
    }
    for i in 0..(points_per_frame - half) {
        let t = i as Float / (points_per_frame - half).max(1) as Float;
        points.push(array![1.0 - bend * t * 0.5, t]);
    }
    points
}

fn init_tracing(level_from_config: &str, verbose: u8) {
    let level = match verbose {
        0 => level_from_config.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let cli = cli::parse_arguments();

    if cli.dump_default == Some(DumpDefault::Config) {
        let default_config = Config::default();
        println!("{}", toml::to_string_pretty(&default_config).context("serializing the default config")?);
        return Ok(());
    }

    let config = match gbp_config::read_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(gbp_config::ConfigReaderError::NoConfigFile) => Config::default(),
        Err(error) => return Err(error).context("reading configuration"),
    };

    init_tracing(&config.logging.level, cli.verbose);

    let manager = ContourManager::new(contour_config_from(&config.contour));
    let mut graph = FactorGraph::new();
    let chain = manager.seed(&mut graph, array![0.0, 0.0], array![1.0, 1.0]);

    let num_frames = cli.frames.unwrap_or(config.simulation.num_frames);
    let mut chain = chain;
    for frame in 0..num_frames {
        let span = tracing::info_span!("frame", frame);
        let _guard = span.enter();

        let measurements = synthetic_frame(frame, config.simulation.points_per_frame);
        let result = manager.process_frame(&mut graph, chain, &measurements)?;
        tracing::info!(
            nodes = result.nodes.len(),
            gbp_iterations = result.gbp_iterations,
            topology_passes = result.topology_passes,
            "frame fitted"
        );
        chain = result.nodes;
    }

    println!("final chain has {} nodes", chain.len());
    for &id in &chain {
        let variable = graph.variable(id).expect("every chain id was just returned by process_frame");
        println!("  {:?} -> mean {:?}", id, variable.mean());
    }

    Ok(())
}
