use std::path::Path;

use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use geoharmonize::{
    Fixtures, GraphStats, ImageSummary, LocalEngine, MissingBandWarning, PipelineParams,
    SpectralIndex, Stage, api,
};

use super::args::{CliArgs, Command};
use super::errors::AppError;

#[derive(Serialize)]
struct RunOutput<'a> {
    stages: &'a [Stage],
    stats: GraphStats,
    warnings: &'a [MissingBandWarning],
    images: Vec<ImageSummary>,
}

fn load_params(
    config: &Path,
    indices: Option<Vec<SpectralIndex>>,
) -> Result<PipelineParams, AppError> {
    if !config.exists() {
        return Err(AppError::MissingConfig {
            path: config.display().to_string(),
        });
    }
    let mut params = PipelineParams::from_path(config)?;
    if let Some(indices) = indices {
        info!("overriding configured indices with {:?}", indices);
        params.indices = indices;
    }
    Ok(params)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), AppError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match args.command {
        Command::Plan {
            config,
            indices,
            pretty,
        } => {
            let params = load_params(&config, indices)?;
            let plan = api::plan(&params).map_err(AppError::from)?;
            info!("stages: {:?}", plan.stages);
            print_json(&plan, pretty)?;
        }
        Command::Run {
            config,
            fixtures,
            indices,
            pretty,
        } => {
            let params = load_params(&config, indices)?;
            if !fixtures.exists() {
                return Err(AppError::MissingFixtures {
                    path: fixtures.display().to_string(),
                }
                .into());
            }
            let engine = LocalEngine::from_fixtures(
                Fixtures::from_path(&fixtures).map_err(AppError::from)?,
            );
            let result = api::run(&params, &engine).map_err(AppError::from)?;

            info!("Run complete: {}", result.plan.stats);
            print_json(
                &RunOutput {
                    stages: &result.plan.stages,
                    stats: result.plan.stats,
                    warnings: &result.output.warnings,
                    images: api::summarize(&result.output.images),
                },
                pretty,
            )?;
        }
    }

    Ok(())
}
