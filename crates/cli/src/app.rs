//! Wires parsed arguments into a batch run and maps the result to an
//! exit code.

use comfyvid_comfyui::api::ComfyUIApi;
use comfyvid_core::error::CoreError;
use comfyvid_core::template::{builtin_template, load_template};
use comfyvid_core::workflow::{OverrideTargets, WorkflowGraph};
use comfyvid_pipeline::batch::{run_batch, BatchPlan};
use comfyvid_pipeline::controller::JobController;
use comfyvid_pipeline::error::{EXIT_CONFIGURATION, EXIT_SUCCESS};

use crate::args::Args;

/// Exit status for command-line usage errors.
pub const EXIT_USAGE: u8 = 64;

/// Run the batch described by `args`.
///
/// Each saved file path is printed to stdout as soon as it is written.
/// Returns the process exit status.
pub async fn run(args: &Args) -> u8 {
    let template = match resolve_template(args) {
        Ok(template) => template,
        Err(e) => return configuration_error(&e),
    };

    let base_seed = args.base_seed();
    let plan = match BatchPlan::new(&args.batch_config(base_seed)) {
        Ok(plan) => plan,
        Err(e) => return configuration_error(&e),
    };

    let api = match ComfyUIApi::with_connect_timeout(args.host.clone(), args.connect_timeout()) {
        Ok(api) => api,
        Err(e) => {
            tracing::error!(host = %args.host, error = %e, "Failed to build HTTP client");
            return EXIT_CONFIGURATION;
        }
    };

    let controller = match JobController::new(
        api,
        template,
        OverrideTargets::default(),
        args.poll_settings(),
    ) {
        Ok(controller) => controller,
        Err(e) => return configuration_error(&e),
    };

    tracing::info!(
        host = %controller.transport().api_url(),
        count = plan.len(),
        base_seed,
        "Starting batch",
    );

    let result = run_batch(&controller, &plan, |outcome| {
        println!("{}", outcome.out_path.display());
    })
    .await;

    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(failure) => failure.exit_code(),
    }
}

fn resolve_template(args: &Args) -> Result<WorkflowGraph, CoreError> {
    match &args.workflow {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading workflow template");
            load_template(path)
        }
        None => builtin_template(),
    }
}

fn configuration_error(error: &CoreError) -> u8 {
    tracing::error!(error = %error, "Invalid configuration");
    EXIT_CONFIGURATION
}
