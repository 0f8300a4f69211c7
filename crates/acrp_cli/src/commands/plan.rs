//! Plan command - Show what a request would provision.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::RequestArgs;

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Print the desired state handed to the backend as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: PlanArgs) -> Result<()> {
    let request = args.request.load()?;
    let plan = request.plan(&args.request.validator())?;
    info!("Planned {} scope map(s) for {}", plan.assignments.len(), plan.registry.name);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan.desired_state)?);
        return Ok(());
    }

    println!("📦 Registry {} ({})", plan.registry.name, plan.registry.environment);
    println!("   Login server: {}", plan.login_server());
    println!("   State handle: {}", plan.desired_state.handle);

    if plan.assignments.is_empty() {
        println!("   No team scope maps");
    } else {
        println!("🔑 Scope maps and tokens:");
        for assignment in &plan.assignments {
            println!(
                "   - {} / {} [{}]",
                assignment.scope_map_name,
                assignment.token_name,
                assignment.teams.join(", ")
            );
        }
    }

    if let Some(names) = &plan.private_endpoint {
        println!("🔒 Private endpoint: {} ({})", names.endpoint, names.service_connection);
    }

    Ok(())
}
