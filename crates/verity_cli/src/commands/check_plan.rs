//! Check-plan command - Validate a verification plan offline.

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::ExitCodes;

#[derive(Args, Debug)]
pub struct CheckPlanArgs {
    #[command(flatten)]
    pub plan: super::PlanArgs,
}

pub async fn execute(args: CheckPlanArgs) -> Result<u8> {
    info!("Checking plan {}", args.plan.plan.display());
    let plan = args.plan.load()?;

    println!("📋 Plan: {}", plan.name);
    println!("   Template: {}", plan.template_dir.display());
    if !plan.template_dir.is_dir() {
        println!("   ❌ Template directory does not exist");
        return Ok(ExitCodes::INVALID_ARGS);
    }
    for (key, value) in &plan.vars {
        println!("   var {} = {}", key, value);
    }
    println!("   Outputs: {}", plan.expected_outputs.join(", "));
    println!(
        "   Retry: {} attempt(s), {}ms initial backoff",
        plan.retry.max_attempts, plan.retry.initial_backoff_ms
    );
    if let Some(secs) = plan.timeout_seconds {
        println!("   Timeout: {}s", secs);
    }

    for target in &plan.targets {
        println!(
            "\n🎯 {} ({} @ {})",
            target.name, target.resource_type, target.api_version
        );
        println!(
            "   resource: {}/{}",
            target.resource_group_output, target.resource_name_output
        );
        for check in &target.checks {
            println!(
                "   - {}: {} {} {}",
                check.name,
                check.expected,
                check.compare.as_str(),
                check.observed
            );
        }
    }

    println!(
        "\n✅ Plan is valid: {} target(s), {} check(s)",
        plan.targets.len(),
        plan.check_count()
    );
    Ok(ExitCodes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::PlanArgs;

    const PLAN: &str = r#"
name: vmss-capacity
template_dir: ./Test
expected_outputs: [resource_group_name, vmss_name, vmss_capacity]
targets:
  - name: scale-set
    resource_type: Microsoft.Compute/virtualMachineScaleSets
    api_version: "2019-07-01"
    resource_group_output: resource_group_name
    resource_name_output: vmss_name
    checks:
      - name: capacity
        expected: vmss_capacity
        observed: sku.capacity
        compare: int_equals
"#;

    fn args(plan: std::path::PathBuf) -> CheckPlanArgs {
        CheckPlanArgs {
            plan: PlanArgs {
                plan,
                vars: Vec::new(),
                template_dir: None,
            },
        }
    }

    #[tokio::test]
    async fn test_valid_plan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Test")).unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, PLAN).unwrap();

        assert_eq!(execute(args(path)).await.unwrap(), ExitCodes::SUCCESS);
    }

    #[tokio::test]
    async fn test_missing_template_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, PLAN).unwrap();

        assert_eq!(execute(args(path)).await.unwrap(), ExitCodes::INVALID_ARGS);
    }

    #[tokio::test]
    async fn test_invalid_plan_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, PLAN.replace("expected: vmss_capacity", "expected: nope")).unwrap();

        assert!(execute(args(path)).await.is_err());
    }

    #[tokio::test]
    async fn test_shipped_agent_pool_plan() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../plans/agent-pool.yaml");

        assert_eq!(execute(args(path)).await.unwrap(), ExitCodes::SUCCESS);
    }
}
