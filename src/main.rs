//! Git Deploy Agent
//!
//! Usage:
//! - Normal mode: `git-deploy-agent`
//! - With custom port: `git-deploy-agent --port 19999`

use git_deploy_agent::RuntimeConfig;

/// 解析命令行参数
fn parse_args(args: &[String]) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("Git Deploy Agent - clone, restore, build and run a project");
    println!();
    println!("USAGE:");
    println!("    git-deploy-agent [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port");
    println!("    -h, --help       Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    PORT                        Listening port (default 5000)");
    println!("    DEPLOY_WORKSPACE_ROOT       Scratch directory for workspaces (default: system temp)");
    println!("    DEPLOY_GIT_PATH             git executable (default: git)");
    println!("    DEPLOY_DOTNET_PATH          dotnet executable (default: dotnet)");
    println!("    DEPLOY_STEP_TIMEOUT_SECS    Per-step timeout, 0 or unset waits forever");
    println!("    DEPLOY_FAILURE_POLICY       continue | halt (default: continue)");
    println!("    DEPLOY_WORKSPACE_CLEANUP    retain | delete (default: retain)");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let config = parse_args(&args);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };
    rt.block_on(async {
        git_deploy_agent::init_and_run_agent_with_config(config).await;
    });
}
