use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use devstack_dns::config::DEFAULT_TOOL;
use devstack_dns::{
    DnsConfigurationResult, DnsManager, DnsProviderKind, EnabledService, EngineConfig, Exposure,
    OperationReport, Platform, PrivilegedExecutor, ProjectFile, ProviderDetector, SystemExecutor,
    util,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Configure local DNS so a development stack answers on *.<project>.local
#[derive(Parser, Debug)]
#[command(name = "devstack-dns")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). Defaults to RUST_LOG or warn.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Resolve every system path under this directory instead of /
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Tool name used in hosts markers and config file names
    #[arg(long, global = true)]
    tool: Option<String>,

    /// Project file (TOML) providing the project name and services
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Target {
    /// Project name (defaults to the project file's)
    project: Option<String>,

    /// Provider to use instead of the recommended one
    #[arg(short, long)]
    provider: Option<DnsProviderKind>,
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Enabled service as NAME or NAME:proxy / NAME:port (repeatable)
    #[arg(short, long = "service", value_name = "NAME[:EXPOSURE]", value_parser = parse_service)]
    services: Vec<EnabledService>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List usable providers, best first
    Detect {
        /// Project name (defaults to the project file's)
        project: Option<String>,
    },
    /// Show what apply would do
    Plan {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        services: ServiceArgs,
    },
    /// Write the DNS configuration
    Apply {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        services: ServiceArgs,
    },
    /// Remove the DNS configuration
    Cleanup {
        #[command(flatten)]
        target: Target,
    },
    /// Show which projects and providers are configured
    Status {
        /// Project name; without it, lists projects in the hosts file
        project: Option<String>,
    },
}

fn parse_service(value: &str) -> std::result::Result<EnabledService, String> {
    let (name, exposure) = match value.split_once(':') {
        None => (value, Exposure::Proxy),
        Some((name, "proxy")) => (name, Exposure::Proxy),
        Some((name, "port")) => (name, Exposure::Port),
        Some((_, other)) => return Err(format!("unknown exposure {other:?}, expected proxy or port")),
    };
    if name.is_empty() {
        return Err("service name is empty".into());
    }
    Ok(EnabledService {
        name: name.to_string(),
        exposure,
    })
}

fn init_logging(level: Option<&str>) {
    let filter = level.map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        EnvFilter::new,
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// CLI flags merged with the optional project file.
struct Session {
    config: EngineConfig,
    platform: Platform,
    file: Option<ProjectFile>,
}

impl Session {
    fn load(cli: &Cli) -> Result<Self> {
        let file = cli
            .config
            .as_deref()
            .map(|path| {
                ProjectFile::load(path)
                    .with_context(|| format!("failed to load project file {}", path.display()))
            })
            .transpose()?;

        let tool = cli
            .tool
            .clone()
            .or_else(|| file.as_ref().and_then(|f| f.tool.clone()))
            .unwrap_or_else(|| DEFAULT_TOOL.to_string());
        let mut config = EngineConfig::new(tool);
        if let Some(root) = &cli.root {
            config = config.with_root(root);
        }

        Ok(Self {
            config,
            platform: Platform::current(),
            file,
        })
    }

    fn project(&self, arg: Option<&str>) -> Result<String> {
        match (arg, &self.file) {
            (Some(project), _) => Ok(project.to_string()),
            (None, Some(file)) => Ok(file.project.clone()),
            (None, None) => bail!("no project given; pass a project name or --config FILE"),
        }
    }

    fn services(&self, args: Option<&ServiceArgs>) -> Vec<EnabledService> {
        match args {
            Some(args) if !args.services.is_empty() => args.services.clone(),
            _ => self
                .file
                .as_ref()
                .map(|f| f.services.clone())
                .unwrap_or_default(),
        }
    }

    fn detector(&self) -> ProviderDetector<SystemExecutor> {
        ProviderDetector::new(SystemExecutor, self.config.clone(), self.platform.clone())
    }

    fn manager(&self, services: Vec<EnabledService>) -> DnsManager<SystemExecutor> {
        DnsManager::new(self.config.clone(), self.platform.clone())
            .with_privileged(PrivilegedExecutor::new(SystemExecutor))
            .with_services(services)
    }

    fn provider(&self, project: &str, requested: Option<DnsProviderKind>) -> DnsProviderKind {
        requested.unwrap_or_else(|| {
            self.detector()
                .recommend(project)
                .map_or(DnsProviderKind::Manual, |p| p.kind)
        })
    }
}

fn print_plan(plan: &DnsConfigurationResult) {
    println!("Provider:  {}", plan.kind);
    println!("Automatic: {}", if plan.automatic { "yes" } else { "no" });
    if let Some(path) = &plan.config_path {
        println!("Path:      {}", path.display());
    }
    if let Some(restart) = &plan.restart_command {
        println!("Restart:   {restart}");
    }
    if let Some(content) = &plan.config_content {
        println!("\n{content}");
    }
    for line in &plan.instructions {
        println!("{line}");
    }
}

fn print_report(report: &OperationReport) {
    for message in &report.messages {
        println!("{message}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    if util::is_root() {
        tracing::warn!("Running as root; commands are still prefixed with pkexec/sudo");
    }

    let ctx = Session::load(&cli)?;

    match &cli.command {
        Command::Detect { project } => {
            let project = ctx.project(project.as_deref())?;
            let available = ctx.detector().detect_available(&project);
            for (i, provider) in available.iter().enumerate() {
                let marker = if i == 0 { " (recommended)" } else { "" };
                println!(
                    "{:<18} {}{marker}",
                    provider.kind.as_str(),
                    provider.config_path.display()
                );
            }
        }
        Command::Plan { target, services } => {
            let project = ctx.project(target.project.as_deref())?;
            let kind = ctx.provider(&project, target.provider);
            let plan = ctx
                .manager(ctx.services(Some(services)))
                .plan_configuration(&project, kind, None)?;
            print_plan(&plan);
        }
        Command::Apply { target, services } => {
            let project = ctx.project(target.project.as_deref())?;
            let kind = ctx.provider(&project, target.provider);
            tracing::info!(project = %project, provider = %kind, "Applying DNS configuration");
            let report = ctx.manager(ctx.services(Some(services))).apply(&project, kind);
            print_report(&report);
            if !report.success {
                std::process::exit(1);
            }
        }
        Command::Cleanup { target } => {
            let project = ctx.project(target.project.as_deref())?;
            let kind = ctx.provider(&project, target.provider);
            let report = ctx.manager(ctx.services(None)).cleanup(&project, kind);
            print_report(&report);
            if !report.success {
                std::process::exit(1);
            }
        }
        Command::Status { project } => {
            let manager = ctx.manager(Vec::new());
            let project = match project {
                Some(p) => Some(p.clone()),
                None => ctx.file.as_ref().map(|f| f.project.clone()),
            };
            match project {
                Some(project) => {
                    for kind in DnsProviderKind::ALL {
                        if kind == DnsProviderKind::Manual {
                            continue;
                        }
                        let state = if manager.is_configured(&project, kind) {
                            "configured"
                        } else {
                            "-"
                        };
                        println!("{:<18} {state}", kind.as_str());
                    }
                }
                None => {
                    let projects = manager.list_hosts_projects();
                    if projects.is_empty() {
                        println!("No {} projects in the hosts file", ctx.config.tool);
                    }
                    for project in projects {
                        println!("{project}");
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_service_variants() {
        assert_eq!(parse_service("mailpit").unwrap(), EnabledService::proxied("mailpit"));
        assert_eq!(parse_service("db:port").unwrap(), EnabledService::port("db"));
        assert_eq!(parse_service("web:proxy").unwrap(), EnabledService::proxied("web"));
        assert!(parse_service("x:udp").is_err());
        assert!(parse_service(":port").is_err());
    }

    #[test]
    fn cli_parses_apply() {
        let cli = Cli::try_parse_from([
            "devstack-dns",
            "apply",
            "shop",
            "--provider",
            "hosts",
            "-s",
            "mailpit",
            "--service",
            "db:port",
        ])
        .unwrap();

        let Command::Apply { target, services } = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(target.project.as_deref(), Some("shop"));
        assert_eq!(target.provider, Some(DnsProviderKind::HostsFile));
        assert_eq!(services.services.len(), 2);
    }

    #[test]
    fn cli_rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["devstack-dns", "plan", "shop", "-p", "bind9"]).is_err());
    }
}
