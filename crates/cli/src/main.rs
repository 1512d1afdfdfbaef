use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use daiteap_api::{ClientConfig, HttpTransport, PlatformClient, DEFAULT_SERVER_URL};
use daiteap_core::{parse_high_availability, ClusterIntent, ProviderCredential, ProviderName, Size};
use tracing::{error, info};

mod output;

use output::{Output, BUCKET_COLUMNS, PROJECT_COLUMNS};

#[derive(Parser, Debug)]
#[command(name = "daiteapcli", version, about = "Daiteap CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Platform API base URL
    #[arg(long = "server-url", global = true, env = "DAITEAP_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Bearer token for the platform API
    #[arg(long = "token", global = true, env = "DAITEAP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Platform username (used for operating-system lookups)
    #[arg(long = "username", global = true, env = "DAITEAP_USERNAME", default_value = "")]
    username: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interact with Kubernetes clusters
    #[command(name = "k8s", visible_alias = "kubernetes")]
    #[command(subcommand)]
    K8s(K8sCommand),
    /// Interact with projects from the current tenant
    #[command(subcommand)]
    Projects(ListCommand),
    /// Interact with storage buckets from the current tenant
    #[command(visible_alias = "stor")]
    #[command(subcommand)]
    Storage(ListCommand),
}

#[derive(Subcommand, Debug)]
enum K8sCommand {
    /// Start a task that creates a DLCMv2 Kubernetes cluster
    #[command(name = "create-dlcmv2")]
    CreateDlcmv2(CreateDlcmv2Args),
    /// Rename a Kubernetes cluster
    Rename {
        /// ID of the Kubernetes cluster
        #[arg(long = "cluster")]
        cluster: String,
        /// New name of the Kubernetes cluster
        #[arg(long = "name")]
        name: String,
    },
    /// Restart a Kubernetes cluster
    Restart {
        /// ID of the Kubernetes cluster
        #[arg(long = "cluster")]
        cluster: String,
    },
}

#[derive(Subcommand, Debug)]
enum ListCommand {
    /// List entries from the current tenant
    List,
}

#[derive(Args, Debug, Default, Clone)]
struct CreateDlcmv2Args {
    /// Path to a DLCMv2 template json file (sent as-is; other flags are ignored)
    #[arg(long = "dlcmv2-template")]
    template: Option<String>,
    /// Project ID in which to add the environment (only needed if projectName is not set)
    #[arg(long = "projectID")]
    project_id: Option<String>,
    /// Project name in which to add the environment (only needed if projectID is not set)
    #[arg(long = "projectName")]
    project_name: Option<String>,
    /// Name of the environment
    #[arg(long = "name")]
    name: Option<String>,
    /// Description of the environment
    #[arg(long = "description")]
    description: Option<String>,
    /// Size of the environment (S, M, L, XL)
    #[arg(long = "size")]
    size: Option<String>,
    /// High availability environment (true, false)
    #[arg(long = "high-availability")]
    high_availability: Option<String>,
    /// ID of Google Cloud credentials to use
    #[arg(long = "google-credential")]
    google_credential: Option<String>,
    /// GCP region for the environment's resources
    #[arg(long = "google-region")]
    google_region: Option<String>,
    /// ID of AWS credentials to use
    #[arg(long = "aws-credential")]
    aws_credential: Option<String>,
    /// AWS region for the environment's resources
    #[arg(long = "aws-region")]
    aws_region: Option<String>,
    /// ID of Azure credentials to use
    #[arg(long = "azure-credential")]
    azure_credential: Option<String>,
    /// Azure region for the environment's resources
    #[arg(long = "azure-region")]
    azure_region: Option<String>,
}

/// What create-dlcmv2 will do once flags are checked. Built without any network I/O.
#[derive(Debug)]
enum CreatePlan {
    /// Send this template file as the request body.
    Template(String),
    /// Synthesize from flags. A project given by name is resolved to its id later.
    Synthesize { intent: ClusterIntent, project_name: Option<String> },
}

fn given(v: &Option<String>) -> bool { v.as_deref().map(|s| !s.is_empty()).unwrap_or(false) }

impl CreateDlcmv2Args {
    fn credential(&self, provider: ProviderName) -> (&Option<String>, &Option<String>) {
        match provider {
            ProviderName::Google => (&self.google_credential, &self.google_region),
            ProviderName::Aws => (&self.aws_credential, &self.aws_region),
            ProviderName::Azure => (&self.azure_credential, &self.azure_region),
        }
    }

    /// Flag checks done before any request. Skipped entirely for the template path.
    fn validate(&self) -> Result<()> {
        if given(&self.template) {
            return Ok(());
        }
        let mut missing: Vec<String> = [
            ("name", &self.name),
            ("description", &self.description),
            ("size", &self.size),
            ("high-availability", &self.high_availability),
        ]
        .iter()
        .filter(|(_, v)| !given(v))
        .map(|(flag, _)| format!("--{}", flag))
        .collect();
        let mut any_credential = false;
        for p in daiteap_core::PROVIDER_ORDER {
            let (cred, region) = self.credential(p);
            if given(cred) {
                any_credential = true;
                if !given(region) { missing.push(format!("--{}-region", p)); }
            }
        }
        if !missing.is_empty() {
            bail!("missing required flag(s): {}", missing.join(", "));
        }
        if !any_credential {
            bail!("missing or invalid credential parameter (set --google-credential, --aws-credential or --azure-credential)");
        }
        if !given(&self.project_id) && !given(&self.project_name) {
            bail!("missing or invalid project parameter (set --projectID or --projectName)");
        }
        Ok(())
    }

    fn plan(&self, username: &str) -> Result<CreatePlan> {
        self.validate()?;
        if let Some(path) = self.template.clone().filter(|p| !p.is_empty()) {
            return Ok(CreatePlan::Template(path));
        }
        if username.is_empty() {
            bail!("username is not configured (set --username or DAITEAP_USERNAME)");
        }
        let project_id = self.project_id.clone().filter(|s| !s.is_empty());
        let project_name = if project_id.is_none() { self.project_name.clone() } else { None };
        let intent = self.intent(project_id.unwrap_or_default())?;
        Ok(CreatePlan::Synthesize { intent, project_name })
    }

    fn intent(&self, project_id: String) -> Result<ClusterIntent> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let size = Size::from_str(&text(&self.size))?;
        let high_availability = parse_high_availability(&text(&self.high_availability))?;
        let credentials = daiteap_core::PROVIDER_ORDER
            .into_iter()
            .filter_map(|p| {
                let (cred, region) = self.credential(p);
                given(cred).then(|| ProviderCredential { provider: p, credential_id: text(cred), region: text(region) })
            })
            .collect();
        Ok(ClusterIntent {
            name: text(&self.name),
            description: text(&self.description),
            project_id,
            size,
            high_availability,
            credentials,
        })
    }
}

fn init_tracing() {
    let env = std::env::var("DAITEAP_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("DAITEAP_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid DAITEAP_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = ?e, "command failed");
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn connect(config: &ClientConfig) -> Result<(Arc<HttpTransport>, PlatformClient)> {
    let transport = Arc::new(HttpTransport::new(config.clone()).context("building http client")?);
    let client = PlatformClient::new(transport.clone());
    Ok((transport, client))
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig {
        server_url: cli.server_url.clone(),
        access_token: cli.token.clone(),
        username: cli.username.clone(),
        timeout: ClientConfig::timeout_from_env(),
    };

    match cli.command {
        Commands::K8s(K8sCommand::CreateDlcmv2(args)) => {
            let plan = args.plan(&config.username)?;
            let (transport, client) = connect(&config)?;
            let response = match plan {
                CreatePlan::Template(path) => {
                    info!(path = %path, "create-dlcmv2 from template");
                    let body = std::fs::read_to_string(&path)
                        .with_context(|| format!("unable to read environment template file {}", path))?;
                    daiteap_dlcm::submit(transport.as_ref(), body).await?
                }
                CreatePlan::Synthesize { mut intent, project_name } => {
                    if let Some(name) = project_name {
                        intent.project_id =
                            client.project_id_by_name(&name).await.with_context(|| format!("resolving project {:?}", name))?;
                    }
                    info!(cluster = %intent.name, "create-dlcmv2 invoked");
                    daiteap_dlcm::create_dlcmv2(&client, transport.as_ref(), &intent, &config.username).await?
                }
            };
            output::print_value(&response, cli.output)?;
        }
        Commands::K8s(K8sCommand::Rename { cluster, name }) => {
            info!(cluster = %cluster, name = %name, "rename invoked");
            let (_, client) = connect(&config)?;
            ensure_kubernetes(&client, &cluster).await?;
            let response = client.rename_cluster(&cluster, &name).await?;
            output::print_value(&response, cli.output)?;
        }
        Commands::K8s(K8sCommand::Restart { cluster }) => {
            info!(cluster = %cluster, "restart invoked");
            let (_, client) = connect(&config)?;
            ensure_kubernetes(&client, &cluster).await?;
            let response = client.restart_cluster(&cluster).await?;
            output::print_value(&response, cli.output)?;
        }
        Commands::Projects(ListCommand::List) => {
            let (_, client) = connect(&config)?;
            let response = client.list_projects().await?;
            output::print_listing(&response, PROJECT_COLUMNS, cli.output)?;
        }
        Commands::Storage(ListCommand::List) => {
            let (_, client) = connect(&config)?;
            let response = client.list_buckets().await?;
            output::print_listing(&response, BUCKET_COLUMNS, cli.output)?;
        }
    }

    Ok(())
}

async fn ensure_kubernetes(client: &PlatformClient, cluster: &str) -> Result<()> {
    if !client.is_kubernetes(cluster).await? {
        bail!("please enter a valid Kubernetes cluster ID");
    }
    Ok(())
}
